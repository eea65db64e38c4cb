use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::algorithm::{CipherAlgorithm, DigestAlgorithm};
use crate::credentials::{Certificate, CertificateRequest, PrivateKey};
use crate::error::Result;
use crate::operation::Operation;

/// A DER encoded PKCS#7 `ContentInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    der: Vec<u8>,
}

impl Envelope {
    #[must_use]
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Base64 form carried in the `message` parameter of `PKIOperation`.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }
}

/// Credentials packed into an enrollment or polling request.
#[derive(Debug, Clone, Copy)]
pub struct EnrollmentMaterial<'a> {
    pub request: &'a CertificateRequest,
    pub signature_cert: &'a Certificate,
    pub signature_key: &'a PrivateKey,
    pub encryption_cert: &'a Certificate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeAlgorithms {
    pub cipher: CipherAlgorithm,
    pub digest: DigestAlgorithm,
}

/// Keys available when unwrapping a reply. `GetCACert` replies need none.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnwrapKeys<'a> {
    pub ca_cert: Option<&'a Certificate>,
    pub decryption_cert: Option<&'a Certificate>,
    pub decryption_key: Option<&'a PrivateKey>,
}

/// `pkiStatus` of a `CertRep` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkiStatus {
    Success,
    /// Carries the `failInfo` name, when the CA sent one.
    Failure(Option<String>),
    Pending,
}

impl fmt::Display for PkiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::Failure(Some(info)) => write!(f, "FAILURE ({info})"),
            Self::Failure(None) => f.write_str("FAILURE"),
            Self::Pending => f.write_str("PENDING"),
        }
    }
}

/// PKCS#7 and certificate operations used by the orchestrators.
pub trait ScepEngine {
    /// Signs a certificate for the request's subject with `key`.
    ///
    /// # Errors
    /// Returns `SelfSigned` if the certificate cannot be produced.
    fn new_self_signed_certificate(
        &self,
        request: &CertificateRequest,
        key: &PrivateKey,
    ) -> Result<Certificate>;

    /// Builds the signed and encrypted request for `operation`.
    ///
    /// # Errors
    /// Returns `Crypto` if the envelope cannot be built.
    fn build_enrollment_envelope(
        &self,
        operation: Operation,
        material: &EnrollmentMaterial<'_>,
        algorithms: EnvelopeAlgorithms,
    ) -> Result<Envelope>;

    /// Parses reply bytes into an envelope.
    ///
    /// # Errors
    /// Returns `ProtocolDecode` if the bytes are not a PKCS#7 message.
    fn decode_envelope(&self, bytes: &[u8]) -> Result<Envelope>;

    /// Reads the `pkiStatus` attribute of a `CertRep`.
    ///
    /// # Errors
    /// Returns `ProtocolDecode` if the message carries no readable status.
    fn pki_status(&self, envelope: &Envelope) -> Result<PkiStatus>;

    /// Extracts the certificates carried by a reply to `operation`.
    ///
    /// # Errors
    /// Returns `ProtocolDecode` or `Crypto` if the content cannot be recovered.
    fn unwrap_envelope(
        &self,
        envelope: &Envelope,
        keys: UnwrapKeys<'_>,
        operation: Operation,
    ) -> Result<Vec<Certificate>>;
}
