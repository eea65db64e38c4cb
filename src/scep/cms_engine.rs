use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::asn1::{AnyRef, ObjectIdentifier};
use der::{Decode, Encode, Reader, SliceReader, Tag, TagNumber, Tagged};
use tracing::{debug, warn};

use super::engine::{
    EnrollmentMaterial, Envelope, EnvelopeAlgorithms, PkiStatus, ScepEngine, UnwrapKeys,
};
use crate::credentials::{Certificate, CertificateRequest, PrivateKey};
use crate::error::{Error, Result};
use crate::operation::Operation;

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_PKI_STATUS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.3");
const ID_FAIL_INFO: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.113733.1.9.4");

/// Engine backed by the `cms` and `rcgen` crates.
///
/// Handles the unencrypted parts of SCEP: certs-only replies, `pkiStatus`
/// inspection and the self-signed signer certificate. Enveloping and
/// decrypting `PKCSReq`/`CertRep` content needs the legacy block ciphers and
/// is reported as a `Crypto` error.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmsEngine;

impl CmsEngine {
    /// DER of the `SignedData` carried by `envelope`.
    fn signed_data_der(envelope: &Envelope) -> Result<Vec<u8>> {
        let content_info = ContentInfo::from_der(envelope.der())
            .map_err(|e| Error::ProtocolDecode(format!("Failed to parse ContentInfo: {e}")))?;
        if content_info.content_type != ID_SIGNED_DATA {
            return Err(Error::ProtocolDecode(format!(
                "Expected SignedData, got content type {}",
                content_info.content_type
            )));
        }
        content_info
            .content
            .to_der()
            .map_err(|e| Error::ProtocolDecode(format!("Failed to encode content: {e}")))
    }

    fn signed_data(envelope: &Envelope) -> Result<SignedData> {
        SignedData::from_der(&Self::signed_data_der(envelope)?)
            .map_err(|e| Error::ProtocolDecode(format!("Failed to parse SignedData: {e}")))
    }
}

impl ScepEngine for CmsEngine {
    fn new_self_signed_certificate(
        &self,
        request: &CertificateRequest,
        key: &PrivateKey,
    ) -> Result<Certificate> {
        let key_pair = key
            .key_pair()
            .map_err(|e| Error::SelfSigned(e.to_string()))?;
        let csr = rcgen::CertificateSigningRequestParams::from_pem(&request.to_pem())
            .map_err(|e| Error::SelfSigned(format!("Failed to read request: {e}")))?;
        let cert = csr
            .params
            .self_signed(&key_pair)
            .map_err(|e| Error::SelfSigned(e.to_string()))?;
        Certificate::from_der(cert.der().to_vec()).map_err(|e| Error::SelfSigned(e.to_string()))
    }

    fn build_enrollment_envelope(
        &self,
        operation: Operation,
        _material: &EnrollmentMaterial<'_>,
        algorithms: EnvelopeAlgorithms,
    ) -> Result<Envelope> {
        Err(Error::Crypto(format!(
            "building a {operation} envelope ({} / {}) is not supported by the bundled engine",
            algorithms.cipher.name(),
            algorithms.digest.name()
        )))
    }

    fn decode_envelope(&self, bytes: &[u8]) -> Result<Envelope> {
        let envelope = Envelope::from_der(bytes.to_vec());
        Self::signed_data(&envelope)?;
        Ok(envelope)
    }

    fn pki_status(&self, envelope: &Envelope) -> Result<PkiStatus> {
        let signed_data = Self::signed_data(envelope)?;
        let status = signed_attribute(&signed_data, ID_PKI_STATUS).ok_or_else(|| {
            Error::ProtocolDecode("Reply carries no pkiStatus attribute".to_string())
        })?;
        match status.trim() {
            "0" => Ok(PkiStatus::Success),
            "2" => Ok(PkiStatus::Failure(
                signed_attribute(&signed_data, ID_FAIL_INFO).map(|code| fail_info_name(&code)),
            )),
            "3" => Ok(PkiStatus::Pending),
            other => Err(Error::ProtocolDecode(format!("Unknown pkiStatus '{other}'"))),
        }
    }

    fn unwrap_envelope(
        &self,
        envelope: &Envelope,
        keys: UnwrapKeys<'_>,
        operation: Operation,
    ) -> Result<Vec<Certificate>> {
        match operation {
            Operation::GetCaCert | Operation::GetNextCaCert => {
                certificates(&Self::signed_data_der(envelope)?)
            }
            Operation::PkcsReq | Operation::GetCertInitial | Operation::GetCert => {
                let signed_data = Self::signed_data(envelope)?;
                if signed_data.encap_content_info.econtent.is_none() {
                    debug!("{operation} reply has no encapsulated content");
                    return Ok(Vec::new());
                }
                debug!(
                    "Unwrapping {operation} reply (CA cert: {}, decryption key: {})",
                    keys.ca_cert.is_some(),
                    keys.decryption_key.is_some()
                );
                Err(Error::Crypto(format!(
                    "decrypting the {operation} reply is not supported by the bundled engine"
                )))
            }
            Operation::GetCrl | Operation::CertRep | Operation::None => Err(Error::Crypto(
                format!("{operation} replies cannot be unwrapped"),
            )),
        }
    }
}

fn signed_attribute(signed_data: &SignedData, oid: ObjectIdentifier) -> Option<String> {
    signed_data
        .signer_infos
        .0
        .iter()
        .filter_map(|info| info.signed_attrs.as_ref())
        .flat_map(|attrs| attrs.iter())
        .find(|attr| attr.oid == oid)
        .and_then(|attr| attr.values.iter().next())
        .map(|value| String::from_utf8_lossy(value.value()).into_owned())
}

fn fail_info_name(code: &str) -> String {
    match code.trim() {
        "0" => "badAlg".to_string(),
        "1" => "badMessageCheck".to_string(),
        "2" => "badRequest".to_string(),
        "3" => "badTime".to_string(),
        "4" => "badCertId".to_string(),
        other => format!("failInfo {other}"),
    }
}

fn decode_error(e: der::Error) -> Error {
    Error::ProtocolDecode(format!("Failed to parse certificates: {e}"))
}

/// Certificates of a `SignedData` in the order the server sent them.
///
/// `SetOfVec` sorts on decode, so the `[0] IMPLICIT` field is walked on the
/// raw encoding instead.
fn certificates(signed_data_der: &[u8]) -> Result<Vec<Certificate>> {
    const CERTIFICATES: Tag = Tag::ContextSpecific {
        constructed: true,
        number: TagNumber::N0,
    };

    let signed_data = AnyRef::from_der(signed_data_der).map_err(decode_error)?;
    let mut fields = SliceReader::new(signed_data.value()).map_err(decode_error)?;
    let mut cert_set = None;
    while !fields.is_finished() {
        let field = AnyRef::decode(&mut fields).map_err(decode_error)?;
        if field.tag() == CERTIFICATES {
            cert_set = Some(field);
            break;
        }
    }
    let Some(cert_set) = cert_set else {
        return Ok(Vec::new());
    };

    let mut certificates = Vec::new();
    let mut entries = SliceReader::new(cert_set.value()).map_err(decode_error)?;
    while !entries.is_finished() {
        let entry = AnyRef::decode(&mut entries).map_err(decode_error)?;
        if entry.tag() != Tag::Sequence {
            warn!("Skipping non-X.509 certificate with tag {}", entry.tag());
            continue;
        }
        let der = entry.to_der().map_err(decode_error)?;
        match Certificate::from_der(der) {
            Ok(cert) => certificates.push(cert),
            Err(e) => warn!("Skipping non-X.509 certificate: {e}"),
        }
    }
    Ok(certificates)
}
