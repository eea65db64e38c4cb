use std::fmt;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use x509_parser::prelude::{FromDer, X509CertificationRequest};

use crate::algorithm::DigestAlgorithm;
use crate::error::{Error, Result};

const PEM_BEGIN: &[u8] = b"-----BEGIN";
const PEM_LINE_WIDTH: usize = 64;
const LABEL_CERTIFICATE: &str = "CERTIFICATE";
const LABEL_PRIVATE_KEY: &str = "PRIVATE KEY";
const LABELS_REQUEST: [&str; 2] = ["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ParseError(String);

/// A parsed X.509 certificate, held in DER form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    /// Wraps DER bytes after checking they parse as a certificate.
    ///
    /// # Errors
    /// Returns `ParseError` if the bytes are not an X.509 certificate.
    pub fn from_der(der: impl Into<Vec<u8>>) -> std::result::Result<Self, ParseError> {
        let der = der.into();
        x509_parser::parse_x509_certificate(&der)
            .map_err(|e| ParseError(format!("Failed to parse certificate: {e}")))?;
        Ok(Self { der })
    }

    /// Parses a PEM or DER encoded certificate.
    ///
    /// # Errors
    /// Returns `ParseError` if the input is neither.
    pub fn from_pem_or_der(bytes: &[u8]) -> std::result::Result<Self, ParseError> {
        let der = decode_material(bytes, &[LABEL_CERTIFICATE])?;
        Self::from_der(der)
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn to_pem(&self) -> String {
        encode_pem(LABEL_CERTIFICATE, &self.der)
    }

    /// Human-readable summary with a fingerprint in the requested digest.
    ///
    /// # Errors
    /// Returns `ParseError` if the stored DER no longer parses.
    pub fn summary(
        &self,
        fingerprint: DigestAlgorithm,
    ) -> std::result::Result<CertificateSummary, ParseError> {
        let (_, cert) = x509_parser::parse_x509_certificate(&self.der)
            .map_err(|e| ParseError(format!("Failed to parse certificate: {e}")))?;
        let validity = cert.validity();
        Ok(CertificateSummary {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.raw_serial_as_string(),
            not_before: validity.not_before.to_string(),
            not_after: validity.not_after.to_string(),
            fingerprint_algorithm: fingerprint,
            fingerprint: fingerprint.fingerprint(&self.der),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: String,
    pub not_after: String,
    pub fingerprint_algorithm: DigestAlgorithm,
    pub fingerprint: String,
}

impl fmt::Display for CertificateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Subject: {}", self.subject)?;
        writeln!(f, "Issuer: {}", self.issuer)?;
        writeln!(f, "Serial: {}", self.serial)?;
        writeln!(f, "Not Before: {}", self.not_before)?;
        writeln!(f, "Not After: {}", self.not_after)?;
        write!(
            f,
            "{} Fingerprint={}",
            self.fingerprint_algorithm.name().to_uppercase(),
            self.fingerprint
        )
    }
}

/// A PKCS#8 private key, kept as PEM for the signing backend.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pem: String,
}

impl PrivateKey {
    /// Parses a PEM or DER encoded PKCS#8 private key.
    ///
    /// # Errors
    /// Returns `ParseError` if the input is not a usable PKCS#8 key.
    pub fn from_pem_or_der(bytes: &[u8]) -> std::result::Result<Self, ParseError> {
        let der = decode_material(bytes, &[LABEL_PRIVATE_KEY])?;
        let pem = encode_pem(LABEL_PRIVATE_KEY, &der);
        rcgen::KeyPair::from_pem(&pem)
            .map_err(|e| ParseError(format!("Failed to parse PKCS#8 private key: {e}")))?;
        Ok(Self { pem })
    }

    #[must_use]
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Rebuilds the signing key pair.
    ///
    /// # Errors
    /// Returns `ParseError` if the key cannot be loaded by the signing backend.
    pub fn key_pair(&self) -> std::result::Result<rcgen::KeyPair, ParseError> {
        rcgen::KeyPair::from_pem(&self.pem)
            .map_err(|e| ParseError(format!("Failed to load private key: {e}")))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(****)")
    }
}

/// A PKCS#10 certificate signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    der: Vec<u8>,
}

impl CertificateRequest {
    /// Parses a PEM or DER encoded PKCS#10 request.
    ///
    /// # Errors
    /// Returns `ParseError` if the input is not a certificate request.
    pub fn from_pem_or_der(bytes: &[u8]) -> std::result::Result<Self, ParseError> {
        let der = decode_material(bytes, &LABELS_REQUEST)?;
        X509CertificationRequest::from_der(&der)
            .map_err(|e| ParseError(format!("Failed to parse certificate request: {e}")))?;
        Ok(Self { der })
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn to_pem(&self) -> String {
        encode_pem(LABELS_REQUEST[0], &self.der)
    }
}

/// Loads a certificate file.
///
/// # Errors
/// Returns `CredentialLoad` naming `origin` (the flag or configuration key).
pub fn load_certificate(path: &Path, origin: &str, what: &'static str) -> Result<Certificate> {
    let bytes = read_material(path, origin, what)?;
    Certificate::from_pem_or_der(&bytes).map_err(|e| load_error(path, origin, what, &e))
}

/// Loads a private key file.
///
/// # Errors
/// Returns `CredentialLoad` naming `origin` (the flag or configuration key).
pub fn load_key(path: &Path, origin: &str, what: &'static str) -> Result<PrivateKey> {
    let bytes = read_material(path, origin, what)?;
    PrivateKey::from_pem_or_der(&bytes).map_err(|e| load_error(path, origin, what, &e))
}

/// Loads a certificate request file.
///
/// # Errors
/// Returns `CredentialLoad` naming `origin` (the flag or configuration key).
pub fn load_request(path: &Path, origin: &str, what: &'static str) -> Result<CertificateRequest> {
    let bytes = read_material(path, origin, what)?;
    CertificateRequest::from_pem_or_der(&bytes).map_err(|e| load_error(path, origin, what, &e))
}

/// Encodes DER bytes as a PEM block with 64-column lines.
#[must_use]
pub fn encode_pem(label: &str, der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for line in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 output is ASCII
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}

fn read_material(path: &Path, origin: &str, what: &'static str) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| load_error(path, origin, what, &e))
}

fn load_error(path: &Path, origin: &str, what: &'static str, reason: &dyn fmt::Display) -> Error {
    Error::CredentialLoad {
        origin: origin.to_string(),
        what,
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn decode_material(bytes: &[u8], labels: &[&str]) -> std::result::Result<Vec<u8>, ParseError> {
    if !bytes.trim_ascii_start().starts_with(PEM_BEGIN) {
        return Ok(bytes.to_vec());
    }
    let (_, pem) = x509_parser::pem::parse_x509_pem(bytes)
        .map_err(|e| ParseError(format!("Invalid PEM: {e}")))?;
    if !labels.contains(&pem.label.as_str()) {
        return Err(ParseError(format!(
            "Unexpected PEM label '{}', expected {}",
            pem.label,
            labels.join(" or ")
        )));
    }
    Ok(pem.contents)
}
