use std::path::PathBuf;

use tracing::{info, warn};

use crate::credentials::Certificate;
use crate::error::{Error, Result};
use crate::fs_util::write_certificate_pem;
use crate::model::{GetCaRequest, PollPolicy};
use crate::operation::Operation;
use crate::scep::{ScepEngine, Transport, UnwrapKeys};

/// Fetches the CA certificates and writes each one to `<prefix><index>`.
///
/// Returns the written paths in reply order. Files written before a failure
/// are left in place.
///
/// # Errors
/// Returns `Transport`, `ProtocolDecode` or `Io` errors.
pub async fn run_getca(
    request: &GetCaRequest,
    transport: &impl Transport,
    engine: &impl ScepEngine,
) -> Result<Vec<PathBuf>> {
    info!("Requesting CA certificates");
    let reply = transport
        .send_request(
            Operation::GetCaCert,
            request.identifier.as_deref(),
            &PollPolicy::single(),
            &|_| false,
        )
        .await?;

    let certificates = if reply.is_bare_ca_cert() {
        vec![
            Certificate::from_der(reply.payload)
                .map_err(|e| Error::ProtocolDecode(e.to_string()))?,
        ]
    } else {
        let envelope = engine.decode_envelope(&reply.payload)?;
        engine.unwrap_envelope(&envelope, UnwrapKeys::default(), Operation::GetCaCert)?
    };
    if certificates.is_empty() {
        warn!("GetCACert reply contained no certificates, nothing written");
    }

    let mut written = Vec::with_capacity(certificates.len());
    for (index, cert) in certificates.iter().enumerate() {
        let summary = cert
            .summary(request.fingerprint_algorithm)
            .map_err(|e| Error::ProtocolDecode(e.to_string()))?;
        println!("{summary}");
        let path = PathBuf::from(format!("{}{index}", request.target_prefix));
        write_certificate_pem(&path, cert).await?;
        println!("certificate written as {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use rcgen::{CertificateParams, KeyPair};
    use tempfile::tempdir;

    use super::*;
    use crate::algorithm::DigestAlgorithm;
    use crate::scep::{CONTENT_TYPE_CA_CERT, CmsEngine, Reply};

    struct StubTransport(Reply);

    impl Transport for StubTransport {
        async fn send_request(
            &self,
            operation: Operation,
            _message: Option<&str>,
            poll: &PollPolicy,
            _is_pending: &dyn Fn(&Reply) -> bool,
        ) -> Result<Reply> {
            assert_eq!(operation, Operation::GetCaCert);
            assert_eq!(*poll, PollPolicy::single());
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_bare_certificate_reply() {
        let dir = tempdir().unwrap();
        let key = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec!["ca.example".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        let transport = StubTransport(Reply {
            content_type: Some(CONTENT_TYPE_CA_CERT.to_string()),
            payload: cert.der().to_vec(),
        });
        let request = GetCaRequest {
            target_prefix: dir.path().join("ca-").to_string_lossy().into_owned(),
            identifier: None,
            fingerprint_algorithm: DigestAlgorithm::Sha1,
        };

        let written = run_getca(&request, &transport, &CmsEngine).await.unwrap();

        assert_eq!(written, vec![dir.path().join("ca-0")]);
        let pem = std::fs::read_to_string(&written[0]).unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_decode_error() {
        let dir = tempdir().unwrap();
        let transport = StubTransport(Reply {
            content_type: Some("application/x-x509-ca-ra-cert".to_string()),
            payload: b"garbage".to_vec(),
        });
        let request = GetCaRequest {
            target_prefix: dir.path().join("ca-").to_string_lossy().into_owned(),
            identifier: Some("ca-one".to_string()),
            fingerprint_algorithm: DigestAlgorithm::Sha256,
        };

        let err = run_getca(&request, &transport, &CmsEngine).await.unwrap_err();

        assert!(matches!(err, Error::ProtocolDecode(_)));
        assert!(!dir.path().join("ca-0").exists());
    }
}
