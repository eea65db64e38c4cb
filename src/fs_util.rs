use std::path::Path;

use tokio::fs;
use tracing::debug;

use crate::credentials::Certificate;
use crate::error::{Error, Result};

/// Writes a certificate as PEM, replacing any existing file.
///
/// Parent directories are not created.
///
/// # Errors
/// Returns `Io` naming the path if the file cannot be written.
pub async fn write_certificate_pem(path: &Path, cert: &Certificate) -> Result<()> {
    fs::write(path, cert.to_pem())
        .await
        .map_err(|e| Error::io(format!("Failed to write certificate to {}", path.display()), e))?;
    debug!("Wrote {} bytes of DER as PEM to {}", cert.der().len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use rcgen::{CertificateParams, KeyPair};
    use tempfile::tempdir;

    use super::*;

    fn test_cert() -> Certificate {
        let params = CertificateParams::new(vec!["ca.example".to_string()]).unwrap();
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Certificate::from_der(cert.der().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_write_certificate_pem() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cert.pem");
        let cert = test_cert();

        write_certificate_pem(&path, &cert).await.unwrap();

        let contents = fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, cert.to_pem());
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("cert.pem");

        let err = write_certificate_pem(&path, &test_cert()).await.unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("missing"));
    }
}
