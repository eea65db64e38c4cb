use tracing::{debug, info};

use crate::credentials::Certificate;
use crate::error::{Error, Result};
use crate::fs_util::write_certificate_pem;
use crate::model::{CommonSettings, EnrollRequest};
use crate::operation::Operation;
use crate::scep::{
    EnrollmentMaterial, EnvelopeAlgorithms, PkiStatus, Reply, ScepEngine, Transport, UnwrapKeys,
};

/// Submits a `PKCSReq` (or resumes with `GetCertInitial`) and writes the
/// issued certificate to the target path.
///
/// The self-signed signer certificate, when one was generated and a target
/// was given, is written before anything is sent.
///
/// # Errors
/// Returns `Crypto`, `Transport`, `ProtocolDecode`, `Rejected`,
/// `NoCertificate` or `Io` errors.
pub async fn run_enroll(
    request: &EnrollRequest,
    common: &CommonSettings,
    transport: &impl Transport,
    engine: &impl ScepEngine,
) -> Result<Certificate> {
    if request.self_signed {
        info!("Signing request with a self-signed certificate");
    }
    if request.self_signed
        && let Some(path) = &request.self_signed_target
    {
        write_certificate_pem(path, &request.signature_cert).await?;
        info!("Self-signed certificate written to {}", path.display());
    }

    let material = EnrollmentMaterial {
        request: &request.request,
        signature_cert: &request.signature_cert,
        signature_key: &request.signature_key,
        encryption_cert: &request.encryption_cert,
    };
    let algorithms = EnvelopeAlgorithms {
        cipher: common.encryption_algorithm,
        digest: common.signature_algorithm,
    };
    let message = engine
        .build_enrollment_envelope(request.operation, &material, algorithms)?
        .to_base64();

    info!("Sending {} request to {}", request.operation, common.url);
    let is_pending = |reply: &Reply| {
        matches!(
            engine
                .decode_envelope(&reply.payload)
                .and_then(|envelope| engine.pki_status(&envelope)),
            Ok(PkiStatus::Pending)
        )
    };
    let reply = transport
        .send_request(request.operation, Some(&message), &request.poll, &is_pending)
        .await?;

    let envelope = engine.decode_envelope(&reply.payload)?;
    match engine.pki_status(&envelope)? {
        PkiStatus::Success => {}
        PkiStatus::Failure(info) => {
            return Err(Error::Rejected(
                info.unwrap_or_else(|| "no failInfo given".to_string()),
            ));
        }
        PkiStatus::Pending => {
            return Err(Error::Transport("request still pending".to_string()));
        }
    }

    let keys = UnwrapKeys {
        ca_cert: Some(&request.ca_cert),
        decryption_cert: Some(&request.signature_cert),
        decryption_key: Some(&request.signature_key),
    };
    let certificates = engine.unwrap_envelope(&envelope, keys, Operation::PkcsReq)?;
    let mut certificates = certificates.into_iter();
    let Some(issued) = certificates.next() else {
        return Err(Error::NoCertificate);
    };
    let extra = certificates.count();
    if extra > 0 {
        debug!("Ignoring {extra} additional certificate(s) in reply");
    }

    write_certificate_pem(&request.cert_target, &issued).await?;
    info!("New certificate written to {}", request.cert_target.display());
    Ok(issued)
}
