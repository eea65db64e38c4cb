use std::time::Duration;

use crate::credentials::Certificate;
use crate::error::{Error, Result};
use crate::model::{
    ArgumentModel, CommonSettings, DEFAULT_MAX_POLL_COUNT, DEFAULT_MAX_POLL_TIME_SECS,
    DEFAULT_POLL_INTERVAL_SECS, EnrollArgs, EnrollRequest, GetCaRequest, GetCertRequest,
    GetCrlRequest, GetNextCaRequest, OperationArgs, PollPolicy, ResolvedOperation,
};
use crate::operation::Operation;
use crate::scep::ScepEngine;

/// Validates the model and applies operation defaults.
pub(super) fn finalize(
    model: ArgumentModel,
    engine: &impl ScepEngine,
) -> Result<(CommonSettings, ResolvedOperation)> {
    let ArgumentModel {
        url,
        proxy,
        ca_cert,
        ca_cert_target,
        encryption_algorithm,
        signature_algorithm,
        verbosity,
        operation,
        ..
    } = model;

    let url = url.ok_or_else(|| invalid("SCEP server URL required"))?;
    let common = CommonSettings {
        url,
        proxy,
        encryption_algorithm,
        signature_algorithm,
        verbosity,
    };

    let resolved = match operation {
        OperationArgs::GetCaCert(args) => ResolvedOperation::GetCaCert(GetCaRequest {
            target_prefix: ca_cert_target
                .ok_or_else(|| invalid("Target filename for CA cert missing"))?,
            identifier: args.identifier,
            fingerprint_algorithm: args.fingerprint_algorithm.unwrap_or_default(),
        }),
        OperationArgs::Enroll(args) => {
            let ca_cert = require_ca_cert(ca_cert)?;
            ResolvedOperation::Enroll(Box::new(finalize_enroll(args, ca_cert, engine)?))
        }
        OperationArgs::GetCert(args) => {
            let ca_cert = require_ca_cert(ca_cert)?;
            ResolvedOperation::GetCert(GetCertRequest {
                ca_cert,
                private_key: args.private_key.ok_or_else(|| invalid("Missing private key"))?,
                local_cert: args
                    .local_cert
                    .ok_or_else(|| invalid("Missing local certificate"))?,
                serial: args
                    .serial
                    .ok_or_else(|| invalid("Missing serial for certificate"))?,
                cert_target: args
                    .cert_target
                    .ok_or_else(|| invalid("Missing target filepath for requested certificate"))?,
            })
        }
        OperationArgs::GetCrl(args) => {
            let ca_cert = require_ca_cert(ca_cert)?;
            ResolvedOperation::GetCrl(GetCrlRequest {
                ca_cert,
                private_key: args.private_key.ok_or_else(|| invalid("Missing private key"))?,
                local_cert: args
                    .local_cert
                    .ok_or_else(|| invalid("Missing local certificate"))?,
                crl_target: args
                    .crl_target
                    .ok_or_else(|| invalid("Missing target filepath for requested CRL"))?,
            })
        }
        OperationArgs::GetNextCaCert(args) => {
            let ca_cert = require_ca_cert(ca_cert)?;
            ResolvedOperation::GetNextCaCert(GetNextCaRequest {
                ca_cert,
                cert_chain: args.cert_chain.ok_or_else(|| invalid("Missing CA chain"))?,
                signer_cert_target: args.signer_cert_target,
            })
        }
    };
    Ok((common, resolved))
}

fn finalize_enroll(
    args: EnrollArgs,
    ca_cert: Certificate,
    engine: &impl ScepEngine,
) -> Result<EnrollRequest> {
    let operation = if args.resume {
        Operation::GetCertInitial
    } else {
        Operation::PkcsReq
    };
    let request_key = args.request_key.ok_or_else(|| invalid("Key of CSR missing"))?;
    let request = args.request.ok_or_else(|| invalid("CSR missing"))?;
    let cert_target = args
        .cert_target
        .ok_or_else(|| invalid("Certificate output filename missing"))?;
    if args.signature_key.is_some() != args.signature_cert.is_some() {
        return Err(invalid(
            "Signature key and certificate always required together",
        ));
    }
    let poll = PollPolicy {
        interval: Duration::from_secs(positive(
            args.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            "Poll interval must be greater than 0",
        )?),
        max_time: Duration::from_secs(args.max_poll_time.unwrap_or(DEFAULT_MAX_POLL_TIME_SECS)),
        max_count: positive(
            args.max_poll_count.unwrap_or(DEFAULT_MAX_POLL_COUNT),
            "Max poll count must be greater than 0",
        )?,
    };

    let encryption_cert = args.encryption_cert.unwrap_or_else(|| ca_cert.clone());
    let (signature_key, signature_cert, self_signed) =
        match (args.signature_key, args.signature_cert) {
            (Some(key), Some(cert)) => (key, cert, false),
            _ => {
                let cert = engine.new_self_signed_certificate(&request, &request_key)?;
                (request_key.clone(), cert, true)
            }
        };

    Ok(EnrollRequest {
        operation,
        ca_cert,
        request_key,
        request,
        signature_key,
        signature_cert,
        self_signed,
        encryption_cert,
        self_signed_target: args.self_signed_target,
        cert_target,
        poll,
    })
}

fn require_ca_cert(ca_cert: Option<Certificate>) -> Result<Certificate> {
    ca_cert.ok_or_else(|| invalid("Missing CA certificate"))
}

fn positive(value: u64, message: &str) -> Result<u64> {
    if value == 0 {
        return Err(invalid(message));
    }
    Ok(value)
}

fn invalid(message: &str) -> Error {
    Error::Validation(message.to_string())
}
