use std::path::Path;

use crate::algorithm::{CipherAlgorithm, DigestAlgorithm};
use crate::credentials::{load_certificate, load_key, load_request};
use crate::error::{Error, Result};
use crate::model::{ArgumentModel, ExplicitFlags, OperationArgs, Verbosity};
use crate::utils::resolve_url;

use super::ConfigFile;

/// Fills settings left unset on the command line from a configuration file.
/// Only the section belonging to the active operation is consulted.
pub(crate) fn apply_config_file(model: &mut ArgumentModel, config: &ConfigFile) -> Result<()> {
    if model.url.is_none()
        && let Some(url) = &config.url
    {
        model.url = Some(resolve_url(url).map_err(|e| invalid("url", url, &e))?);
    }
    if model.proxy.is_none()
        && let Some(proxy) = &config.proxy
    {
        model.proxy = Some(resolve_url(proxy).map_err(|e| invalid("proxy", proxy, &e))?);
    }
    if let Some(ca_cert) = &config.ca_cert {
        if matches!(model.operation, OperationArgs::GetCaCert(_)) {
            if model.ca_cert_target.is_none() {
                model.ca_cert_target = Some(ca_cert.clone());
            }
        } else if model.ca_cert.is_none() {
            model.ca_cert = Some(load_certificate(
                Path::new(ca_cert),
                "ca_cert",
                "CA certificate",
            )?);
        }
    }
    if !model.explicit.contains(ExplicitFlags::ENCRYPTION_ALGORITHM)
        && let Some(name) = &config.encryption_algorithm
    {
        model.encryption_algorithm = name
            .parse::<CipherAlgorithm>()
            .map_err(|e| invalid("encryption_algorithm", name, &e))?;
    }
    if !model.explicit.contains(ExplicitFlags::SIGNATURE_ALGORITHM)
        && let Some(name) = &config.signature_algorithm
    {
        model.signature_algorithm = name
            .parse::<DigestAlgorithm>()
            .map_err(|e| invalid("signature_algorithm", name, &e))?;
    }
    if !model.explicit.contains(ExplicitFlags::VERBOSITY)
        && let Some(level) = &config.verbosity
    {
        model.verbosity = match level.as_str() {
            "info" => Verbosity::Info,
            "debug" => Verbosity::Debug,
            _ => return Err(invalid("verbosity", level, &"expected info or debug")),
        };
    }

    let explicit = model.explicit;
    match &mut model.operation {
        OperationArgs::GetCaCert(args) => {
            let Some(section) = &config.getca else {
                return Ok(());
            };
            if args.identifier.is_none() {
                args.identifier.clone_from(&section.identifier);
            }
            if args.fingerprint_algorithm.is_none()
                && let Some(name) = &section.fingerprint_algorithm
            {
                args.fingerprint_algorithm = Some(
                    name.parse::<DigestAlgorithm>()
                        .map_err(|e| invalid("getca.fingerprint_algorithm", name, &e))?,
                );
            }
        }
        OperationArgs::Enroll(args) => {
            let Some(section) = &config.enroll else {
                return Ok(());
            };
            if args.request_key.is_none()
                && let Some(path) = &section.private_key
            {
                args.request_key = Some(load_key(path, "enroll.private_key", "request key")?);
            }
            if args.request.is_none()
                && let Some(path) = &section.request
            {
                args.request = Some(load_request(path, "enroll.request", "request")?);
            }
            if args.signature_key.is_none()
                && let Some(path) = &section.signature_key
            {
                args.signature_key =
                    Some(load_key(path, "enroll.signature_key", "signature key")?);
            }
            if args.signature_cert.is_none()
                && let Some(path) = &section.signature_cert
            {
                args.signature_cert = Some(load_certificate(
                    path,
                    "enroll.signature_cert",
                    "signature certificate",
                )?);
            }
            if args.encryption_cert.is_none()
                && let Some(path) = &section.encryption_cert
            {
                args.encryption_cert = Some(load_certificate(
                    path,
                    "enroll.encryption_cert",
                    "encryption certificate",
                )?);
            }
            if args.self_signed_target.is_none() {
                args.self_signed_target.clone_from(&section.self_signed_target);
            }
            if args.cert_target.is_none() {
                args.cert_target.clone_from(&section.cert_target);
            }
            args.poll_interval = args.poll_interval.or(section.poll_interval);
            args.max_poll_time = args.max_poll_time.or(section.max_poll_time);
            args.max_poll_count = args.max_poll_count.or(section.max_poll_count);
            if !explicit.contains(ExplicitFlags::RESUME)
                && let Some(resume) = section.resume
            {
                args.resume = resume;
            }
        }
        OperationArgs::GetCert(args) => {
            let Some(section) = &config.getcert else {
                return Ok(());
            };
            if args.private_key.is_none()
                && let Some(path) = &section.private_key
            {
                args.private_key = Some(load_key(path, "getcert.private_key", "private key")?);
            }
            if args.local_cert.is_none()
                && let Some(path) = &section.local_cert
            {
                args.local_cert = Some(load_certificate(
                    path,
                    "getcert.local_cert",
                    "local certificate",
                )?);
            }
            if args.serial.is_none() {
                args.serial.clone_from(&section.serial);
            }
            if args.cert_target.is_none() {
                args.cert_target.clone_from(&section.cert_target);
            }
        }
        OperationArgs::GetCrl(args) => {
            let Some(section) = &config.getcrl else {
                return Ok(());
            };
            if args.private_key.is_none()
                && let Some(path) = &section.private_key
            {
                args.private_key = Some(load_key(path, "getcrl.private_key", "private key")?);
            }
            if args.local_cert.is_none()
                && let Some(path) = &section.local_cert
            {
                args.local_cert = Some(load_certificate(
                    path,
                    "getcrl.local_cert",
                    "local certificate",
                )?);
            }
            if args.crl_target.is_none() {
                args.crl_target.clone_from(&section.crl_target);
            }
        }
        OperationArgs::GetNextCaCert(args) => {
            let Some(section) = &config.getnextca else {
                return Ok(());
            };
            if args.cert_chain.is_none() {
                args.cert_chain.clone_from(&section.cert_chain);
            }
            if args.signer_cert_target.is_none() {
                args.signer_cert_target.clone_from(&section.signer_cert_target);
            }
        }
    }
    Ok(())
}

fn invalid(key: &str, value: &str, reason: &dyn std::fmt::Display) -> Error {
    Error::Configuration(format!("invalid value '{value}' for {key}: {reason}"))
}
