//! Two-phase command resolution: find the operation, then interpret every
//! flag in that operation's namespace.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::debug;

use crate::algorithm::{CipherAlgorithm, DigestAlgorithm};
use crate::args::{Flag, Occurrence, RawArgs};
use crate::config::{ConfigFile, apply_config_file};
use crate::credentials::{load_certificate, load_key, load_request};
use crate::error::{Error, Result};
use crate::model::{ArgumentModel, ExplicitFlags, Ignored, OperationArgs, Resolved, Verbosity};
use crate::operation::match_operation;
use crate::scep::ScepEngine;
use crate::utils::resolve_url;

mod finalize;

/// Resolves a full command line (program name first) into validated,
/// defaulted arguments.
///
/// `engine` synthesises the self-signed signer certificate when an
/// enrollment does not supply one.
///
/// # Errors
/// Returns a usage, credential, configuration, validation or self-signed
/// certificate error; nothing is executed in that case.
pub fn resolve<I, T>(args: I, engine: &impl ScepEngine) -> Result<Resolved>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let raw = RawArgs::try_parse_from(args).map_err(Error::Usage)?;

    let mut positionals = raw.operation.iter();
    let token = positionals.next().ok_or(Error::MissingOperation)?;
    let operation = match_operation(token)?;
    let operation_args = OperationArgs::for_operation(operation)
        .ok_or(Error::Internal("operation cannot be selected from the command line"))?;
    debug!("Resolved operation {operation} from '{token}'");

    let mut model = ArgumentModel::new(operation_args);
    let mut ignored: Vec<Ignored> = positionals.cloned().map(Ignored::Argument).collect();
    for occurrence in raw.occurrences() {
        if !apply(&mut model, occurrence)? {
            let flag = Ignored::Flag(occurrence.flag);
            if !ignored.contains(&flag) {
                ignored.push(flag);
            }
        }
    }

    if let Some(path) = model.configuration.clone() {
        debug!("Loading configuration file {}", path.display());
        let config = ConfigFile::load(&path)?;
        apply_config_file(&mut model, &config)?;
    }

    let (common, operation) = finalize::finalize(model, engine)?;
    Ok(Resolved {
        common,
        operation,
        ignored,
    })
}

/// Applies one flag. Returns `false` when the flag has no meaning for the
/// active operation.
fn apply(model: &mut ArgumentModel, Occurrence { flag, value }: Occurrence<'_>) -> Result<bool> {
    let origin = flag.to_string();
    match flag {
        Flag::Url => {
            model.url =
                Some(resolve_url(value).map_err(|e| Error::invalid_option(origin, value, e))?);
        }
        Flag::Proxy => {
            model.proxy =
                Some(resolve_url(value).map_err(|e| Error::invalid_option(origin, value, e))?);
        }
        Flag::Configuration => model.configuration = Some(PathBuf::from(value)),
        Flag::CaCert => {
            if matches!(model.operation, OperationArgs::GetCaCert(_)) {
                model.ca_cert_target = Some(value.to_string());
            } else {
                model.ca_cert = Some(load_certificate(
                    Path::new(value),
                    &origin,
                    "CA certificate",
                )?);
            }
        }
        Flag::EncryptionAlgorithm => {
            model.encryption_algorithm = value
                .parse::<CipherAlgorithm>()
                .map_err(|e| Error::invalid_option(origin, value, e))?;
            model.explicit.insert(ExplicitFlags::ENCRYPTION_ALGORITHM);
        }
        Flag::SignatureAlgorithm => {
            model.signature_algorithm = value
                .parse::<DigestAlgorithm>()
                .map_err(|e| Error::invalid_option(origin, value, e))?;
            model.explicit.insert(ExplicitFlags::SIGNATURE_ALGORITHM);
        }
        Flag::Verbose => {
            model.verbosity = model.verbosity.max(Verbosity::Info);
            model.explicit.insert(ExplicitFlags::VERBOSITY);
        }
        Flag::Debug => {
            model.verbosity = model.verbosity.max(Verbosity::Debug);
            model.explicit.insert(ExplicitFlags::VERBOSITY);
        }
        _ => {
            let applied = apply_scoped(&mut model.operation, flag, value)?;
            if applied && flag == Flag::Resume {
                model.explicit.insert(ExplicitFlags::RESUME);
            }
            return Ok(applied);
        }
    }
    Ok(true)
}

fn apply_scoped(operation: &mut OperationArgs, flag: Flag, value: &str) -> Result<bool> {
    let origin = flag.to_string();
    let path = Path::new(value);
    match operation {
        OperationArgs::GetCaCert(args) => match flag {
            Flag::Identifier => args.identifier = Some(value.to_string()),
            Flag::FingerprintAlgorithm => {
                args.fingerprint_algorithm = Some(
                    value
                        .parse::<DigestAlgorithm>()
                        .map_err(|e| Error::invalid_option(origin, value, e))?,
                );
            }
            _ => return Ok(false),
        },
        OperationArgs::Enroll(args) => match flag {
            Flag::PrivateKey => args.request_key = Some(load_key(path, &origin, "request key")?),
            Flag::CertificateRequest => {
                args.request = Some(load_request(path, &origin, "request")?);
            }
            Flag::SignatureKey => {
                args.signature_key = Some(load_key(path, &origin, "signature key")?);
            }
            Flag::SignatureCert => {
                args.signature_cert =
                    Some(load_certificate(path, &origin, "signature certificate")?);
            }
            Flag::EncryptionCert => {
                args.encryption_cert =
                    Some(load_certificate(path, &origin, "encryption certificate")?);
            }
            Flag::CertTarget => args.cert_target = Some(PathBuf::from(value)),
            Flag::SelfSignedTarget => args.self_signed_target = Some(PathBuf::from(value)),
            Flag::PollInterval => args.poll_interval = Some(parse_number(flag, value)?),
            Flag::MaxPollTime => args.max_poll_time = Some(parse_number(flag, value)?),
            Flag::MaxPollCount => args.max_poll_count = Some(parse_number(flag, value)?),
            Flag::Resume => args.resume = true,
            _ => return Ok(false),
        },
        OperationArgs::GetCert(args) => match flag {
            Flag::PrivateKey => args.private_key = Some(load_key(path, &origin, "private key")?),
            Flag::CertTarget => {
                args.local_cert = Some(load_certificate(path, &origin, "local certificate")?);
            }
            Flag::Serial => args.serial = Some(value.to_string()),
            Flag::Out => args.cert_target = Some(PathBuf::from(value)),
            _ => return Ok(false),
        },
        OperationArgs::GetCrl(args) => match flag {
            Flag::PrivateKey => args.private_key = Some(load_key(path, &origin, "private key")?),
            Flag::CertTarget => {
                args.local_cert = Some(load_certificate(path, &origin, "local certificate")?);
            }
            Flag::Out => args.crl_target = Some(PathBuf::from(value)),
            _ => return Ok(false),
        },
        OperationArgs::GetNextCaCert(args) => match flag {
            Flag::CertChain => args.cert_chain = Some(PathBuf::from(value)),
            Flag::Out => args.signer_cert_target = Some(PathBuf::from(value)),
            _ => return Ok(false),
        },
    }
    Ok(true)
}

fn parse_number(flag: Flag, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|e| Error::invalid_option(flag.to_string(), value, e))
}
