use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::error::{Error, Result};

mod overlay;

pub(crate) use overlay::apply_config_file;

/// Contents of a `scep-client` configuration file (TOML).
///
/// Every field is optional; values only fill settings left unset on the
/// command line.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub proxy: Option<String>,
    /// CA certificate to load, or the output prefix for `getca`.
    pub ca_cert: Option<String>,
    pub encryption_algorithm: Option<String>,
    pub signature_algorithm: Option<String>,
    pub verbosity: Option<String>,
    pub getca: Option<GetCaSection>,
    pub enroll: Option<EnrollSection>,
    pub getcert: Option<GetCertSection>,
    pub getcrl: Option<GetCrlSection>,
    pub getnextca: Option<GetNextCaSection>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct GetCaSection {
    pub identifier: Option<String>,
    pub fingerprint_algorithm: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct EnrollSection {
    pub private_key: Option<PathBuf>,
    pub request: Option<PathBuf>,
    pub signature_key: Option<PathBuf>,
    pub signature_cert: Option<PathBuf>,
    pub encryption_cert: Option<PathBuf>,
    pub self_signed_target: Option<PathBuf>,
    pub cert_target: Option<PathBuf>,
    pub poll_interval: Option<u64>,
    pub max_poll_time: Option<u64>,
    pub max_poll_count: Option<u64>,
    pub resume: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct GetCertSection {
    pub private_key: Option<PathBuf>,
    pub local_cert: Option<PathBuf>,
    pub serial: Option<String>,
    pub cert_target: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct GetCrlSection {
    pub private_key: Option<PathBuf>,
    pub local_cert: Option<PathBuf>,
    pub crl_target: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct GetNextCaSection {
    pub cert_chain: Option<PathBuf>,
    pub signer_cert_target: Option<PathBuf>,
}

impl ConfigFile {
    /// Loads a configuration file. The file is parsed as TOML regardless of
    /// its extension.
    ///
    /// # Errors
    /// Returns `Configuration` if the file is missing or cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let name = path.to_string_lossy();
        Config::builder()
            .add_source(File::new(&name, FileFormat::Toml).required(true))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))
    }
}
