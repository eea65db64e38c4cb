use std::path::PathBuf;

use clap::CommandFactory;
use clap::error::ErrorKind;
use thiserror::Error;

use crate::args::RawArgs;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a `scep-client` invocation can fail.
///
/// All variants are terminal for the current invocation. The binary prints the
/// `Display` form on a single line and exits with status 1.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed command line, rendered by clap with its own usage text.
    #[error("usage error: {0}")]
    Usage(#[source] clap::Error),

    #[error("usage error: unknown operation '{0}' (expected getca, enroll, getcert, getcrl or getnextca)")]
    UnknownOperation(String),

    #[error("usage error: Missing operation")]
    MissingOperation,

    /// A flag value that could not be interpreted.
    #[error("usage error: invalid value '{value}' for option {flag}: {reason}")]
    InvalidOption {
        flag: String,
        value: String,
        reason: String,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("credential error: Failed to load {what} from {} ({origin}): {reason}", path.display())]
    CredentialLoad {
        origin: String,
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("configuration error: Loading configuration file data failed: {0}")]
    Configuration(String),

    #[error("crypto error: Error generating selfsigned certificate: {0}")]
    SelfSigned(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("protocol error: {0}")]
    ProtocolDecode(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// The CA answered with `pkiStatus = FAILURE`.
    #[error("protocol error: request rejected by CA: {0}")]
    Rejected(String),

    #[error("protocol error: No certificates in response")]
    NoCertificate,

    #[error("not implemented: operation {0} is not yet implemented")]
    NotImplemented(&'static str),

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl Error {
    pub(crate) fn invalid_option(
        flag: impl Into<String>,
        value: &str,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidOption {
            flag: flag.into(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Converts a command-line error into a `clap::Error` that renders with
    /// the usage line. Other errors are handed back unchanged.
    ///
    /// # Errors
    /// Returns `self` when it is not a command-line error.
    pub fn into_usage(self) -> std::result::Result<clap::Error, Self> {
        let (kind, message) = match self {
            Self::Usage(err) => return Ok(err),
            Self::MissingOperation => (
                ErrorKind::MissingRequiredArgument,
                "Missing operation".to_string(),
            ),
            Self::UnknownOperation(token) => (
                ErrorKind::InvalidValue,
                format!(
                    "unknown operation '{token}' (expected getca, enroll, getcert, getcrl or getnextca)"
                ),
            ),
            Self::InvalidOption {
                flag,
                value,
                reason,
            } => (
                ErrorKind::InvalidValue,
                format!("invalid value '{value}' for option {flag}: {reason}"),
            ),
            other => return Err(other),
        };
        Ok(RawArgs::command().error(kind, message))
    }

    /// Returns true when the error is clap asking to print help or version text.
    #[must_use]
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            Self::Usage(err) if matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            )
        )
    }
}
