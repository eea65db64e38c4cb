use std::fmt;

use crate::error::{Error, Result};

/// SCEP message/operation kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Operation {
    #[default]
    None,
    GetCaCert,
    GetNextCaCert,
    PkcsReq,
    GetCertInitial,
    GetCert,
    GetCrl,
    /// Response-only; never selected from the command line.
    CertRep,
}

impl Operation {
    /// Name used on the wire and in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::GetCaCert => "GetCACert",
            Self::GetNextCaCert => "GetNextCACert",
            Self::PkcsReq => "PKCSReq",
            Self::GetCertInitial => "GetCertInitial",
            Self::GetCert => "GetCert",
            Self::GetCrl => "GetCRL",
            Self::CertRep => "CertRep",
        }
    }

    /// Whether this operation carries the enrollment argument set.
    #[must_use]
    pub fn is_enrollment(self) -> bool {
        matches!(self, Self::PkcsReq | Self::GetCertInitial)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Command-line operation tokens in match order. A token selects the first
/// entry it starts with, so `getcacert` is `getca` while `getcert` is not.
const OPERATION_TOKENS: [(&str, Operation); 5] = [
    ("getca", Operation::GetCaCert),
    ("enroll", Operation::PkcsReq),
    ("getcert", Operation::GetCert),
    ("getcrl", Operation::GetCrl),
    ("getnextca", Operation::GetNextCaCert),
];

/// Maps a positional token to its operation.
///
/// # Errors
/// Returns `UnknownOperation` if the token does not start with any operation name.
pub fn match_operation(token: &str) -> Result<Operation> {
    OPERATION_TOKENS
        .iter()
        .find(|(name, _)| token.starts_with(name))
        .map(|(_, operation)| *operation)
        .ok_or_else(|| Error::UnknownOperation(token.to_string()))
}
