use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};
use ring::digest::{SHA1_FOR_LEGACY_USE_ONLY, SHA256, SHA512, digest};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmCategory {
    Cipher,
    Digest,
}

impl fmt::Display for AlgorithmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cipher => f.write_str("cipher"),
            Self::Digest => f.write_str("digest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {category} algorithm '{name}'")]
pub struct UnknownAlgorithm {
    pub category: AlgorithmCategory,
    pub name: String,
}

/// PKCS#7 content-encryption algorithms selectable with `-E`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CipherAlgorithm {
    Des,
    #[default]
    TripleDes,
    Blowfish,
}

impl CipherAlgorithm {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Des => "des",
            Self::TripleDes => "3des",
            Self::Blowfish => "blowfish",
        }
    }

    /// Dotted OID of the CBC mode identifier used in `EnvelopedData`.
    #[must_use]
    pub fn oid(self) -> &'static str {
        match self {
            Self::Des => "1.3.14.3.2.7",
            Self::TripleDes => "1.2.840.113549.3.7",
            Self::Blowfish => "1.3.6.1.4.1.3029.1.2",
        }
    }
}

impl FromStr for CipherAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "des" => Ok(Self::Des),
            "3des" => Ok(Self::TripleDes),
            "blowfish" => Ok(Self::Blowfish),
            _ => Err(UnknownAlgorithm {
                category: AlgorithmCategory::Cipher,
                name: name.to_string(),
            }),
        }
    }
}

/// Message digests selectable with `-S` and `-F`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    #[must_use]
    pub fn oid(self) -> &'static str {
        match self {
            Self::Md5 => "1.2.840.113549.2.5",
            Self::Sha1 => "1.3.14.3.2.26",
            Self::Sha256 => "2.16.840.1.101.3.4.2.1",
            Self::Sha512 => "2.16.840.1.101.3.4.2.3",
        }
    }

    #[must_use]
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Md5 => Md5::digest(data).to_vec(),
            Self::Sha1 => digest(&SHA1_FOR_LEGACY_USE_ONLY, data).as_ref().to_vec(),
            Self::Sha256 => digest(&SHA256, data).as_ref().to_vec(),
            Self::Sha512 => digest(&SHA512, data).as_ref().to_vec(),
        }
    }

    /// Colon-separated upper-case hex digest, as printed in certificate summaries.
    #[must_use]
    pub fn fingerprint(self, data: &[u8]) -> String {
        self.digest(data)
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl FromStr for DigestAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(UnknownAlgorithm {
                category: AlgorithmCategory::Digest,
                name: name.to_string(),
            }),
        }
    }
}
