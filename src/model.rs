use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::algorithm::{CipherAlgorithm, DigestAlgorithm};
use crate::args::Flag;
use crate::credentials::{Certificate, CertificateRequest, PrivateKey};
use crate::operation::Operation;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_MAX_POLL_TIME_SECS: u64 = 8 * 60 * 60;
pub const DEFAULT_MAX_POLL_COUNT: u64 = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    #[default]
    Unset,
    Info,
    Debug,
}

impl Verbosity {
    /// Default `tracing` filter directive for this level.
    #[must_use]
    pub fn filter(self) -> &'static str {
        match self {
            Self::Unset => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

/// Settings chosen explicitly on the command line. The configuration overlay
/// never replaces a setting recorded here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplicitFlags(u8);

impl ExplicitFlags {
    pub const ENCRYPTION_ALGORITHM: Self = Self(1);
    pub const SIGNATURE_ALGORITHM: Self = Self(1 << 1);
    pub const VERBOSITY: Self = Self(1 << 2);
    pub const RESUME: Self = Self(1 << 3);

    pub fn insert(&mut self, flag: Self) {
        self.0 |= flag.0;
    }

    #[must_use]
    pub fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }
}

/// Mutable argument state accumulated while resolving the command line.
#[derive(Debug, Default)]
pub struct ArgumentModel {
    pub url: Option<Url>,
    pub proxy: Option<Url>,
    pub configuration: Option<PathBuf>,
    pub ca_cert: Option<Certificate>,
    /// Output prefix for `GetCACert`; `-c` means this instead of `ca_cert`.
    pub ca_cert_target: Option<String>,
    pub encryption_algorithm: CipherAlgorithm,
    pub signature_algorithm: DigestAlgorithm,
    pub verbosity: Verbosity,
    pub explicit: ExplicitFlags,
    pub operation: OperationArgs,
}

impl ArgumentModel {
    #[must_use]
    pub fn new(operation: OperationArgs) -> Self {
        Self {
            operation,
            ..Self::default()
        }
    }
}

/// Operation-specific arguments, tagged by operation.
#[derive(Debug)]
pub enum OperationArgs {
    GetCaCert(GetCaArgs),
    /// `PKCSReq`, or `GetCertInitial` once `resume` is set.
    Enroll(EnrollArgs),
    GetCert(GetCertArgs),
    GetCrl(GetCrlArgs),
    GetNextCaCert(GetNextCaArgs),
}

impl Default for OperationArgs {
    fn default() -> Self {
        Self::GetCaCert(GetCaArgs::default())
    }
}

impl OperationArgs {
    /// Creates the empty argument set for `operation`.
    ///
    /// Returns `None` for operations that cannot be selected by the user.
    #[must_use]
    pub fn for_operation(operation: Operation) -> Option<Self> {
        match operation {
            Operation::GetCaCert => Some(Self::GetCaCert(GetCaArgs::default())),
            Operation::PkcsReq => Some(Self::Enroll(EnrollArgs::default())),
            Operation::GetCertInitial => Some(Self::Enroll(EnrollArgs {
                resume: true,
                ..EnrollArgs::default()
            })),
            Operation::GetCert => Some(Self::GetCert(GetCertArgs::default())),
            Operation::GetCrl => Some(Self::GetCrl(GetCrlArgs::default())),
            Operation::GetNextCaCert => Some(Self::GetNextCaCert(GetNextCaArgs::default())),
            Operation::None | Operation::CertRep => None,
        }
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::GetCaCert(_) => Operation::GetCaCert,
            Self::Enroll(args) if args.resume => Operation::GetCertInitial,
            Self::Enroll(_) => Operation::PkcsReq,
            Self::GetCert(_) => Operation::GetCert,
            Self::GetCrl(_) => Operation::GetCrl,
            Self::GetNextCaCert(_) => Operation::GetNextCaCert,
        }
    }
}

#[derive(Debug, Default)]
pub struct GetCaArgs {
    pub identifier: Option<String>,
    pub fingerprint_algorithm: Option<DigestAlgorithm>,
}

#[derive(Debug, Default)]
pub struct EnrollArgs {
    pub request_key: Option<PrivateKey>,
    pub request: Option<CertificateRequest>,
    pub signature_key: Option<PrivateKey>,
    pub signature_cert: Option<Certificate>,
    pub encryption_cert: Option<Certificate>,
    pub self_signed_target: Option<PathBuf>,
    pub cert_target: Option<PathBuf>,
    pub poll_interval: Option<u64>,
    pub max_poll_time: Option<u64>,
    pub max_poll_count: Option<u64>,
    pub resume: bool,
}

#[derive(Debug, Default)]
pub struct GetCertArgs {
    pub private_key: Option<PrivateKey>,
    pub local_cert: Option<Certificate>,
    pub serial: Option<String>,
    pub cert_target: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct GetCrlArgs {
    pub private_key: Option<PrivateKey>,
    pub local_cert: Option<Certificate>,
    pub crl_target: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct GetNextCaArgs {
    pub cert_chain: Option<PathBuf>,
    pub signer_cert_target: Option<PathBuf>,
}

/// Bounds for re-submitting a request while the CA reports it as pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_time: Duration,
    pub max_count: u64,
}

impl PollPolicy {
    /// A policy that sends exactly once.
    #[must_use]
    pub fn single() -> Self {
        Self {
            interval: Duration::ZERO,
            max_time: Duration::ZERO,
            max_count: 1,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_time: Duration::from_secs(DEFAULT_MAX_POLL_TIME_SECS),
            max_count: DEFAULT_MAX_POLL_COUNT,
        }
    }
}

/// Settings shared by every operation after resolution.
#[derive(Debug, Clone)]
pub struct CommonSettings {
    pub url: Url,
    pub proxy: Option<Url>,
    pub encryption_algorithm: CipherAlgorithm,
    pub signature_algorithm: DigestAlgorithm,
    pub verbosity: Verbosity,
}

/// Validated, defaulted arguments handed to an orchestrator.
#[derive(Debug)]
pub struct Resolved {
    pub common: CommonSettings,
    pub operation: ResolvedOperation,
    /// Input that was accepted but has no meaning for the selected operation.
    pub ignored: Vec<Ignored>,
}

/// Command-line input dropped during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ignored {
    /// A positional after the operation token.
    Argument(String),
    /// A flag outside the active operation's scope.
    Flag(Flag),
}

#[derive(Debug)]
pub enum ResolvedOperation {
    GetCaCert(GetCaRequest),
    Enroll(Box<EnrollRequest>),
    GetCert(GetCertRequest),
    GetCrl(GetCrlRequest),
    GetNextCaCert(GetNextCaRequest),
}

impl ResolvedOperation {
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::GetCaCert(_) => Operation::GetCaCert,
            Self::Enroll(request) => request.operation,
            Self::GetCert(_) => Operation::GetCert,
            Self::GetCrl(_) => Operation::GetCrl,
            Self::GetNextCaCert(_) => Operation::GetNextCaCert,
        }
    }
}

#[derive(Debug)]
pub struct GetCaRequest {
    pub target_prefix: String,
    pub identifier: Option<String>,
    pub fingerprint_algorithm: DigestAlgorithm,
}

#[derive(Debug)]
pub struct EnrollRequest {
    /// `PKCSReq`, or `GetCertInitial` when resuming.
    pub operation: Operation,
    pub ca_cert: Certificate,
    pub request_key: PrivateKey,
    pub request: CertificateRequest,
    pub signature_key: PrivateKey,
    pub signature_cert: Certificate,
    /// Set when `signature_cert` was generated locally from the request.
    pub self_signed: bool,
    pub encryption_cert: Certificate,
    pub self_signed_target: Option<PathBuf>,
    pub cert_target: PathBuf,
    pub poll: PollPolicy,
}

#[derive(Debug)]
pub struct GetCertRequest {
    pub ca_cert: Certificate,
    pub private_key: PrivateKey,
    pub local_cert: Certificate,
    pub serial: String,
    pub cert_target: PathBuf,
}

#[derive(Debug)]
pub struct GetCrlRequest {
    pub ca_cert: Certificate,
    pub private_key: PrivateKey,
    pub local_cert: Certificate,
    pub crl_target: PathBuf,
}

#[derive(Debug)]
pub struct GetNextCaRequest {
    pub ca_cert: Certificate,
    pub cert_chain: PathBuf,
    pub signer_cert_target: Option<PathBuf>,
}
