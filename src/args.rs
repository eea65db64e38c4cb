use std::fmt;

use clap::{ArgAction, Parser};

const GETCA_HEADING: &str = "Options for OPERATION getca";
const GETNEXTCA_HEADING: &str = "Options for OPERATION getnextca";
const ENROLL_HEADING: &str = "Options for OPERATION enroll";
const GETCERT_HEADING: &str = "Options for OPERATION getcert";

/// Raw command line. Every flag is captured without interpretation; the
/// resolver assigns meaning once the operation is known, since several short
/// options mean different things per operation.
#[derive(Parser, Debug, Default)]
#[command(
    name = "scep-client",
    author,
    version,
    about = "SCEP client -- Command line interface to the client side of the SCEP protocol",
    long_about = None
)]
pub struct RawArgs {
    /// Operation: getca, enroll, getcert, getcrl or getnextca
    #[arg(value_name = "OPERATION")]
    pub operation: Vec<String>,

    /// SCEP server URL
    #[arg(short = 'u', long = "url", value_name = "url")]
    pub url: Vec<String>,

    /// Use proxy server at host:port
    #[arg(short = 'p', long = "proxy", value_name = "host:port")]
    pub proxy: Vec<String>,

    /// Use configuration file
    #[arg(short = 'f', long = "configuration", value_name = "file")]
    pub configuration: Vec<String>,

    /// CA certificate file (output prefix if OPERATION is getca)
    #[arg(short = 'c', long = "ca-cert", value_name = "file")]
    pub ca_cert: Vec<String>,

    /// PKCS#7 encryption algorithm (des|3des|blowfish)
    #[arg(short = 'E', long = "encryption-algorithm", value_name = "algorithm")]
    pub encryption_algorithm: Vec<String>,

    /// PKCS#7 signature algorithm (md5|sha1|sha256|sha512)
    #[arg(short = 'S', long = "signature-algorithm", value_name = "algorithm")]
    pub signature_algorithm: Vec<String>,

    /// Verbose output
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Debug (even more verbose output)
    #[arg(short = 'd', long, action = ArgAction::Count)]
    pub debug: u8,

    /// CA identifier string
    #[arg(short = 'i', long, value_name = "string", help_heading = GETCA_HEADING)]
    pub identifier: Vec<String>,

    /// Fingerprint algorithm (md5|sha1|sha256|sha512)
    #[arg(short = 'F', long = "fingerprint-algorithm", value_name = "name", help_heading = GETCA_HEADING)]
    pub fingerprint_algorithm: Vec<String>,

    /// Local certificate chain file for signature verification in PEM format
    #[arg(short = 'C', long = "cert-chain", value_name = "file", help_heading = GETNEXTCA_HEADING)]
    pub cert_chain: Vec<String>,

    /// Output file: signer certificate (getnextca), certificate (getcert) or CRL (getcrl)
    #[arg(
        short = 'w',
        long = "out",
        visible_aliases = ["signer-cert", "certificate-out", "crl-out"],
        value_name = "file",
        help_heading = GETNEXTCA_HEADING
    )]
    pub out: Vec<String>,

    /// Private key file
    #[arg(short = 'k', long = "private-key", value_name = "file", help_heading = ENROLL_HEADING)]
    pub private_key: Vec<String>,

    /// Certificate request file
    #[arg(short = 'r', long = "certificate-request", value_name = "file", help_heading = ENROLL_HEADING)]
    pub certificate_request: Vec<String>,

    /// Signature private key file, use with -O
    #[arg(short = 'K', long = "signature-key", value_name = "file", help_heading = ENROLL_HEADING)]
    pub signature_key: Vec<String>,

    /// Signature certificate (used instead of self-signed)
    #[arg(short = 'O', long = "signature-cert", value_name = "file", help_heading = ENROLL_HEADING)]
    pub signature_cert: Vec<String>,

    /// Write enrolled certificate in file (enroll), or local certificate file (getcert, getcrl)
    #[arg(
        short = 'l',
        long = "cert-target",
        visible_alias = "local-cert",
        value_name = "file",
        help_heading = ENROLL_HEADING
    )]
    pub cert_target: Vec<String>,

    /// Use different CA cert for encryption
    #[arg(short = 'e', long = "encryption-cert", value_name = "file", help_heading = ENROLL_HEADING)]
    pub encryption_cert: Vec<String>,

    /// Write selfsigned certificate in file
    #[arg(short = 'L', long = "self-signed-target", value_name = "file", help_heading = ENROLL_HEADING)]
    pub self_signed_target: Vec<String>,

    /// Polling interval in seconds
    #[arg(short = 't', long = "poll-interval", value_name = "secs", help_heading = ENROLL_HEADING)]
    pub poll_interval: Vec<String>,

    /// Max polling time in seconds
    #[arg(short = 'T', long = "max-poll-time", value_name = "secs", help_heading = ENROLL_HEADING)]
    pub max_poll_time: Vec<String>,

    /// Max number of GetCertInitial requests
    #[arg(short = 'n', long = "max-poll-count", value_name = "count", help_heading = ENROLL_HEADING)]
    pub max_poll_count: Vec<String>,

    /// Resume interrupted enrollment
    #[arg(short = 'R', long, action = ArgAction::Count, help_heading = ENROLL_HEADING)]
    pub resume: u8,

    /// Certificate serial number
    #[arg(short = 's', long, value_name = "number", help_heading = GETCERT_HEADING)]
    pub serial: Vec<String>,
}

/// Flags known to the command line, identified by their short option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Url,
    Proxy,
    Configuration,
    CaCert,
    EncryptionAlgorithm,
    SignatureAlgorithm,
    Verbose,
    Debug,
    Identifier,
    FingerprintAlgorithm,
    CertChain,
    Out,
    PrivateKey,
    CertificateRequest,
    SignatureKey,
    SignatureCert,
    CertTarget,
    EncryptionCert,
    SelfSignedTarget,
    PollInterval,
    MaxPollTime,
    MaxPollCount,
    Resume,
    Serial,
}

impl Flag {
    #[must_use]
    pub fn short(self) -> char {
        match self {
            Self::Url => 'u',
            Self::Proxy => 'p',
            Self::Configuration => 'f',
            Self::CaCert => 'c',
            Self::EncryptionAlgorithm => 'E',
            Self::SignatureAlgorithm => 'S',
            Self::Verbose => 'v',
            Self::Debug => 'd',
            Self::Identifier => 'i',
            Self::FingerprintAlgorithm => 'F',
            Self::CertChain => 'C',
            Self::Out => 'w',
            Self::PrivateKey => 'k',
            Self::CertificateRequest => 'r',
            Self::SignatureKey => 'K',
            Self::SignatureCert => 'O',
            Self::CertTarget => 'l',
            Self::EncryptionCert => 'e',
            Self::SelfSignedTarget => 'L',
            Self::PollInterval => 't',
            Self::MaxPollTime => 'T',
            Self::MaxPollCount => 'n',
            Self::Resume => 'R',
            Self::Serial => 's',
        }
    }

    /// Common flags are interpreted the same way for every operation.
    #[must_use]
    pub fn is_common(self) -> bool {
        matches!(
            self,
            Self::Url
                | Self::Proxy
                | Self::Configuration
                | Self::CaCert
                | Self::EncryptionAlgorithm
                | Self::SignatureAlgorithm
                | Self::Verbose
                | Self::Debug
        )
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}", self.short())
    }
}

/// One flag as it appeared on the command line. Switches carry an empty value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence<'a> {
    pub flag: Flag,
    pub value: &'a str,
}

impl RawArgs {
    /// All captured flags, common ones first. Repeated flags keep their
    /// command-line order so the last value wins when folded.
    #[must_use]
    pub fn occurrences(&self) -> Vec<Occurrence<'_>> {
        let valued: [(Flag, &[String]); 21] = [
            (Flag::Url, &self.url),
            (Flag::Proxy, &self.proxy),
            (Flag::Configuration, &self.configuration),
            (Flag::CaCert, &self.ca_cert),
            (Flag::EncryptionAlgorithm, &self.encryption_algorithm),
            (Flag::SignatureAlgorithm, &self.signature_algorithm),
            (Flag::Identifier, &self.identifier),
            (Flag::FingerprintAlgorithm, &self.fingerprint_algorithm),
            (Flag::CertChain, &self.cert_chain),
            (Flag::Out, &self.out),
            (Flag::PrivateKey, &self.private_key),
            (Flag::CertificateRequest, &self.certificate_request),
            (Flag::SignatureKey, &self.signature_key),
            (Flag::SignatureCert, &self.signature_cert),
            (Flag::CertTarget, &self.cert_target),
            (Flag::EncryptionCert, &self.encryption_cert),
            (Flag::SelfSignedTarget, &self.self_signed_target),
            (Flag::PollInterval, &self.poll_interval),
            (Flag::MaxPollTime, &self.max_poll_time),
            (Flag::MaxPollCount, &self.max_poll_count),
            (Flag::Serial, &self.serial),
        ];
        let switches = [
            (Flag::Verbose, self.verbose),
            (Flag::Debug, self.debug),
            (Flag::Resume, self.resume),
        ];

        let mut occurrences: Vec<Occurrence<'_>> = valued
            .iter()
            .flat_map(|(flag, values)| {
                values.iter().map(|value| Occurrence {
                    flag: *flag,
                    value: value.as_str(),
                })
            })
            .collect();
        for (flag, count) in switches {
            occurrences.extend((0..count).map(|_| Occurrence { flag, value: "" }));
        }
        occurrences.sort_by_key(|occurrence| !occurrence.flag.is_common());
        occurrences
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        RawArgs::command().debug_assert();
    }

    #[test]
    fn test_flags_may_precede_operation() {
        let raw = RawArgs::parse_from([
            "scep-client",
            "-u",
            "http://ca.example/scep",
            "-k",
            "key.pem",
            "enroll",
            "-l",
            "cert.pem",
        ]);
        assert_eq!(raw.operation, vec!["enroll"]);
        assert_eq!(raw.private_key, vec!["key.pem"]);
        assert_eq!(raw.cert_target, vec!["cert.pem"]);
    }

    #[test]
    fn test_repeated_flags_are_kept_in_order() {
        let raw = RawArgs::parse_from(["scep-client", "-u", "first", "-u", "second", "-R", "-R"]);
        let urls: Vec<&str> = raw
            .occurrences()
            .into_iter()
            .filter(|o| o.flag == Flag::Url)
            .map(|o| o.value)
            .collect();
        assert_eq!(urls, vec!["first", "second"]);
        assert_eq!(raw.resume, 2);
    }

    #[test]
    fn test_occurrences_list_common_flags_first() {
        let raw = RawArgs::parse_from(["scep-client", "getca", "-i", "ca1", "-v", "-c", "ca-"]);
        let flags: Vec<Flag> = raw.occurrences().into_iter().map(|o| o.flag).collect();
        assert_eq!(flags, vec![Flag::CaCert, Flag::Verbose, Flag::Identifier]);
    }

    #[test]
    fn test_aliases_share_short_option() {
        let raw = RawArgs::parse_from(["scep-client", "getcrl", "--crl-out", "crl.pem"]);
        assert_eq!(raw.out, vec!["crl.pem"]);
        let raw = RawArgs::parse_from(["scep-client", "getcert", "--local-cert", "me.pem"]);
        assert_eq!(raw.cert_target, vec!["me.pem"]);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(RawArgs::try_parse_from(["scep-client", "getca", "-Z"]).is_err());
    }

    #[test]
    fn test_flag_display() {
        assert_eq!(Flag::SignatureCert.to_string(), "-O");
        assert!(Flag::CaCert.is_common());
        assert!(!Flag::Resume.is_common());
    }
}
