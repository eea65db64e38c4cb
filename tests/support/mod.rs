// Shared by several test crates; each one uses only some of these helpers.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::EncapsulatedContentInfo;
use der::asn1::ObjectIdentifier;
use der::{Any, Encode, Tag, TagNumber};
use rcgen::{CertificateParams, DnType, KeyPair};
use scep_client::credentials::{Certificate, CertificateRequest, PrivateKey};
use scep_client::error::{Error, Result};
use scep_client::model::PollPolicy;
use scep_client::operation::Operation;
use scep_client::scep::{
    CmsEngine, EnrollmentMaterial, Envelope, EnvelopeAlgorithms, PkiStatus, Reply, ScepEngine,
    Transport, UnwrapKeys,
};

pub(crate) const CONTENT_TYPE_CA_RA_CERT: &str = "application/x-x509-ca-ra-cert";

const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");

/// Self-signed certificate DER for `common_name`.
pub(crate) fn certificate_der(common_name: &str) -> Vec<u8> {
    let mut params = CertificateParams::new(vec![common_name.to_string()]).unwrap();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    let key = KeyPair::generate().unwrap();
    params.self_signed(&key).unwrap().der().to_vec()
}

/// Degenerate `SignedData` carrying only `certs`, as sent for `GetCACert`.
///
/// Encoded by hand so the certificate set keeps the given order, the way a
/// server that does not sort its `SET OF` sends it.
pub(crate) fn certs_only(certs: &[Vec<u8>]) -> Vec<u8> {
    let empty_set = vec![0x31, 0x00];
    let mut fields = vec![
        CmsVersion::V1.to_der().unwrap(),
        empty_set.clone(),
        EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        }
        .to_der()
        .unwrap(),
    ];
    if !certs.is_empty() {
        let certificates = Any::new(
            Tag::ContextSpecific {
                constructed: true,
                number: TagNumber::N0,
            },
            certs.concat(),
        )
        .unwrap();
        fields.push(certificates.to_der().unwrap());
    }
    fields.push(empty_set);
    ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::new(Tag::Sequence, fields.concat()).unwrap(),
    }
    .to_der()
    .unwrap()
}

/// Credential files for an enrollment, written into one directory.
pub(crate) struct EnrollFiles {
    pub ca_cert: PathBuf,
    pub key: PathBuf,
    pub request: PathBuf,
    pub signer_key: PathBuf,
    pub signer_cert: PathBuf,
}

pub(crate) fn write_enroll_files(dir: &Path) -> EnrollFiles {
    let ca_cert = dir.join("ca.pem");
    let ca = certificate_der("ca.example");
    fs::write(&ca_cert, Certificate::from_der(ca).unwrap().to_pem()).unwrap();

    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec!["client.example".to_string()]).unwrap();
    params
        .distinguished_name
        .push(DnType::CommonName, "client.example");
    let csr = params.serialize_request(&key).unwrap();
    let request = dir.join("req.pem");
    fs::write(&request, csr.pem().unwrap()).unwrap();
    let key_path = dir.join("key.pem");
    fs::write(&key_path, key.serialize_pem()).unwrap();

    let signer_key = KeyPair::generate().unwrap();
    let signer = CertificateParams::new(vec!["signer.example".to_string()])
        .unwrap()
        .self_signed(&signer_key)
        .unwrap();
    let signer_cert = dir.join("signer.pem");
    fs::write(&signer_cert, signer.pem()).unwrap();
    let signer_key_path = dir.join("signer.key");
    fs::write(&signer_key_path, signer_key.serialize_pem()).unwrap();

    EnrollFiles {
        ca_cert,
        key: key_path,
        request,
        signer_key: signer_key_path,
        signer_cert,
    }
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// One outgoing request as seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentRequest {
    pub operation: Operation,
    pub message: Option<String>,
}

/// Plays back canned replies and applies the caller's polling rules.
pub(crate) struct ScriptedTransport {
    replies: RefCell<VecDeque<Result<Reply>>>,
    pub sent: RefCell<Vec<SentRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<Result<Reply>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            sent: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn sent(&self) -> Vec<SentRequest> {
        self.sent.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send_request(
        &self,
        operation: Operation,
        message: Option<&str>,
        poll: &PollPolicy,
        is_pending: &dyn Fn(&Reply) -> bool,
    ) -> Result<Reply> {
        for _ in 0..poll.max_count {
            self.sent.borrow_mut().push(SentRequest {
                operation,
                message: message.map(str::to_string),
            });
            let reply = self
                .replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Transport("no scripted reply left".to_string())))?;
            if !is_pending(&reply) {
                return Ok(reply);
            }
        }
        Err(Error::Transport("request still pending".to_string()))
    }
}

/// Reply whose payload [`ScriptedEngine`] reads as `status`.
pub(crate) fn status_reply(status: &str) -> Reply {
    Reply {
        content_type: Some("application/x-pki-message".to_string()),
        payload: status.as_bytes().to_vec(),
    }
}

/// Engine that reads the reply payload as a status word (`SUCCESS`,
/// `PENDING`, or `FAILURE:<info>`) and hands out preset certificates.
pub(crate) struct ScriptedEngine {
    pub issued: Vec<Certificate>,
    pub algorithms: RefCell<Option<EnvelopeAlgorithms>>,
    pub unwrap_operation: RefCell<Option<Operation>>,
}

impl ScriptedEngine {
    pub(crate) const ENVELOPE: [u8; 5] = [0x30, 0x03, 0x02, 0x01, 0x05];

    pub(crate) fn issuing(issued: Vec<Certificate>) -> Self {
        Self {
            issued,
            algorithms: RefCell::new(None),
            unwrap_operation: RefCell::new(None),
        }
    }
}

impl ScepEngine for ScriptedEngine {
    fn new_self_signed_certificate(
        &self,
        request: &CertificateRequest,
        key: &PrivateKey,
    ) -> Result<Certificate> {
        CmsEngine.new_self_signed_certificate(request, key)
    }

    fn build_enrollment_envelope(
        &self,
        _operation: Operation,
        _material: &EnrollmentMaterial<'_>,
        algorithms: EnvelopeAlgorithms,
    ) -> Result<Envelope> {
        self.algorithms.replace(Some(algorithms));
        Ok(Envelope::from_der(Self::ENVELOPE.to_vec()))
    }

    fn decode_envelope(&self, bytes: &[u8]) -> Result<Envelope> {
        Ok(Envelope::from_der(bytes.to_vec()))
    }

    fn pki_status(&self, envelope: &Envelope) -> Result<PkiStatus> {
        let text = String::from_utf8_lossy(envelope.der()).into_owned();
        match text.split_once(':') {
            Some(("FAILURE", info)) => Ok(PkiStatus::Failure(Some(info.to_string()))),
            _ if text == "SUCCESS" => Ok(PkiStatus::Success),
            _ if text == "PENDING" => Ok(PkiStatus::Pending),
            _ => Err(Error::ProtocolDecode(format!("unknown status {text}"))),
        }
    }

    fn unwrap_envelope(
        &self,
        _envelope: &Envelope,
        keys: UnwrapKeys<'_>,
        operation: Operation,
    ) -> Result<Vec<Certificate>> {
        assert!(keys.ca_cert.is_some());
        assert!(keys.decryption_key.is_some());
        self.unwrap_operation.replace(Some(operation));
        Ok(self.issued.clone())
    }
}
