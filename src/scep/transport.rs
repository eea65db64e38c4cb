use std::time::Duration;

use reqwest::{Client, Proxy, Url, header};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::PollPolicy;
use crate::operation::Operation;
use crate::utils::poll_while_pending;

/// Content type of a `GetCACert` reply carrying one bare DER certificate.
pub const CONTENT_TYPE_CA_CERT: &str = "application/x-x509-ca-cert";
const OPERATION_PKI: &str = "PKIOperation";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Raw reply from the SCEP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content_type: Option<String>,
    pub payload: Vec<u8>,
}

impl Reply {
    /// Whether the server sent a single certificate instead of PKCS#7.
    #[must_use]
    pub fn is_bare_ca_cert(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|value| value.trim().starts_with(CONTENT_TYPE_CA_CERT))
    }
}

/// Wire exchange with the SCEP server.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Sends `operation` with an optional message and repeats it according to
    /// `poll` while `is_pending` reports the reply as undecided.
    ///
    /// # Errors
    /// Returns `Transport` if the exchange fails or polling is exhausted.
    async fn send_request(
        &self,
        operation: Operation,
        message: Option<&str>,
        poll: &PollPolicy,
        is_pending: &dyn Fn(&Reply) -> bool,
    ) -> Result<Reply>;
}

/// SCEP over HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    /// Creates a transport for the server at `url`.
    ///
    /// # Errors
    /// Returns `Transport` if the proxy is invalid or the client cannot be built.
    pub fn new(url: Url, proxy: Option<&Url>) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
        if let Some(proxy) = proxy {
            let proxy = Proxy::all(proxy.as_str())
                .map_err(|e| Error::Transport(format!("Invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, url })
    }

    fn request_url(&self, operation: Operation, message: Option<&str>) -> Url {
        let name = if operation.is_enrollment() {
            OPERATION_PKI
        } else {
            operation.name()
        };
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("operation", name);
            if let Some(message) = message {
                query.append_pair("message", message);
            }
        }
        url
    }

    async fn send_once(&self, operation: Operation, message: Option<&str>) -> Result<Reply> {
        let url = self.request_url(operation, message);
        debug!("Sending {operation} request to {}", self.url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to send {operation} request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "Server returned {status} for {operation}: {body}"
            )));
        }
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let payload = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read {operation} reply: {e}")))?
            .to_vec();
        debug!(
            "Received {} bytes ({})",
            payload.len(),
            content_type.as_deref().unwrap_or("no content type")
        );
        Ok(Reply {
            content_type,
            payload,
        })
    }
}

impl Transport for HttpTransport {
    async fn send_request(
        &self,
        operation: Operation,
        message: Option<&str>,
        poll: &PollPolicy,
        is_pending: &dyn Fn(&Reply) -> bool,
    ) -> Result<Reply> {
        poll_while_pending(
            poll,
            |attempt| {
                if attempt > 1 {
                    info!("Polling {operation} (attempt {attempt}/{})", poll.max_count);
                }
                self.send_once(operation, message)
            },
            is_pending,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::*;

    fn transport(server: &MockServer) -> HttpTransport {
        let url = Url::parse(&format!("{}/cgi-bin/pkiclient.exe", server.uri())).unwrap();
        HttpTransport::new(url, None).unwrap()
    }

    fn quick_poll(max_count: u64) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            max_time: Duration::from_secs(30),
            max_count,
        }
    }

    struct PendingThenIssued {
        calls: Arc<AtomicUsize>,
        pending_replies: usize,
    }

    impl Respond for PendingThenIssued {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
            if attempt < self.pending_replies {
                ResponseTemplate::new(200).set_body_bytes(b"pending".to_vec())
            } else {
                ResponseTemplate::new(200).set_body_bytes(b"issued".to_vec())
            }
        }
    }

    #[tokio::test]
    async fn test_getca_request_carries_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/pkiclient.exe"))
            .and(query_param("operation", "GetCACert"))
            .and(query_param("message", "ca-one"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", CONTENT_TYPE_CA_CERT)
                    .set_body_bytes(vec![0x30, 0x00]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reply = transport(&server)
            .send_request(
                Operation::GetCaCert,
                Some("ca-one"),
                &PollPolicy::single(),
                &|_| false,
            )
            .await
            .unwrap();

        assert!(reply.is_bare_ca_cert());
        assert_eq!(reply.payload, vec![0x30, 0x00]);
    }

    #[tokio::test]
    async fn test_enrollment_uses_pki_operation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("operation", "PKIOperation"))
            .and(query_param("message", "MAMCAQU+/="))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"reply".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let reply = transport(&server)
            .send_request(
                Operation::GetCertInitial,
                Some("MAMCAQU+/="),
                &PollPolicy::single(),
                &|_| false,
            )
            .await
            .unwrap();

        assert_eq!(reply.payload, b"reply".to_vec());
        assert!(!reply.is_bare_ca_cert());
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = transport(&server)
            .send_request(Operation::GetCaCert, None, &PollPolicy::single(), &|_| false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_pending_reply_is_polled() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .respond_with(PendingThenIssued {
                calls: Arc::clone(&calls),
                pending_replies: 2,
            })
            .mount(&server)
            .await;

        let reply = transport(&server)
            .send_request(Operation::PkcsReq, Some("req"), &quick_poll(5), &|reply| {
                reply.payload == b"pending"
            })
            .await
            .unwrap();

        assert_eq!(reply.payload, b"issued".to_vec());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_polling_gives_up_at_max_count() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .respond_with(PendingThenIssued {
                calls: Arc::clone(&calls),
                pending_replies: usize::MAX,
            })
            .mount(&server)
            .await;

        let err = transport(&server)
            .send_request(Operation::PkcsReq, Some("req"), &quick_poll(3), &|reply| {
                reply.payload == b"pending"
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
