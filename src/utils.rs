use std::future::Future;

use reqwest::Url;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::PollPolicy;

/// Parses a server or proxy URL, assuming `http://` when no scheme is given.
///
/// # Errors
/// Returns the parser's message if the value is not a valid URL even after
/// normalisation.
pub fn resolve_url(value: &str) -> std::result::Result<Url, String> {
    let value = value.trim();
    let parsed = if value.contains("://") {
        Url::parse(value)
    } else {
        Url::parse(&format!("http://{value}"))
    };
    parsed.map_err(|e| e.to_string())
}

/// Repeats `attempt` while `is_pending` reports the reply as undecided.
///
/// Stops after `policy.max_count` attempts, or when sleeping another
/// `policy.interval` would exceed `policy.max_time`.
///
/// # Errors
/// Returns the first error from `attempt`, or `Transport` once the policy is
/// exhausted with the request still pending.
pub async fn poll_while_pending<T, F, Fut, P>(
    policy: &PollPolicy,
    mut attempt: F,
    is_pending: P,
) -> Result<T>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
{
    let started = Instant::now();
    let mut count = 0u64;
    loop {
        count += 1;
        let reply = attempt(count).await?;
        if !is_pending(&reply) {
            return Ok(reply);
        }
        if count >= policy.max_count {
            return Err(Error::Transport(format!(
                "request still pending after {count} attempts"
            )));
        }
        if started.elapsed() + policy.interval > policy.max_time {
            return Err(Error::Transport(format!(
                "request still pending after {}s",
                started.elapsed().as_secs()
            )));
        }
        debug!(
            "Request pending (attempt {count}/{}), polling again in {}s",
            policy.max_count,
            policy.interval.as_secs()
        );
        tokio::time::sleep(policy.interval).await;
    }
}
