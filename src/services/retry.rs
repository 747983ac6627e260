use anyhow::{anyhow, Result};
use log::warn;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;

/// Transport-level retry applied inside the remote clients. Stages above the clients never retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retry_count: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retry_count: usize, delay_seconds: u64) -> Self {
        Self {
            retry_count,
            delay: Duration::from_secs(delay_seconds),
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Sends the request produced by `build`, rebuilding it for every attempt so multipart bodies
/// can be resent. Non-retryable HTTP statuses are returned to the caller untouched.
pub async fn send_with_retry<F>(label: &str, policy: RetryPolicy, mut build: F) -> Result<Response>
where
    F: FnMut() -> Result<RequestBuilder>,
{
    let max_attempts = policy.retry_count + 1;
    let mut last_error = anyhow!("{} request was never sent", label);

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.delay).await;
        }

        match build()?.send().await {
            Ok(resp) if is_retryable(resp.status()) && attempt < max_attempts => {
                warn!(
                    "{} returned {} (attempt {}/{}), retrying...",
                    label,
                    resp.status(),
                    attempt,
                    max_attempts
                );
                last_error = anyhow!("{} returned {}", label, resp.status());
            }
            Ok(resp) => return Ok(resp),
            Err(e) => {
                warn!("{} request failed (attempt {}/{}): {}", label, attempt, max_attempts, e);
                last_error = anyhow!(e).context(format!("{} request failed", label));
            }
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_build_error_is_not_retried() {
        let mut calls = 0;
        let result = send_with_retry("Test", RetryPolicy::new(3, 0), || {
            calls += 1;
            Err(anyhow!("cannot build"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
