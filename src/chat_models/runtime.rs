use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

const MAX_RETRY_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: Some(60),
            retries: 0,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug)]
pub(crate) enum RequestFailure {
    Transport {
        source: reqwest::Error,
        attempts: u32,
    },
    Api {
        status: StatusCode,
        body: String,
        attempts: u32,
    },
}

/// Successful HTTP exchange plus the number of attempts it took.
#[derive(Debug)]
pub(crate) struct Delivered {
    pub response: reqwest::Response,
    pub attempts: u32,
}

pub(crate) async fn post_json_with_retry<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    payload: &T,
    policy: RetryPolicy,
) -> Result<Delivered, RequestFailure> {
    let max_attempts = policy.retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        let mut request = client.post(url).bearer_auth(api_key).json(payload);
        if let Some(timeout_secs) = policy.timeout_secs {
            request = request.timeout(Duration::from_secs(timeout_secs));
        }

        debug!(url, attempt = attempt + 1, max_attempts, "sending chat request");
        let retry_allowed = attempt + 1 < max_attempts;

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                return Ok(Delivered {
                    response,
                    attempts: attempt + 1,
                });
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();

                if !(retry_allowed && is_retryable_status(status)) {
                    return Err(RequestFailure::Api {
                        status,
                        body,
                        attempts: attempt + 1,
                    });
                }
                warn!(%status, attempt = attempt + 1, "retryable API status");
            }
            Err(source) => {
                if !(retry_allowed && is_retryable_transport_error(&source)) {
                    return Err(RequestFailure::Transport {
                        source,
                        attempts: attempt + 1,
                    });
                }
                warn!(error = %source, attempt = attempt + 1, "retryable transport error");
            }
        }

        sleep(retry_delay(attempt, policy.retry_delay_ms)).await;
        attempt += 1;
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn retry_delay(attempt: u32, base_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_RETRY_DELAY_MS))
}

#[cfg(test)]
mod tests {
    use super::{is_retryable_status, retry_delay};
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(retry_delay(0, 250), Duration::from_millis(250));
        assert_eq!(retry_delay(1, 250), Duration::from_millis(500));
        assert_eq!(retry_delay(3, 250), Duration::from_millis(2_000));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(retry_delay(12, 500), Duration::from_millis(30_000));
        assert_eq!(retry_delay(64, 1), Duration::from_millis(30_000));
        assert_eq!(retry_delay(0, 0), Duration::ZERO);
    }

    #[test]
    fn only_throttling_and_server_errors_are_retried() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::GATEWAY_TIMEOUT));

        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!is_retryable_status(StatusCode::OK));
    }
}
