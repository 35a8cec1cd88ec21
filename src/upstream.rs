//! Outbound HTTP to third-party services: one timeout-bounded client and a
//! small retry loop for transient failures.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::UpstreamConfig;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream timed out")]
    Timeout,
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
    #[error("upstream rejected the request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &UpstreamConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            backoff: cfg.backoff(),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1 << attempt.min(16))
    }
}

pub fn http_client(cfg: &UpstreamConfig) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(cfg.timeout())
        .connect_timeout(cfg.timeout())
        .build()?)
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_transient_error(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

/// Sends the request built by `build`, retrying connect/timeout failures and
/// 502/503/504 responses up to `policy.max_retries` extra times. Any other
/// non-success status is returned as an error immediately.
pub async fn send_with_retry<F>(policy: RetryPolicy, build: F) -> Result<Response, UpstreamError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let outcome = build().send().await;
        let retryable = match &outcome {
            Ok(resp) if resp.status().is_success() => false,
            Ok(resp) => is_transient_status(resp.status()),
            Err(e) => is_transient_error(e),
        };

        if !retryable || attempt >= policy.max_retries {
            return match outcome {
                Ok(resp) if resp.status().is_success() => {
                    debug!(attempt, status = %resp.status(), "upstream ok");
                    Ok(resp)
                }
                Ok(resp) => Err(UpstreamError::Status(resp.status().as_u16())),
                Err(e) => Err(e.into()),
            };
        }

        let delay = policy.delay(attempt);
        match &outcome {
            Ok(resp) => warn!(attempt, status = %resp.status(), ?delay, "upstream transient status, retrying"),
            Err(e) => warn!(attempt, error = %e, ?delay, "upstream transient failure, retrying"),
        }
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use axum::{http::StatusCode as AxumStatus, routing::get, Router};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        }
    }

    fn client(timeout_ms: u64) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap()
    }

    /// Answers with `fail` for the first `failures` hits, then 200.
    fn flaky(hits: Arc<AtomicUsize>, failures: usize, fail: AxumStatus) -> Router {
        Router::new().route(
            "/",
            get(move || {
                let hits = hits.clone();
                async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        (fail, "nope")
                    } else {
                        (AxumStatus::OK, "fine")
                    }
                }
            }),
        )
    }

    #[tokio::test]
    async fn retries_transient_status_until_success() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = test_server::spawn(flaky(hits.clone(), 2, AxumStatus::SERVICE_UNAVAILABLE)).await;
        let http = client(2000);
        let url = format!("http://{addr}/");

        let resp = send_with_retry(policy(), || http.get(&url)).await.unwrap();
        assert_eq!(resp.text().await.unwrap(), "fine");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = test_server::spawn(flaky(hits.clone(), 10, AxumStatus::BAD_GATEWAY)).await;
        let http = client(2000);
        let url = format!("http://{addr}/");

        let err = send_with_retry(policy(), || http.get(&url)).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(502)));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = test_server::spawn(flaky(hits.clone(), 10, AxumStatus::BAD_REQUEST)).await;
        let http = client(2000);
        let url = format!("http://{addr}/");

        let err = send_with_retry(policy(), || http.get(&url)).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(400)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hung_upstream_times_out() {
        let app = Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let addr = test_server::spawn(app).await;
        let http = client(50);
        let url = format!("http://{addr}/");

        let no_retry = RetryPolicy {
            max_retries: 0,
            backoff: Duration::from_millis(1),
        };
        let err = send_with_retry(no_retry, || http.get(&url)).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout));
    }
}
