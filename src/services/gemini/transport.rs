use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{NetworkError, TransportError, TransportResult};
use crate::core::types::{AnalysisRequest, RawResponse};
use crate::services::gemini::request_builder::RequestBuilder;
use crate::utils::Metrics;

/// Status and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// One POST of a JSON body. Implementations do not retry.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: &serde_json::Value,
    ) -> Result<HttpReply, NetworkError>;
}

/// reqwest-backed sender used in production
pub struct ReqwestSender {
    http_client: reqwest::Client,
}

impl ReqwestSender {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl HttpSender for ReqwestSender {
    async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: &serde_json::Value,
    ) -> Result<HttpReply, NetworkError> {
        let response = self
            .http_client
            .post(url)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}

/// Result of classifying a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// 429, 5xx or a network-level failure
    Retryable(String),
    /// Any other non-2xx status
    Terminal { status: u16, message: String },
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Sort a reply into delivered / retryable / terminal
pub fn classify(reply: &HttpReply) -> Result<(), AttemptFailure> {
    let status = reply.status;

    if (200..300).contains(&status) {
        return Ok(());
    }

    if status == 429 || status >= 500 {
        return Err(AttemptFailure::Retryable(format!(
            "HTTP error! status: {}",
            status
        )));
    }

    Err(AttemptFailure::Terminal {
        status,
        message: server_message(reply),
    })
}

/// `error.message` from the body, else the canonical status text
fn server_message(reply: &HttpReply) -> String {
    serde_json::from_str::<ErrorEnvelope>(&reply.body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            reqwest::StatusCode::from_u16(reply.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP status {}", reply.status))
}

/// Wait after failed attempt `failed_attempt` (1-based): base, 2x base, 4x base, ...
pub fn backoff_delay(base: Duration, failed_attempt: u32) -> Duration {
    let exponent = failed_attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}

/// Sends a request with bounded attempts and exponential backoff
pub struct RetryingTransport<S: HttpSender = ReqwestSender> {
    sender: S,
    url: String,
    api_key: String,
    max_retries: u32,
    base_delay: Duration,
    metrics: Option<Metrics>,
}

impl RetryingTransport<ReqwestSender> {
    /// Production transport configured from `Config`
    pub fn from_config(config: &Config, metrics: Option<Metrics>) -> Result<Self> {
        let sender = ReqwestSender::new(config.api_timeout())?;
        Ok(Self::with_sender(config, sender, metrics))
    }
}

impl<S: HttpSender> RetryingTransport<S> {
    pub fn with_sender(config: &Config, sender: S, metrics: Option<Metrics>) -> Self {
        Self {
            sender,
            url: config.generate_content_url(),
            api_key: config.api_key().to_string(),
            max_retries: config.max_retries().max(1),
            base_delay: config.retry_base_delay(),
            metrics,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub async fn send(&self, request: &AnalysisRequest) -> TransportResult<RawResponse> {
        let body = RequestBuilder::body_json(request);
        self.send_body(&body).await
    }

    #[instrument(skip(self, body), fields(max_retries = self.max_retries))]
    pub async fn send_body(&self, body: &serde_json::Value) -> TransportResult<RawResponse> {
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.max_retries {
            let start = Instant::now();
            let result = self.sender.post_json(&self.url, &self.api_key, body).await;
            let elapsed = start.elapsed();

            let failure = match result {
                Ok(reply) => match classify(&reply) {
                    Ok(()) => {
                        self.record_attempt(true, elapsed);
                        debug!(
                            "Delivered on attempt {}/{} ({} bytes)",
                            attempt,
                            self.max_retries,
                            reply.body.len()
                        );
                        return Ok(RawResponse {
                            status: reply.status,
                            body: reply.body,
                            attempts: attempt,
                        });
                    }
                    Err(failure) => failure,
                },
                Err(e) => AttemptFailure::Retryable(e.to_string()),
            };

            self.record_attempt(false, elapsed);

            match failure {
                AttemptFailure::Terminal { status, message } => {
                    warn!("API request rejected with status {}: {}", status, message);
                    return Err(TransportError::Rejected { status, message });
                }
                AttemptFailure::Retryable(reason) => {
                    warn!(
                        "Attempt {}/{} failed: {}",
                        attempt, self.max_retries, reason
                    );
                    last_error = reason;

                    if attempt < self.max_retries {
                        let delay = backoff_delay(self.base_delay, attempt);
                        debug!("Waiting {}ms before retry", delay.as_millis());
                        if let Some(ref m) = self.metrics {
                            m.record_retry();
                        }
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(TransportError::Exhausted {
            attempts: self.max_retries,
            last_error,
        })
    }

    fn record_attempt(&self, success: bool, elapsed: Duration) {
        if let Some(ref m) = self.metrics {
            m.record_api_call(success, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::NetworkErrorKind;
    use crate::services::gemini::testing::ScriptedSender;

    fn assert_close(actual: Duration, expected_ms: u64) {
        let expected = Duration::from_millis(expected_ms);
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(5),
            "expected ~{}ms, got {:?}",
            expected_ms,
            actual
        );
    }

    fn transport(sender: ScriptedSender) -> RetryingTransport<ScriptedSender> {
        let config = Config::for_endpoint("http://mock.invalid", "test-key");
        RetryingTransport::with_sender(&config, sender, None)
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&HttpReply::new(200, "{}")), Ok(()));
        assert_eq!(classify(&HttpReply::new(204, "")), Ok(()));
        assert!(matches!(
            classify(&HttpReply::new(429, "")),
            Err(AttemptFailure::Retryable(_))
        ));
        assert!(matches!(
            classify(&HttpReply::new(503, "")),
            Err(AttemptFailure::Retryable(_))
        ));
        assert_eq!(
            classify(&HttpReply::new(
                400,
                r#"{"error":{"code":400,"message":"API key not valid."}}"#
            )),
            Err(AttemptFailure::Terminal {
                status: 400,
                message: "API key not valid.".to_string()
            })
        );
        assert_eq!(
            classify(&HttpReply::new(404, "<html>nope</html>")),
            Err(AttemptFailure::Terminal {
                status: 404,
                message: "Not Found".to_string()
            })
        );
    }

    #[test]
    fn test_backoff_schedule() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_success() {
        let sender = ScriptedSender::new(vec![
            Ok(HttpReply::new(429, "")),
            Ok(HttpReply::new(429, "")),
            Ok(HttpReply::new(200, r#"{"candidates":[]}"#)),
        ]);
        let transport = transport(sender);

        let start = tokio::time::Instant::now();
        let raw = transport.send_body(&serde_json::json!({})).await.unwrap();

        assert_eq!(transport.sender().calls(), 3);
        assert_eq!(raw.attempts, 3);
        assert_eq!(raw.status, 200);
        // 1000ms after the first failure, 2000ms after the second
        assert_close(start.elapsed(), 3000);
        let offsets = transport.sender().call_offsets();
        assert_eq!(offsets.len(), 3);
        assert_close(offsets[0], 0);
        assert_close(offsets[1], 1000);
        assert_close(offsets[2], 3000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_not_retried() {
        let sender = ScriptedSender::repeating(HttpReply::new(
            404,
            r#"{"error":{"message":"models/unknown is not found"}}"#,
        ));
        let transport = transport(sender);

        let err = transport.send_body(&serde_json::json!({})).await.unwrap_err();

        assert_eq!(transport.sender().calls(), 1);
        assert_eq!(
            err,
            TransportError::Rejected {
                status: 404,
                message: "models/unknown is not found".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_errors_exhaust_retries() {
        let sender = ScriptedSender::new(vec![
            Err(NetworkError::new(NetworkErrorKind::Timeout, "operation timed out")),
            Err(NetworkError::new(NetworkErrorKind::Connect, "connection reset")),
            Err(NetworkError::new(NetworkErrorKind::Connect, "dns error")),
        ]);
        let transport = transport(sender);

        let start = tokio::time::Instant::now();
        let err = transport.send_body(&serde_json::json!({})).await.unwrap_err();

        assert_eq!(transport.sender().calls(), 3);
        // No wait after the final attempt
        assert_close(start.elapsed(), 3000);
        match err {
            TransportError::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("dns error"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_then_success() {
        let sender = ScriptedSender::new(vec![
            Ok(HttpReply::new(500, "")),
            Ok(HttpReply::new(200, "{}")),
        ]);
        let metrics = Metrics::new();
        let config = Config::for_endpoint("http://mock.invalid", "test-key");
        let transport = RetryingTransport::with_sender(&config, sender, Some(metrics.clone()));

        let raw = transport.send_body(&serde_json::json!({})).await.unwrap();
        assert_eq!(raw.attempts, 2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.api_calls_total, 2);
        assert_eq!(snapshot.api_calls_failed, 1);
        assert_eq!(snapshot.api_retries_total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_budget() {
        let sender = ScriptedSender::repeating(HttpReply::new(503, ""));
        let config = Config::for_endpoint("http://mock.invalid", "k").with_retry(1, 1000);
        let transport = RetryingTransport::with_sender(&config, sender, None);

        let start = tokio::time::Instant::now();
        let err = transport.send_body(&serde_json::json!({})).await.unwrap_err();

        assert_eq!(transport.sender().calls(), 1);
        assert_close(start.elapsed(), 0);
        assert!(matches!(err, TransportError::Exhausted { attempts: 1, .. }));
    }
}
