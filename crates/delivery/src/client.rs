//! Bounded-retry client for the conversions endpoint.

use relay_core::error::RelayError;
use relay_core::event::EventBatch;
use std::time::Duration;
use tracing::{debug, warn};

use crate::transport::ConversionTransport;

/// Retry only server-side errors and rate limiting; a 4xx means the
/// payload or credential is wrong and a retry cannot fix it.
pub fn status_is_retryable(status: u16) -> bool {
    status >= 500 || status == 429
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff: attempt number times the base delay. Tests run the
    /// policy with a zero base delay, so no wall-clock sleeps.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

pub struct ConversionsClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: ConversionTransport> ConversionsClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Send a batch, retrying transient failures up to the attempt bound.
    /// Returns the parsed response body on success; the error carries the
    /// final status and body otherwise.
    pub async fn deliver(&self, batch: &EventBatch) -> Result<serde_json::Value, RelayError> {
        let max = self.policy.max_attempts.max(1);
        let mut last_message = String::new();

        for attempt in 1..=max {
            match self.transport.post(batch).await {
                Ok(response) if response.is_success() => {
                    debug!(attempt, status = response.status, "conversion batch delivered");
                    metrics::counter!("delivery.success").increment(1);
                    let parsed = serde_json::from_str(&response.body)
                        .unwrap_or(serde_json::Value::Null);
                    return Ok(parsed);
                }
                Ok(response) => {
                    if status_is_retryable(response.status) && attempt < max {
                        warn!(
                            status = response.status,
                            attempt, "transient delivery failure, backing off"
                        );
                        metrics::counter!("delivery.retries").increment(1);
                        tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    metrics::counter!("delivery.failures").increment(1);
                    return Err(RelayError::Delivery {
                        status: response.status,
                        body: response.body,
                    });
                }
                Err(failure) => {
                    if failure.retryable && attempt < max {
                        warn!(
                            error = %failure.message,
                            attempt, "transport failure, backing off"
                        );
                        metrics::counter!("delivery.retries").increment(1);
                        tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
                        last_message = failure.message;
                        continue;
                    }
                    metrics::counter!("delivery.failures").increment(1);
                    return Err(RelayError::DeliveryExhausted {
                        attempts: attempt,
                        message: failure.message,
                    });
                }
            }
        }

        Err(RelayError::DeliveryExhausted {
            attempts: max,
            message: last_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use relay_core::event::{ConversionEvent, EventBatch, UserData, EVENT_PURCHASE};
    use std::sync::Arc;

    fn batch() -> EventBatch {
        EventBatch::single(
            ConversionEvent {
                event_name: EVENT_PURCHASE.to_string(),
                event_time: 1_700_000_000,
                event_id: "abc123".to_string(),
                event_source_url: None,
                action_source: "website".to_string(),
                user_data: UserData::default(),
                custom_data: None,
            },
            None,
        )
    }

    fn client(transport: Arc<MockTransport>) -> ConversionsClient<Arc<MockTransport>> {
        ConversionsClient::new(
            transport,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn test_success_returns_parsed_body() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_with(200, r#"{"events_received":1}"#);

        let body = client(transport.clone()).deliver(&batch()).await.unwrap();
        assert_eq!(body["events_received"], 1);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_three_server_errors_exhaust_retries() {
        let transport = Arc::new(MockTransport::new());
        for _ in 0..3 {
            transport.respond_with(503, "unavailable");
        }

        let err = client(transport.clone()).deliver(&batch()).await.unwrap_err();
        assert_eq!(transport.request_count(), 3);
        match err {
            RelayError::Delivery { status, .. } => assert_eq!(status, 503),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_is_terminal_on_first_attempt() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_with(404, "unknown pixel");

        let err = client(transport.clone()).deliver(&batch()).await.unwrap_err();
        assert_eq!(transport.request_count(), 1);
        match err {
            RelayError::Delivery { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "unknown pixel");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_with(429, "slow down");
        transport.respond_with(200, "{}");

        client(transport.clone()).deliver(&batch()).await.unwrap();
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_with(true, "request timed out");
        transport.respond_with(200, "{}");

        client(transport.clone()).deliver(&batch()).await.unwrap();
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_transport_failure_is_terminal() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_with(false, "tls handshake rejected");

        let err = client(transport.clone()).deliver(&batch()).await.unwrap_err();
        assert_eq!(transport.request_count(), 1);
        assert!(matches!(err, RelayError::DeliveryExhausted { attempts: 1, .. }));
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
    }
}
