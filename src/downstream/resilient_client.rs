use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::downstream::error::DownstreamError;
use crate::downstream::models::Temperature;
use crate::downstream::TemperatureSource;
use crate::error::CallError;
use crate::resilience::{CallExecutor, CircuitBreaker, CircuitState, MetricsSnapshot, RetryPolicy};

/// Name the temperature dependency is known by in logs and health output
pub const TEMPERATURE_SERVICE: &str = "Temperature Service";

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

pub fn default_backoff_schedule() -> Vec<Duration> {
    vec![Duration::from_millis(100), Duration::from_millis(500)]
}

/// Temperature service client with retry, circuit breaker and metrics
pub struct ResilientTemperatureClient {
    source: Arc<dyn TemperatureSource>,
    executor: CallExecutor<Temperature, DownstreamError>,
    call_timeout: Duration,
}

impl ResilientTemperatureClient {
    /// Create a new resilient client around an existing breaker
    pub fn with_breaker(
        source: Arc<dyn TemperatureSource>,
        breaker: Arc<CircuitBreaker>,
        backoff_schedule: Vec<Duration>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            source,
            executor: CallExecutor::new(breaker, RetryPolicy::transient(backoff_schedule)),
            call_timeout,
        }
    }

    /// Get the current temperature for a location
    pub async fn current_temperature(
        &self,
        location: &str,
    ) -> Result<Temperature, CallError<DownstreamError>> {
        self.current_temperature_with_cancel(&CancellationToken::new(), location)
            .await
    }

    /// Same as `current_temperature`, abandoned when `cancel` fires
    pub async fn current_temperature_with_cancel(
        &self,
        cancel: &CancellationToken,
        location: &str,
    ) -> Result<Temperature, CallError<DownstreamError>> {
        self.executor
            .call_with_timeout(cancel, self.call_timeout, || {
                self.source.current_temperature(location)
            })
            .await
    }

    pub fn executor(&self) -> &CallExecutor<Temperature, DownstreamError> {
        &self.executor
    }

    /// Get metrics snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.executor.metrics().snapshot()
    }

    /// Get circuit breaker state
    pub fn circuit_breaker_state(&self) -> CircuitState {
        self.executor.breaker().state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::client::TemperatureClient;
    use crate::resilience::CircuitBreakerConfig;
    use serde_json::json;
    use wiremock::{matchers::*, Mock, MockServer, ResponseTemplate};

    fn resilient_client(base_url: &str, threshold: u32, call_timeout: Duration) -> ResilientTemperatureClient {
        let client = TemperatureClient::new(base_url, Duration::from_secs(2)).unwrap();
        let breaker = CircuitBreaker::with_config(
            TEMPERATURE_SERVICE,
            CircuitBreakerConfig {
                failure_threshold: threshold,
                break_duration: Duration::from_secs(60),
            },
        );
        ResilientTemperatureClient::with_breaker(
            Arc::new(client),
            Arc::new(breaker),
            vec![Duration::from_millis(10), Duration::from_millis(20)],
            call_timeout,
        )
    }

    fn reading() -> serde_json::Value {
        json!({ "location": "Paris", "temperature_c": 19.0 })
    }

    #[tokio::test]
    async fn test_resilient_client_success() {
        let mock_server = MockServer::start().await;
        let client = resilient_client(&mock_server.uri(), 2, DEFAULT_CALL_TIMEOUT);

        Mock::given(method("GET"))
            .and(path("/temperature/Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reading()))
            .mount(&mock_server)
            .await;

        let result = client.current_temperature("Paris").await;
        assert_eq!(result.unwrap().temperature_c, 19.0);

        let metrics = client.metrics();
        assert_eq!(metrics.total_requests, 1);
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.success_rate, 1.0);
    }

    #[tokio::test]
    async fn test_resilient_client_retries_on_failure() {
        let mock_server = MockServer::start().await;
        let client = resilient_client(&mock_server.uri(), 2, DEFAULT_CALL_TIMEOUT);

        // First two calls fail, third succeeds
        Mock::given(method("GET"))
            .and(path("/temperature/Paris"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/temperature/Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reading()))
            .mount(&mock_server)
            .await;

        let result = client.current_temperature("Paris").await;
        assert!(result.is_ok());

        let metrics = client.metrics();
        assert_eq!(metrics.total_requests, 1);
        assert_eq!(metrics.total_retries, 2);
        assert_eq!(client.executor().breaker().consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_resilient_client_does_not_retry_client_errors() {
        let mock_server = MockServer::start().await;
        let client = resilient_client(&mock_server.uri(), 2, DEFAULT_CALL_TIMEOUT);

        Mock::given(method("GET"))
            .and(path("/temperature/Atlantis"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let error = client.current_temperature("Atlantis").await.unwrap_err();
        assert_eq!(error.into_downstream().and_then(|e| e.status_code()), Some(404));
        assert_eq!(client.executor().breaker().consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_resilient_client_circuit_breaker_opens() {
        let mock_server = MockServer::start().await;
        let client = resilient_client(&mock_server.uri(), 2, DEFAULT_CALL_TIMEOUT);

        // Two calls of three attempts each; the rejected third call never arrives
        Mock::given(method("GET"))
            .and(path("/temperature/Paris"))
            .respond_with(ResponseTemplate::new(500))
            .expect(6)
            .mount(&mock_server)
            .await;

        let _ = client.current_temperature("Paris").await;
        let _ = client.current_temperature("Paris").await;
        assert_eq!(client.circuit_breaker_state(), CircuitState::Open);

        let result = client.current_temperature("Paris").await;
        assert!(result.unwrap_err().is_circuit_open());

        let metrics = client.metrics();
        assert_eq!(metrics.circuit_breaker_rejections, 1);
        assert_eq!(metrics.failed_requests, 2);
    }

    #[tokio::test]
    async fn test_resilient_client_timeout_is_not_a_breaker_failure() {
        let mock_server = MockServer::start().await;
        let client = resilient_client(&mock_server.uri(), 1, Duration::from_millis(100));

        Mock::given(method("GET"))
            .and(path("/temperature/Paris"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(reading())
                    .set_delay(Duration::from_secs(1)),
            )
            .mount(&mock_server)
            .await;

        let error = client.current_temperature("Paris").await.unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(client.circuit_breaker_state(), CircuitState::Closed);
        assert_eq!(client.metrics().cancelled_requests, 1);
    }
}
