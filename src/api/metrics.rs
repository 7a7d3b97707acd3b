use poem_openapi::{payload::Json, ApiResponse, OpenApi};
use std::sync::Arc;

use crate::health::{DependencyMetrics, HealthRegistry};

pub struct MetricsApi {
    registry: Arc<HealthRegistry>,
}

impl MetricsApi {
    pub fn new(registry: Arc<HealthRegistry>) -> Self {
        Self { registry }
    }
}

/// Metrics response
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, poem_openapi::Object)]
pub struct MetricsResponse {
    pub dependencies: Vec<DependencyMetricsBody>,
    pub timestamp: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, poem_openapi::Object)]
pub struct DependencyMetricsBody {
    pub name: String,
    pub circuit_breaker_state: String,
    pub consecutive_failures: u32,
    pub total_requests: Option<u64>,
    pub successful_requests: Option<u64>,
    pub failed_requests: Option<u64>,
    pub cancelled_requests: Option<u64>,
    pub success_rate: Option<f64>,
    pub average_response_time_ms: Option<f64>,
    pub total_retries: Option<u64>,
    pub circuit_breaker_rejections: Option<u64>,
}

impl From<DependencyMetrics> for DependencyMetricsBody {
    fn from(metrics: DependencyMetrics) -> Self {
        let calls = metrics.calls;
        Self {
            name: metrics.name,
            circuit_breaker_state: metrics.circuit_state.to_string(),
            consecutive_failures: metrics.consecutive_failures,
            total_requests: calls.as_ref().map(|c| c.total_requests),
            successful_requests: calls.as_ref().map(|c| c.successful_requests),
            failed_requests: calls.as_ref().map(|c| c.failed_requests),
            cancelled_requests: calls.as_ref().map(|c| c.cancelled_requests),
            success_rate: calls.as_ref().map(|c| c.success_rate),
            average_response_time_ms: calls.as_ref().map(|c| c.average_response_time_ms),
            total_retries: calls.as_ref().map(|c| c.total_retries),
            circuit_breaker_rejections: calls.as_ref().map(|c| c.circuit_breaker_rejections),
        }
    }
}

#[derive(ApiResponse)]
pub enum GetMetricsResponse {
    #[oai(status = 200)]
    Ok(Json<MetricsResponse>),
}

#[OpenApi]
impl MetricsApi {
    /// Call statistics and breaker state per dependency
    #[oai(path = "/metrics", method = "get")]
    async fn get_metrics(&self) -> GetMetricsResponse {
        GetMetricsResponse::Ok(Json(MetricsResponse {
            dependencies: self
                .registry
                .metrics()
                .into_iter()
                .map(DependencyMetricsBody::from)
                .collect(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallError;
    use crate::resilience::{CallExecutor, CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_get_metrics_empty() {
        let api = MetricsApi::new(Arc::new(HealthRegistry::new()));
        let GetMetricsResponse::Ok(Json(metrics)) = api.get_metrics().await;
        assert!(metrics.dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_get_metrics_circuit_breaker_rejections() {
        let breaker = CircuitBreaker::with_config(
            "temperature",
            CircuitBreakerConfig {
                failure_threshold: 1,
                break_duration: Duration::from_secs(60),
            },
        );
        let executor: CallExecutor<(), String> = CallExecutor::new(Arc::new(breaker), RetryPolicy::none());
        let registry = Arc::new(HealthRegistry::new());
        registry.register_executor("Temperature Service", &executor);
        let api = MetricsApi::new(registry);

        let cancel = CancellationToken::new();
        let _ = executor.call(&cancel, || async { Err("HTTP 500".to_string()) }).await;
        let rejected = executor.call(&cancel, || async { Ok(()) }).await;
        assert!(matches!(rejected, Err(CallError::CircuitOpen { .. })));

        let GetMetricsResponse::Ok(Json(metrics)) = api.get_metrics().await;
        let temperature = &metrics.dependencies[0];
        assert_eq!(temperature.name, "Temperature Service");
        assert_eq!(temperature.circuit_breaker_state, "Open");
        assert_eq!(temperature.total_requests, Some(1));
        assert_eq!(temperature.failed_requests, Some(1));
        assert_eq!(temperature.circuit_breaker_rejections, Some(1));
    }
}
