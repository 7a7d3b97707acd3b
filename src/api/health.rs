use poem_openapi::{payload::Json, ApiResponse, OpenApi};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::health::{HealthRegistry, HealthReport, HealthStatus};

pub struct HealthApi {
    registry: Arc<HealthRegistry>,
}

impl HealthApi {
    pub fn new(registry: Arc<HealthRegistry>) -> Self {
        Self { registry }
    }
}

/// Health of one check
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, poem_openapi::Object)]
pub struct HealthEntry {
    pub status: String,
    pub description: String,
    /// Extra key/value detail; always present, empty for breaker checks
    pub data: BTreeMap<String, String>,
}

/// Aggregated health check response
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, poem_openapi::Object)]
pub struct HealthReportBody {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub total_duration_ms: f64,
    pub entries: BTreeMap<String, HealthEntry>,
}

impl From<HealthReport> for HealthReportBody {
    fn from(report: HealthReport) -> Self {
        Self {
            status: report.status.to_string(),
            service: "WeatherGate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_duration_ms: report.total_duration.as_secs_f64() * 1000.0,
            entries: report
                .entries
                .into_iter()
                .map(|(name, snapshot)| {
                    (
                        name,
                        HealthEntry {
                            status: snapshot.status.to_string(),
                            description: snapshot.description,
                            data: BTreeMap::new(),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(ApiResponse)]
pub enum HealthResponse {
    /// Healthy or degraded; degraded must not trigger a restart
    #[oai(status = 200)]
    Ok(Json<HealthReportBody>),

    /// Unhealthy; load balancers should stop routing traffic here
    #[oai(status = 503)]
    ServiceUnavailable(Json<HealthReportBody>),
}

impl From<HealthReport> for HealthResponse {
    fn from(report: HealthReport) -> Self {
        match report.status {
            HealthStatus::Healthy | HealthStatus::Degraded => HealthResponse::Ok(Json(report.into())),
            HealthStatus::Unhealthy => HealthResponse::ServiceUnavailable(Json(report.into())),
        }
    }
}

#[OpenApi]
impl HealthApi {
    /// Detailed health of every registered dependency
    #[oai(path = "/hc", method = "get")]
    async fn hc(&self) -> HealthResponse {
        self.registry.readiness().into()
    }

    /// Process self-check, independent of downstream health
    #[oai(path = "/liveness", method = "get")]
    async fn liveness(&self) -> HealthResponse {
        self.registry.liveness().into()
    }
}
