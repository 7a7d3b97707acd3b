use poem_openapi::{param::Path, payload::Json, ApiResponse, OpenApi};
use std::sync::Arc;
use tracing::warn;

use crate::downstream::{ResilientTemperatureClient, Temperature};
use crate::error::AppError;

pub struct TemperatureApi {
    client: Arc<ResilientTemperatureClient>,
}

impl TemperatureApi {
    pub fn new(client: Arc<ResilientTemperatureClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, poem_openapi::Object)]
pub struct TemperatureBody {
    pub location: String,
    pub temperature_c: f64,
    pub temperature_f: f64,
    pub summary: Option<String>,
}

impl From<Temperature> for TemperatureBody {
    fn from(reading: Temperature) -> Self {
        Self {
            temperature_f: reading.temperature_f(),
            location: reading.location,
            temperature_c: reading.temperature_c,
            summary: reading.summary,
        }
    }
}

#[derive(ApiResponse)]
pub enum GetTemperatureResponse {
    #[oai(status = 200)]
    Ok(Json<TemperatureBody>),
}

#[OpenApi]
impl TemperatureApi {
    /// Current temperature, fetched through the circuit breaker
    #[oai(path = "/temperature/:location", method = "get")]
    async fn get_temperature(
        &self,
        location: Path<String>,
    ) -> Result<GetTemperatureResponse, poem::Error> {
        match self.client.current_temperature(&location.0).await {
            Ok(reading) => Ok(GetTemperatureResponse::Ok(Json(reading.into()))),
            Err(e) => {
                warn!(location = %location.0, "Temperature lookup failed: {}", e);
                Err(AppError::from(e).into())
            }
        }
    }
}
