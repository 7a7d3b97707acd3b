pub mod client;
pub mod error;
pub mod models;
pub mod resilient_client;

pub use client::*;
pub use error::*;
pub use models::*;
pub use resilient_client::*;

use async_trait::async_trait;

/// One request to the temperature service, response or error.
///
/// Implementations perform a single attempt and own their transport; the
/// resilience layer only ever sees this trait.
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    async fn current_temperature(&self, location: &str) -> Result<Temperature, DownstreamError>;
}
