use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, error};

use crate::downstream::error::DownstreamError;
use crate::downstream::models::Temperature;
use crate::downstream::TemperatureSource;

/// HTTP client for the temperature service.
///
/// Performs exactly one request per call; retries and circuit breaking are
/// layered on top by `ResilientTemperatureClient`.
pub struct TemperatureClient {
    base_url: Url,
    client: reqwest::Client,
}

impl TemperatureClient {
    /// Create a new client; `request_timeout` bounds a single attempt
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, DownstreamError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| DownstreamError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DownstreamError::InvalidUrl(base_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()?;

        Ok(Self { base_url, client })
    }

    /// Build URL for the temperature of one location
    fn build_url(&self, location: &str) -> Result<Url, DownstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DownstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("temperature")
            .push(location);
        Ok(url)
    }

    /// Get the current temperature for a location
    pub async fn get_temperature(&self, location: &str) -> Result<Temperature, DownstreamError> {
        let url = self.build_url(location)?;
        debug!("Getting temperature from temperature service: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("Temperature service error: {} - {}", status, text);
            return Err(DownstreamError::from_status_code(status.as_u16(), text));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl TemperatureSource for TemperatureClient {
    async fn current_temperature(&self, location: &str) -> Result<Temperature, DownstreamError> {
        self.get_temperature(location).await
    }
}
