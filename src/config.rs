use std::time::Duration;

use crate::downstream::{default_backoff_schedule, DEFAULT_CALL_TIMEOUT};
use crate::error::ConfigError;
use crate::resilience::CircuitBreakerConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub temperature_service_url: String,
    pub failure_threshold: u32,
    pub break_duration: Duration,
    pub backoff_schedule: Vec<Duration>,
    /// Bound on a single HTTP attempt
    pub request_timeout: Duration,
    /// Bound on a whole logical call, retries and backoff included
    pub call_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            temperature_service_url: "http://localhost:5000".to_string(),
            failure_threshold: 2,
            break_duration: Duration::from_secs(60),
            backoff_schedule: default_backoff_schedule(),
            request_timeout: Duration::from_secs(2),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable values keep their defaults.
    ///
    /// Parsable but unusable breaker settings are kept so `validate` can report them.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            temperature_service_url: lookup("TEMPERATURE_SERVICE_URL")
                .unwrap_or(defaults.temperature_service_url),
            failure_threshold: number("BREAKER_FAILURE_THRESHOLD")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.failure_threshold),
            break_duration: number("BREAKER_BREAK_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.break_duration),
            backoff_schedule: lookup("RETRY_BACKOFF_MS")
                .and_then(|v| parse_schedule(&v))
                .unwrap_or(defaults.backoff_schedule),
            request_timeout: number("REQUEST_TIMEOUT_MS")
                .filter(|n| *n > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            call_timeout: number("CALL_TIMEOUT_MS")
                .filter(|n| *n > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.call_timeout),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if self.break_duration.is_zero() {
            return Err(ConfigError::ZeroBreakDuration);
        }
        if self.temperature_service_url.trim().is_empty() {
            return Err(ConfigError::MissingServiceUrl);
        }
        Ok(())
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            break_duration: self.break_duration,
        }
    }
}

/// Parse a comma-separated list of milliseconds; an empty list disables retries
fn parse_schedule(raw: &str) -> Option<Vec<Duration>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Vec::new());
    }
    raw.split(',')
        .map(|part| part.trim().parse::<u64>().ok().map(Duration::from_millis))
        .collect()
}
