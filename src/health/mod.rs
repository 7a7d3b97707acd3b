//! Health view over circuit breakers.
//!
//! Nothing here stores health: every snapshot is recomputed from breaker state
//! when asked for, so it cannot drift from the breaker.

pub mod registry;

pub use registry::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resilience::{CircuitBreaker, CircuitState};

/// Severity reported to probes, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Unhealthy => "Unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CircuitState> for HealthStatus {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => HealthStatus::Healthy,
            CircuitState::HalfOpen => HealthStatus::Degraded,
            CircuitState::Open => HealthStatus::Unhealthy,
        }
    }
}

/// Point-in-time health of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub name: String,
    pub status: HealthStatus,
    pub description: String,
}

impl HealthSnapshot {
    pub fn from_state(name: impl Into<String>, state: CircuitState) -> Self {
        let description = match state {
            CircuitState::Closed => "Circuit breaker is in closed state",
            CircuitState::HalfOpen => "Circuit breaker is in half-open state",
            CircuitState::Open => "Circuit breaker is in open state",
        };
        Self {
            name: name.into(),
            status: state.into(),
            description: description.to_string(),
        }
    }

    pub fn healthy(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            description: description.into(),
        }
    }
}

/// Sample a breaker into a snapshot without touching its state
pub fn snapshot(name: &str, breaker: &CircuitBreaker) -> HealthSnapshot {
    HealthSnapshot::from_state(name, breaker.state())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{CircuitBreakerConfig, ManualClock, Outcome};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_status_mapping_is_total() {
        let mapped: Vec<(CircuitState, HealthStatus)> = CircuitState::ALL
            .iter()
            .map(|state| (*state, HealthStatus::from(*state)))
            .collect();

        assert_eq!(
            mapped,
            vec![
                (CircuitState::Closed, HealthStatus::Healthy),
                (CircuitState::Open, HealthStatus::Unhealthy),
                (CircuitState::HalfOpen, HealthStatus::Degraded),
            ]
        );
    }

    #[test]
    fn test_mapping_is_pure() {
        for state in CircuitState::ALL {
            assert_eq!(
                HealthSnapshot::from_state("temperature", state),
                HealthSnapshot::from_state("temperature", state)
            );
        }
    }

    #[test]
    fn test_status_ordering() {
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Unhealthy);
    }

    #[test]
    fn test_snapshot_follows_breaker() {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::with_config(
            "temperature",
            CircuitBreakerConfig {
                failure_threshold: 1,
                break_duration: Duration::from_secs(60),
            },
        )
        .with_clock(Arc::new(clock.clone()));

        assert_eq!(snapshot("Temperature Service", &breaker).status, HealthStatus::Healthy);

        let permit = breaker.allow().unwrap();
        breaker.record_outcome(permit, Outcome::Failure);
        let open = snapshot("Temperature Service", &breaker);
        assert_eq!(open.status, HealthStatus::Unhealthy);
        assert_eq!(open.description, "Circuit breaker is in open state");

        clock.advance(Duration::from_secs(60));
        assert_eq!(snapshot("Temperature Service", &breaker).status, HealthStatus::Degraded);
        // Sampling never claims the trial
        assert!(breaker.allow().is_some());
    }
}
