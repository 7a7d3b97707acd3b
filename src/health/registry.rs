use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::warn;

use super::{snapshot, HealthSnapshot, HealthStatus};
use crate::resilience::{ApiMetrics, CallExecutor, CircuitBreaker, CircuitState, MetricsSnapshot};

/// Name of the process self-check
pub const SELF_CHECK: &str = "self";

/// Aggregated result of a set of checks
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Worst status among the entries, Healthy when there are none
    pub status: HealthStatus,
    pub total_duration: Duration,
    pub entries: BTreeMap<String, HealthSnapshot>,
}

impl HealthReport {
    fn from_entries(entries: Vec<HealthSnapshot>, started: Instant) -> Self {
        let status = entries
            .iter()
            .map(|entry| entry.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        Self {
            status,
            total_duration: started.elapsed(),
            entries: entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        }
    }
}

/// Call statistics of one dependency
#[derive(Debug, Clone)]
pub struct DependencyMetrics {
    pub name: String,
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub calls: Option<MetricsSnapshot>,
}

struct Dependency {
    breaker: Arc<CircuitBreaker>,
    metrics: Option<Arc<ApiMetrics>>,
}

/// Named breakers that make up the readiness view
#[derive(Default)]
pub struct HealthRegistry {
    dependencies: RwLock<BTreeMap<String, Dependency>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a breaker under `name`, replacing any earlier entry
    pub fn register(&self, name: impl Into<String>, breaker: Arc<CircuitBreaker>) {
        self.insert(name.into(), Dependency {
            breaker,
            metrics: None,
        });
    }

    /// Register an executor's breaker together with its call metrics
    pub fn register_executor<T, E>(&self, name: impl Into<String>, executor: &CallExecutor<T, E>) {
        self.insert(name.into(), Dependency {
            breaker: Arc::clone(executor.breaker()),
            metrics: Some(Arc::clone(executor.metrics())),
        });
    }

    fn insert(&self, name: String, dependency: Dependency) {
        let mut dependencies = self.dependencies.write().unwrap_or_else(PoisonError::into_inner);
        if dependencies.insert(name.clone(), dependency).is_some() {
            warn!("Replacing health check registration for {}", name);
        }
    }

    /// Process self-check only; downstream health never affects it
    pub fn liveness(&self) -> HealthReport {
        let started = Instant::now();
        HealthReport::from_entries(vec![self_check()], started)
    }

    /// Self-check plus a snapshot of every registered dependency
    pub fn readiness(&self) -> HealthReport {
        let started = Instant::now();
        let mut entries = vec![self_check()];
        entries.extend(
            self.read()
                .iter()
                .map(|(name, dependency)| snapshot(name, &dependency.breaker)),
        );
        HealthReport::from_entries(entries, started)
    }

    pub fn metrics(&self) -> Vec<DependencyMetrics> {
        self.read()
            .iter()
            .map(|(name, dependency)| DependencyMetrics {
                name: name.clone(),
                circuit_state: dependency.breaker.state(),
                consecutive_failures: dependency.breaker.consecutive_failures(),
                calls: dependency.metrics.as_ref().map(|m| m.snapshot()),
            })
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Dependency>> {
        self.dependencies.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn self_check() -> HealthSnapshot {
    HealthSnapshot::healthy(SELF_CHECK, "Process is running")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{CircuitBreakerConfig, ManualClock, Outcome, RetryPolicy};

    fn breaker(name: &str, clock: &ManualClock) -> Arc<CircuitBreaker> {
        Arc::new(
            CircuitBreaker::with_config(
                name,
                CircuitBreakerConfig {
                    failure_threshold: 1,
                    break_duration: Duration::from_secs(60),
                },
            )
            .with_clock(Arc::new(clock.clone())),
        )
    }

    fn record_failure(breaker: &CircuitBreaker) {
        let permit = breaker.allow().unwrap();
        breaker.record_outcome(permit, Outcome::Failure);
    }

    #[test]
    fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let report = registry.readiness();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.entries.len(), 1);
        assert!(report.entries.contains_key(SELF_CHECK));
    }

    #[test]
    fn test_readiness_rolls_up_worst_status() {
        let clock = ManualClock::new();
        let registry = HealthRegistry::new();
        let temperature = breaker("temperature", &clock);
        let humidity = breaker("humidity", &clock);
        registry.register("Temperature Service", Arc::clone(&temperature));
        registry.register("Humidity Service", Arc::clone(&humidity));

        assert_eq!(registry.readiness().status, HealthStatus::Healthy);

        record_failure(&temperature);
        let report = registry.readiness();
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.entries["Temperature Service"].status, HealthStatus::Unhealthy);
        assert_eq!(report.entries["Humidity Service"].status, HealthStatus::Healthy);

        clock.advance(Duration::from_secs(60));
        assert_eq!(registry.readiness().status, HealthStatus::Degraded);
    }

    #[test]
    fn test_liveness_ignores_dependencies() {
        let clock = ManualClock::new();
        let registry = HealthRegistry::new();
        let temperature = breaker("temperature", &clock);
        registry.register("Temperature Service", Arc::clone(&temperature));
        record_failure(&temperature);

        let report = registry.liveness();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.entries.keys().collect::<Vec<_>>(), vec![SELF_CHECK]);
    }

    #[test]
    fn test_register_replaces_existing_name() {
        let clock = ManualClock::new();
        let registry = HealthRegistry::new();
        let first = breaker("temperature", &clock);
        record_failure(&first);
        registry.register("Temperature Service", first);
        registry.register("Temperature Service", breaker("temperature", &clock));

        let report = registry.readiness();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_metrics_include_executor_counters() {
        let clock = ManualClock::new();
        let registry = HealthRegistry::new();
        let executor: CallExecutor<(), std::io::Error> =
            CallExecutor::new(breaker("temperature", &clock), RetryPolicy::none());
        registry.register_executor("Temperature Service", &executor);
        registry.register("Bare", breaker("bare", &clock));

        let metrics = registry.metrics();
        assert_eq!(metrics.len(), 2);
        let bare = metrics.iter().find(|m| m.name == "Bare").unwrap();
        assert!(bare.calls.is_none());
        let temperature = metrics.iter().find(|m| m.name == "Temperature Service").unwrap();
        assert_eq!(temperature.circuit_state, CircuitState::Closed);
        assert_eq!(temperature.calls.as_ref().unwrap().total_requests, 0);
    }
}
