use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for calls made through one executor
#[derive(Debug, Default)]
pub struct ApiMetrics {
    /// Logical calls admitted by the breaker
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    cancelled_requests: AtomicU64,
    /// Total response time in milliseconds
    total_response_time_ms: AtomicU64,
    /// Extra attempts made by the retry policy
    total_retries: AtomicU64,
    circuit_breaker_rejections: AtomicU64,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request start
    pub fn record_request_start(&self) -> Instant {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        Instant::now()
    }

    pub fn record_success(&self, start_time: Instant) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.add_response_time(start_time);
    }

    pub fn record_failure(&self, start_time: Instant) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        self.add_response_time(start_time);
    }

    pub fn record_cancellation(&self, start_time: Instant) {
        self.cancelled_requests.fetch_add(1, Ordering::Relaxed);
        self.add_response_time(start_time);
    }

    pub fn record_retries(&self, retries: u64) {
        self.total_retries.fetch_add(retries, Ordering::Relaxed);
    }

    pub fn record_circuit_breaker_rejection(&self) {
        self.circuit_breaker_rejections.fetch_add(1, Ordering::Relaxed);
    }

    fn add_response_time(&self, start_time: Instant) {
        let duration_ms = start_time.elapsed().as_millis() as u64;
        self.total_response_time_ms.fetch_add(duration_ms, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn successful_requests(&self) -> u64 {
        self.successful_requests.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    pub fn cancelled_requests(&self) -> u64 {
        self.cancelled_requests.load(Ordering::Relaxed)
    }

    pub fn total_retries(&self) -> u64 {
        self.total_retries.load(Ordering::Relaxed)
    }

    pub fn circuit_breaker_rejections(&self) -> u64 {
        self.circuit_breaker_rejections.load(Ordering::Relaxed)
    }

    /// Get success rate (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 1.0;
        }
        self.successful_requests() as f64 / total as f64
    }

    /// Get failure rate (0.0 to 1.0)
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.failed_requests() as f64 / total as f64
    }

    pub fn average_response_time_ms(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.total_response_time_ms.load(Ordering::Relaxed) as f64 / total as f64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests(),
            successful_requests: self.successful_requests(),
            failed_requests: self.failed_requests(),
            cancelled_requests: self.cancelled_requests(),
            success_rate: self.success_rate(),
            failure_rate: self.failure_rate(),
            average_response_time_ms: self.average_response_time_ms(),
            total_retries: self.total_retries(),
            circuit_breaker_rejections: self.circuit_breaker_rejections(),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cancelled_requests: u64,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub average_response_time_ms: f64,
    pub total_retries: u64,
    pub circuit_breaker_rejections: u64,
}
