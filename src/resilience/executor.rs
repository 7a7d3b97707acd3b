use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::circuit_breaker::{CircuitBreaker, Outcome, Permit};
use super::metrics::ApiMetrics;
use super::retry::RetryPolicy;
use crate::error::{CallError, Cancelled};

/// Maps the final result of a call to the health signal the breaker records
pub type OutcomeClassifier<T, E> = Arc<dyn Fn(&Result<T, E>) -> Outcome + Send + Sync>;

/// Every error is a qualifying failure
pub fn every_error_fails<T, E>(result: &Result<T, E>) -> Outcome {
    match result {
        Ok(_) => Outcome::Success,
        Err(_) => Outcome::Failure,
    }
}

/// Runs calls through a circuit breaker and a retry policy.
///
/// The breaker sees one outcome per logical call no matter how many attempts
/// the retry policy made.
pub struct CallExecutor<T, E> {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy<E>,
    classifier: OutcomeClassifier<T, E>,
    metrics: Arc<ApiMetrics>,
}

impl<T, E> CallExecutor<T, E> {
    pub fn new(breaker: Arc<CircuitBreaker>, retry: RetryPolicy<E>) -> Self
    where
        T: 'static,
        E: 'static,
    {
        Self {
            breaker,
            retry,
            classifier: Arc::new(every_error_fails),
            metrics: Arc::new(ApiMetrics::new()),
        }
    }

    pub fn with_outcome_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Result<T, E>) -> Outcome + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn metrics(&self) -> &Arc<ApiMetrics> {
        &self.metrics
    }

    /// Execute one logical call.
    ///
    /// A rejected call never invokes `operation` and records nothing. A
    /// cancelled call is reported to the breaker as abandoned.
    pub async fn call<F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let Some(permit) = self.breaker.allow() else {
            self.metrics.record_circuit_breaker_rejection();
            debug!(dependency = %self.breaker.name(), "Circuit breaker rejected call");
            return Err(CallError::CircuitOpen {
                dependency: self.breaker.name().to_string(),
            });
        };

        let pending = PendingOutcome::new(&self.breaker, permit);
        let start_time = self.metrics.record_request_start();

        let mut attempts: u64 = 0;
        let result = self
            .retry
            .execute(cancel, || {
                attempts += 1;
                operation()
            })
            .await;
        self.metrics.record_retries(attempts.saturating_sub(1));

        let result = match result {
            Ok(result) => result,
            Err(Cancelled) => {
                pending.complete(Outcome::Abandoned);
                self.metrics.record_cancellation(start_time);
                return Err(CallError::Cancelled);
            }
        };

        pending.complete((self.classifier)(&result));
        match result {
            Ok(value) => {
                self.metrics.record_success(start_time);
                Ok(value)
            }
            Err(e) => {
                self.metrics.record_failure(start_time);
                Err(CallError::Downstream(e))
            }
        }
    }

    /// Like [`call`](Self::call) with a deadline; expiry cancels the call
    pub async fn call_with_timeout<F, Fut>(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let token = cancel.child_token();
        let call = self.call(&token, operation);
        tokio::pin!(call);

        tokio::select! {
            biased;
            result = &mut call => result,
            _ = sleep(timeout) => {
                warn!(dependency = %self.breaker.name(), "Call timed out after {:?}", timeout);
                token.cancel();
                call.await
            }
        }
    }
}

impl<T, E> fmt::Debug for CallExecutor<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallExecutor")
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Holds an admitted call's permit; records `Abandoned` if the call is
/// dropped before its outcome is known
struct PendingOutcome<'a> {
    breaker: &'a CircuitBreaker,
    permit: Option<Permit>,
}

impl<'a> PendingOutcome<'a> {
    fn new(breaker: &'a CircuitBreaker, permit: Permit) -> Self {
        Self {
            breaker,
            permit: Some(permit),
        }
    }

    fn complete(mut self, outcome: Outcome) {
        if let Some(permit) = self.permit.take() {
            self.breaker.record_outcome(permit, outcome);
        }
    }
}

impl Drop for PendingOutcome<'_> {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            debug!(dependency = %self.breaker.name(), "Call dropped before completion");
            self.breaker.record_outcome(permit, Outcome::Abandoned);
        }
    }
}
