use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Cancelled;

/// Error types that should trigger retries
pub trait RetryableError: std::error::Error {
    /// Check if this error is transient
    fn is_retryable(&self) -> bool;
}

pub type RetryClassifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Retry policy with an explicit backoff schedule.
///
/// Each entry of the schedule is the wait before one more attempt, so a
/// schedule of `n` waits allows at most `n + 1` attempts.
pub struct RetryPolicy<E> {
    schedule: Vec<Duration>,
    retryable: RetryClassifier<E>,
}

impl<E: RetryableError> RetryPolicy<E> {
    /// Retry errors that report themselves as transient
    pub fn transient(schedule: Vec<Duration>) -> Self {
        Self::with_classifier(schedule, |e: &E| e.is_retryable())
    }
}

impl<E> RetryPolicy<E> {
    pub fn with_classifier<F>(schedule: Vec<Duration>, retryable: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            schedule,
            retryable: Arc::new(retryable),
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::with_classifier(Vec::new(), |_| false)
    }

    pub fn max_attempts(&self) -> usize {
        self.schedule.len() + 1
    }

    /// Run `operation`, retrying transient failures per the schedule.
    ///
    /// The outer `Err` means the caller cancelled; the inner result is the
    /// first success or the last failure.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<Result<T, E>, Cancelled>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut waits = self.schedule.iter();
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                debug!("Operation cancelled before attempt {}", attempt);
                return Err(Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Operation cancelled during attempt {}", attempt);
                    return Err(Cancelled);
                }
                result = operation() => result,
            };

            let err = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(Ok(value));
                }
                Err(e) => e,
            };

            if !(self.retryable)(&err) {
                debug!("Error is not retryable, aborting: {}", err);
                return Ok(Err(err));
            }

            let Some(&delay) = waits.next() else {
                warn!("Operation failed after {} attempts, giving up: {}", attempt, err);
                return Ok(Err(err));
            };

            warn!(
                "Operation failed (attempt {}/{}), retrying in {:?}: {}",
                attempt,
                self.max_attempts(),
                delay,
                err
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Operation cancelled during backoff");
                    return Err(Cancelled);
                }
                _ = sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            schedule: self.schedule.clone(),
            retryable: Arc::clone(&self.retryable),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}
