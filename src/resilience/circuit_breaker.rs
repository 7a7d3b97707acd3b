use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Circuit is closed - normal operation
    Closed,
    /// Circuit is open - failing, reject requests immediately
    Open,
    /// Circuit is half-open - one trial request tests if the service recovered
    HalfOpen,
}

impl CircuitState {
    pub const ALL: [CircuitState; 3] = [
        CircuitState::Closed,
        CircuitState::Open,
        CircuitState::HalfOpen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health signal produced by one allowed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Qualifying failure, counts toward the threshold
    Failure,
    /// The call ended without a health signal (cancelled, timed out, dropped)
    Abandoned,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive qualifying failures before opening the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial request is let through
    pub break_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            break_duration: Duration::from_secs(60),
        }
    }
}

/// State change reported to hooks
#[derive(Debug, Clone)]
pub struct Transition {
    pub dependency: String,
    pub from: CircuitState,
    pub to: CircuitState,
    /// Failures counted when the circuit broke; zero for other transitions
    pub consecutive_failures: u32,
    pub break_duration: Duration,
}

pub type TransitionHook = Arc<dyn Fn(&Transition) -> anyhow::Result<()> + Send + Sync>;

/// Optional observers invoked synchronously on state transitions.
///
/// A hook that errors or panics is logged and otherwise ignored.
#[derive(Clone, Default)]
pub struct BreakerHooks {
    on_break: Option<TransitionHook>,
    on_reset: Option<TransitionHook>,
    on_half_open: Option<TransitionHook>,
}

impl BreakerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks that only announce transitions in the log
    pub fn logging() -> Self {
        Self::new()
            .on_break(|t| {
                info!(dependency = %t.dependency, "Circuit cut, requests will not flow");
                Ok(())
            })
            .on_reset(|t| {
                info!(dependency = %t.dependency, "Circuit closed, requests flow normally");
                Ok(())
            })
            .on_half_open(|t| {
                info!(dependency = %t.dependency, "Circuit in test mode, one request will be allowed");
                Ok(())
            })
    }

    pub fn on_break<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Transition) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_break = Some(Arc::new(hook));
        self
    }

    pub fn on_reset<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Transition) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_reset = Some(Arc::new(hook));
        self
    }

    pub fn on_half_open<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Transition) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_half_open = Some(Arc::new(hook));
        self
    }

    fn for_target(&self, to: CircuitState) -> (&'static str, Option<&TransitionHook>) {
        match to {
            CircuitState::Open => ("on_break", self.on_break.as_ref()),
            CircuitState::Closed => ("on_reset", self.on_reset.as_ref()),
            CircuitState::HalfOpen => ("on_half_open", self.on_half_open.as_ref()),
        }
    }
}

impl fmt::Debug for BreakerHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerHooks")
            .field("on_break", &self.on_break.is_some())
            .field("on_reset", &self.on_reset.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}

/// Admission handed out by [`CircuitBreaker::allow`].
///
/// Every permit is settled exactly once through
/// [`CircuitBreaker::record_outcome`]. A permit only carries weight in the
/// breaker phase that issued it: once the circuit trips, closes or is reset,
/// outcomes from older permits are ignored.
#[must_use = "an admitted call must record its outcome"]
#[derive(Debug)]
pub struct Permit {
    generation: u64,
    trial: bool,
}

impl Permit {
    /// Whether this permit is the single HalfOpen trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }
}

/// Internal state for circuit breaker
#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    /// Bumped on every trip, close and reset
    generation: u64,
}

impl CircuitBreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
            generation: 0,
        }
    }

    fn permit(&self, trial: bool) -> Permit {
        Permit {
            generation: self.generation,
            trial,
        }
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.trial_in_flight = false;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Circuit breaker guarding one downstream dependency.
///
/// All transitions happen under a single mutex, so the Open to HalfOpen
/// transition hands the trial permit to exactly one caller. Hooks run after
/// the lock is released.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    hooks: BreakerHooks,
    state: Mutex<CircuitBreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let config = CircuitBreakerConfig {
            failure_threshold: config.failure_threshold.max(1),
            ..config
        };
        Self {
            name: name.into(),
            config,
            clock: Arc::new(SystemClock),
            hooks: BreakerHooks::default(),
            state: Mutex::new(CircuitBreakerState::closed()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_hooks(mut self, hooks: BreakerHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Check if a request should be allowed; `None` means reject.
    ///
    /// Once the break has elapsed, the first caller moves the circuit to
    /// HalfOpen and receives the trial; everyone else is rejected until the
    /// trial outcome is recorded.
    pub fn allow(&self) -> Option<Permit> {
        let (permit, transition) = {
            let mut state = self.lock();
            match state.state {
                CircuitState::Closed => return Some(state.permit(false)),
                CircuitState::HalfOpen => {
                    if state.trial_in_flight {
                        return None;
                    }
                    debug!(dependency = %self.name, "Circuit breaker granting new trial request");
                    state.trial_in_flight = true;
                    return Some(state.permit(true));
                }
                CircuitState::Open => {
                    if !self.break_elapsed(&state) {
                        return None;
                    }
                    debug!(dependency = %self.name, "Circuit breaker transitioning from Open to HalfOpen");
                    state.state = CircuitState::HalfOpen;
                    state.trial_in_flight = true;
                    (
                        state.permit(true),
                        self.transition(CircuitState::Open, CircuitState::HalfOpen, 0),
                    )
                }
            }
        };
        self.notify(&transition);
        Some(permit)
    }

    /// Record the outcome of a call that `allow` let through
    pub fn record_outcome(&self, permit: Permit, outcome: Outcome) {
        let transition = {
            let mut state = self.lock();
            if permit.generation != state.generation {
                // Admitted before the last trip, close or reset; only the
                // phase that issued a permit listens to it.
                debug!(
                    dependency = %self.name,
                    ?outcome,
                    "Ignoring outcome of a call admitted before the last transition"
                );
                return;
            }
            match (state.state, permit.trial, outcome) {
                (CircuitState::Closed, _, Outcome::Abandoned) => None,
                (CircuitState::Closed, _, Outcome::Success) => {
                    state.consecutive_failures = 0;
                    None
                }
                (CircuitState::Closed, _, Outcome::Failure) => {
                    state.consecutive_failures += 1;
                    let failures = state.consecutive_failures;
                    if failures >= self.config.failure_threshold {
                        warn!(
                            dependency = %self.name,
                            "Circuit breaker transitioning from Closed to Open ({} failures)",
                            failures
                        );
                        self.trip(&mut state);
                        Some(self.transition(CircuitState::Closed, CircuitState::Open, failures))
                    } else {
                        debug!(
                            dependency = %self.name,
                            "Circuit breaker recorded failure {}/{}",
                            failures,
                            self.config.failure_threshold
                        );
                        None
                    }
                }
                (CircuitState::HalfOpen, true, Outcome::Abandoned) => {
                    debug!(dependency = %self.name, "Trial request abandoned, releasing trial permit");
                    state.trial_in_flight = false;
                    None
                }
                (CircuitState::HalfOpen, true, Outcome::Success) => {
                    debug!(dependency = %self.name, "Circuit breaker transitioning from HalfOpen to Closed");
                    state.close();
                    Some(self.transition(CircuitState::HalfOpen, CircuitState::Closed, 0))
                }
                (CircuitState::HalfOpen, true, Outcome::Failure) => {
                    warn!(dependency = %self.name, "Circuit breaker transitioning from HalfOpen to Open (trial failed)");
                    self.trip(&mut state);
                    Some(self.transition(CircuitState::HalfOpen, CircuitState::Open, 1))
                }
                // A current permit is either a Closed admission or the trial
                _ => None,
            }
        };
        if let Some(transition) = transition {
            self.notify(&transition);
        }
    }

    /// Get current circuit state without changing it.
    ///
    /// An open circuit whose break has elapsed reads as HalfOpen.
    pub fn state(&self) -> CircuitState {
        let state = self.lock();
        match state.state {
            CircuitState::Open if self.break_elapsed(&state) => CircuitState::HalfOpen,
            other => other,
        }
    }

    /// Get current consecutive failure count
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Force the circuit closed; outstanding permits lose their weight
    pub fn reset(&self) {
        let previous = {
            let mut state = self.lock();
            let previous = state.state;
            state.close();
            previous
        };
        if previous != CircuitState::Closed {
            info!(dependency = %self.name, "Circuit breaker manually reset from {}", previous);
            self.notify(&self.transition(previous, CircuitState::Closed, 0));
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn break_elapsed(&self, state: &CircuitBreakerState) -> bool {
        match state.opened_at {
            Some(opened_at) => {
                self.clock.now().saturating_duration_since(opened_at) >= self.config.break_duration
            }
            None => true,
        }
    }

    fn trip(&self, state: &mut CircuitBreakerState) {
        state.state = CircuitState::Open;
        state.consecutive_failures = 0;
        state.opened_at = Some(self.clock.now());
        state.trial_in_flight = false;
        state.generation = state.generation.wrapping_add(1);
    }

    fn transition(&self, from: CircuitState, to: CircuitState, consecutive_failures: u32) -> Transition {
        Transition {
            dependency: self.name.clone(),
            from,
            to,
            consecutive_failures,
            break_duration: self.config.break_duration,
        }
    }

    fn notify(&self, transition: &Transition) {
        let (label, hook) = self.hooks.for_target(transition.to);
        let Some(hook) = hook else {
            return;
        };
        match catch_unwind(AssertUnwindSafe(|| hook(transition))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(dependency = %self.name, hook = label, "Circuit breaker hook failed: {:#}", e);
            }
            Err(_) => {
                error!(dependency = %self.name, hook = label, "Circuit breaker hook panicked");
            }
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("hooks", &self.hooks)
            .finish()
    }
}
