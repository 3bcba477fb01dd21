//! Per-target circuit breaker (spec §4.3): closed/open/half-open with lock-free atomics.
//!
//! Generalized from a single resilience-policy breaker into one keyed per target name
//! (see [`crate::circuit_breaker_registry`]); it also tracks a half-open *success*
//! threshold `S`, not just a single recovery probe.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, MonotonicClock};

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// F (failure threshold), S (success threshold to close from half-open), T (recovery
/// timeout).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub success_threshold: usize,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, success_threshold: 2, timeout: Duration::from_secs(30) }
    }
}

struct State {
    state: AtomicU8,
    failure_count: AtomicUsize,
    success_count: AtomicUsize,
    last_failure_millis: AtomicU64,
}

/// One circuit breaker instance, intended to be owned per target name by
/// [`crate::circuit_breaker_registry::CircuitBreakerRegistry`].
#[derive(Clone)]
pub struct CircuitBreaker {
    state: Arc<State>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Arc::new(State {
                state: AtomicU8::new(STATE_CLOSED),
                failure_count: AtomicUsize::new(0),
                success_count: AtomicUsize::new(0),
                last_failure_millis: AtomicU64::new(0),
            }),
            config,
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn state(&self) -> CircuitState {
        match self.state.state.load(Ordering::Acquire) {
            STATE_CLOSED => CircuitState::Closed,
            STATE_OPEN => CircuitState::Open,
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            _ => unreachable!("invalid circuit breaker state"),
        }
    }

    /// `CanAttempt`: true in closed/half-open, and in open once the recovery timeout has
    /// elapsed. The state flip from open to half-open is deferred to this query path
    /// (see SPEC_FULL.md / DESIGN.md open-question decision), not to the next record call.
    pub fn can_attempt(&self) -> bool {
        match self.state.state.load(Ordering::Acquire) {
            STATE_CLOSED | STATE_HALF_OPEN => true,
            STATE_OPEN => {
                let last_failure = self.state.last_failure_millis.load(Ordering::Acquire);
                let elapsed = self.clock.now_millis().saturating_sub(last_failure);
                if elapsed > self.config.timeout.as_millis() as u64 {
                    if self
                        .state
                        .state
                        .compare_exchange(
                            STATE_OPEN,
                            STATE_HALF_OPEN,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        self.state.success_count.store(0, Ordering::Release);
                        tracing::info!("circuit breaker -> half-open");
                    }
                    true
                } else {
                    false
                }
            }
            _ => unreachable!("invalid circuit breaker state"),
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        match self.state.state.load(Ordering::Acquire) {
            STATE_HALF_OPEN => {
                let successes = self.state.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.success_threshold
                    && self
                        .state
                        .state
                        .compare_exchange(
                            STATE_HALF_OPEN,
                            STATE_CLOSED,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                {
                    self.state.failure_count.store(0, Ordering::Release);
                    self.state.success_count.store(0, Ordering::Release);
                    tracing::info!("circuit breaker -> closed");
                }
            }
            STATE_CLOSED => {
                self.state.failure_count.store(0, Ordering::Release);
            }
            _ => {}
        }
    }

    /// Record a failed call. A single failure while half-open returns to open.
    pub fn record_failure(&self) {
        let now = self.clock.now_millis();
        match self.state.state.load(Ordering::Acquire) {
            STATE_HALF_OPEN => {
                if self
                    .state
                    .state
                    .compare_exchange(STATE_HALF_OPEN, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.state.last_failure_millis.store(now, Ordering::Release);
                    tracing::warn!("circuit breaker: half-open probe failed -> open");
                }
            }
            STATE_CLOSED => {
                let failures = self.state.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold
                    && self
                        .state
                        .state
                        .compare_exchange(
                            STATE_CLOSED,
                            STATE_OPEN,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                {
                    self.state.last_failure_millis.store(now, Ordering::Release);
                    tracing::error!(failures, threshold = self.config.failure_threshold, "circuit breaker -> open");
                }
            }
            _ => {}
        }
    }

    /// Force closed and zero counters.
    pub fn reset(&self) {
        self.state.state.store(STATE_CLOSED, Ordering::Release);
        self.state.failure_count.store(0, Ordering::Release);
        self.state.success_count.store(0, Ordering::Release);
        self.state.last_failure_millis.store(0, Ordering::Release);
    }

    pub fn failure_count(&self) -> usize {
        self.state.failure_count.load(Ordering::Acquire)
    }
}
