//! Per-target circuit breaker table (spec §3: "shared-read, per-target-locked on write").

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

/// Table of circuit breakers keyed by target name. Readers never block each other;
/// mutation (insertion of a new breaker) takes the table lock only long enough to
/// insert, never while executing the breaker's own atomics.
#[derive(Clone, Default)]
pub struct CircuitBreakerRegistry {
    inner: Arc<Mutex<HashMap<String, CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), default_config }
    }

    /// Get the breaker for `target`, creating one with the registry's default config on
    /// first use.
    pub fn get_or_create(&self, target: &str) -> CircuitBreaker {
        let mut guard = self.inner.lock();
        guard
            .entry(target.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.default_config))
            .clone()
    }

    /// Register a breaker with a non-default config for `target` (e.g. from per-target
    /// operator overrides via the control plane).
    pub fn register(&self, target: &str, config: CircuitBreakerConfig) {
        self.inner.lock().insert(target.to_string(), CircuitBreaker::new(config));
    }

    pub fn reset(&self, target: &str) -> Result<(), String> {
        let guard = self.inner.lock();
        match guard.get(target) {
            Some(cb) => {
                cb.reset();
                Ok(())
            }
            None => Err(format!("no circuit breaker registered for target {target}")),
        }
    }

    pub fn remove(&self, target: &str) {
        self.inner.lock().remove(target);
    }

    /// Sorted snapshot of every known breaker's state, used by the stats/admin surface.
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        let guard = self.inner.lock();
        let mut entries: Vec<_> = guard.iter().map(|(k, v)| (k.clone(), v.state())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
