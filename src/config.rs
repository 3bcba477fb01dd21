//! Process configuration (§1.1 ambient stack): a [`PublishingConfig`] assembled the way
//! the teacher's `presets` module builds its named `DEFAULT_*` stacks, except here the
//! knobs are data (`serde::Deserialize`-able from file/env) rather than hard-coded
//! preset functions, since this subsystem has one shape of pipeline, not five.
//!
//! A handful of these values are meant to be retunable without a restart (queue bucket
//! capacities, breaker thresholds, mode TTL, refresh interval); [`Adaptive`] wraps the
//! whole struct for that purpose rather than wrapping each field individually, since the
//! control plane only ever swaps the configuration as a unit.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adaptive::Adaptive;
use crate::backoff_calculator::BackoffConfig;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::PublishingError;
use crate::queue::QueueConfig;

/// Default fan-out width for [`crate::coordinator::PublishingCoordinator`] (spec §4.9).
pub const DEFAULT_MAX_CONCURRENT: usize = 5;
/// Default mode-cache TTL and recheck interval (spec §4.10).
pub const DEFAULT_MODE_CACHE_TTL: Duration = Duration::from_secs(1);
pub const DEFAULT_MODE_RECHECK_INTERVAL: Duration = Duration::from_secs(5);
/// Default target-directory refresh interval (spec §4.11); the teacher has no fixed
/// default for its own pull-based refresh loop, so this one is new to this crate.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
/// Default per-attempt timeout enforced by the middleware chain's Timeout stage (spec §4.5).
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);
/// Default format/output cache capacity (spec §4.4).
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
/// Default DLQ purge horizon (spec §6, `DELETE /dlq/purge` default).
pub const DEFAULT_DLQ_PURGE_HOURS: u64 = 168;

/// Top-level configuration for the publishing subsystem. Deserializable from JSON (file
/// or environment-supplied blob); every field has a spec-mandated or documented default,
/// so partial documents deserialize cleanly via `#[serde(default = ...)]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishingConfig {
    pub queue: QueueConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub backoff: BackoffConfig,
    pub max_concurrent: usize,
    #[serde(with = "humantime_serde")]
    pub mode_cache_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub mode_recheck_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub dispatch_timeout: Duration,
    pub cache_capacity: usize,
    pub dlq_purge_hours: u64,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            backoff: BackoffConfig::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            mode_cache_ttl: DEFAULT_MODE_CACHE_TTL,
            mode_recheck_interval: DEFAULT_MODE_RECHECK_INTERVAL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            dlq_purge_hours: DEFAULT_DLQ_PURGE_HOURS,
        }
    }
}

impl PublishingConfig {
    /// Parse a config document from a JSON string, following this crate's convention
    /// (see `DlqEntry`, `Silence`) of using `serde_json` directly rather than a generic
    /// config-loading crate, since no such crate appears anywhere in the retrieved corpus.
    pub fn from_json(s: &str) -> Result<Self, PublishingError> {
        serde_json::from_str(s).map_err(|e| PublishingError::Validation(vec![crate::error::Violation {
            field: "config".into(),
            message: format!("invalid publishing config: {e}"),
            offending_value: None,
            remediation: Some("config must be a JSON object matching PublishingConfig's fields".into()),
        }]))
    }

    /// Load and parse a config document from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PublishingError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PublishingError::Validation(vec![crate::error::Violation {
                field: "config".into(),
                message: format!("failed to read {}: {e}", path.display()),
                offending_value: None,
                remediation: Some("check the config file path and permissions".into()),
            }])
        })?;
        Self::from_json(&contents)
    }

    /// Wrap this configuration in an [`Adaptive`] handle so the control plane can hot-swap
    /// it as a unit (`Adaptive::set`) without restarting the process.
    pub fn into_adaptive(self) -> Adaptive<PublishingConfig> {
        Adaptive::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let cfg = PublishingConfig::default();
        assert_eq!(cfg.max_concurrent, 5);
        assert_eq!(cfg.mode_cache_ttl, Duration::from_secs(1));
        assert_eq!(cfg.mode_recheck_interval, Duration::from_secs(5));
        assert_eq!(cfg.dlq_purge_hours, 168);
        assert_eq!(cfg.backoff.base, Duration::from_millis(100));
        assert_eq!(cfg.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    fn partial_json_document_fills_in_defaults() {
        let cfg = PublishingConfig::from_json(r#"{"max_concurrent": 20}"#).unwrap();
        assert_eq!(cfg.max_concurrent, 20);
        assert_eq!(cfg.queue.workers, QueueConfig::default().workers);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = PublishingConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back = PublishingConfig::from_json(&json).unwrap();
        assert_eq!(back.max_concurrent, cfg.max_concurrent);
        assert_eq!(back.refresh_interval, cfg.refresh_interval);
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = PublishingConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, PublishingError::Validation(_)));
    }

    #[test]
    fn missing_file_is_a_validation_error() {
        let err = PublishingConfig::from_file("/nonexistent/path/publishing.json").unwrap_err();
        assert!(matches!(err, PublishingError::Validation(_)));
    }
}
