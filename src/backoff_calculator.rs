//! Backoff calculator (spec §4.2): exponential backoff with jitter, capped, used by the
//! queue worker to schedule delayed requeues. Distinct from [`crate::backoff::Backoff`],
//! which backs the middleware chain's internal retry step.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::ErrorKind;

/// Tunables for the backoff calculator. Defaults match spec §4.2 exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(with = "humantime_serde")]
    pub base: Duration,
    #[serde(with = "humantime_serde")]
    pub max_cap: Duration,
    #[serde(with = "humantime_serde")]
    pub jitter_max: Duration,
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max_cap: Duration::from_secs(30),
            jitter_max: Duration::from_secs(1),
            max_retries: 5,
        }
    }
}

/// `backoff(attempt, cfg) = min(base * 2^attempt, maxCap) + jitter`, jitter uniform in
/// `[0, jitterMax)`.
pub fn backoff(attempt: u32, cfg: &BackoffConfig) -> Duration {
    let exponent = attempt.min(62);
    let multiplier = 2u64.saturating_pow(exponent);
    let capped_base = cfg
        .base
        .checked_mul(multiplier as u32)
        .unwrap_or(cfg.max_cap)
        .min(cfg.max_cap);

    let jitter_millis = cfg.jitter_max.as_millis() as u64;
    let jitter = if jitter_millis == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::thread_rng().gen_range(0..jitter_millis))
    };

    capped_base + jitter
}

/// `shouldRetry(kind, attempt, max)`: false if the error kind is permanent-like or the
/// job has exhausted its retry budget.
pub fn should_retry(kind: ErrorKind, attempt: u32, cfg: &BackoffConfig) -> bool {
    kind.is_retryable() && attempt < cfg.max_retries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = BackoffConfig::default();
        assert_eq!(cfg.base, Duration::from_millis(100));
        assert_eq!(cfg.max_cap, Duration::from_secs(30));
        assert_eq!(cfg.jitter_max, Duration::from_secs(1));
    }

    #[test]
    fn never_retries_permanent() {
        let cfg = BackoffConfig::default();
        assert!(!should_retry(ErrorKind::Permanent, 0, &cfg));
    }

    #[test]
    fn stops_retrying_once_max_attempts_reached() {
        let cfg = BackoffConfig { max_retries: 3, ..Default::default() };
        assert!(should_retry(ErrorKind::Transient, 2, &cfg));
        assert!(!should_retry(ErrorKind::Transient, 3, &cfg));
    }

    proptest::proptest! {
        #[test]
        fn delay_bounds_hold(attempt in 0u32..20, base_ms in 1u64..500, cap_s in 1u64..60, jitter_ms in 0u64..5000) {
            let cfg = BackoffConfig {
                base: Duration::from_millis(base_ms),
                max_cap: Duration::from_secs(cap_s),
                jitter_max: Duration::from_millis(jitter_ms),
                max_retries: 5,
            };
            let d = backoff(attempt, &cfg);
            let exponent = attempt.min(62);
            let expected_base = cfg.base.checked_mul(2u64.saturating_pow(exponent) as u32)
                .unwrap_or(cfg.max_cap)
                .min(cfg.max_cap);
            prop_assert!(d >= expected_base);
            prop_assert!(d <= expected_base + cfg.jitter_max);
            prop_assert!(d <= cfg.max_cap + cfg.jitter_max);
        }
    }
}
