//! Mode manager (spec §4.10): tracks whether the subsystem is in `Normal` or
//! `MetricsOnly` mode based on how many targets are currently enabled, cached behind a
//! short TTL via [`crate::adaptive::Adaptive`] and re-checked periodically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::adaptive::Adaptive;
use crate::model::Mode;
use crate::target_directory::TargetDirectory;

#[derive(Debug, Clone)]
struct ModeState {
    mode: Mode,
    reason: String,
}

pub type ModeSubscriber = Arc<dyn Fn(Mode, Mode, &str) + Send + Sync>;

/// Owns the cached mode and notifies subscribers (each on its own task, isolated with
/// `catch_unwind` so one panicking subscriber can't take down the others) when it flips.
pub struct ModeManager {
    directory: Arc<dyn TargetDirectory>,
    state: Adaptive<ModeState>,
    transitions: Arc<AtomicU64>,
    subscribers: Arc<parking_lot::Mutex<Vec<ModeSubscriber>>>,
    recheck_interval: Duration,
    handle: Option<JoinHandle<()>>,
    stop: Arc<tokio::sync::Notify>,
}

impl ModeManager {
    pub fn new(directory: Arc<dyn TargetDirectory>, recheck_interval: Duration) -> Self {
        Self {
            directory,
            state: Adaptive::new(ModeState { mode: Mode::Normal, reason: "initial".into() }),
            transitions: Arc::new(AtomicU64::new(0)),
            subscribers: Arc::new(parking_lot::Mutex::new(Vec::new())),
            recheck_interval,
            handle: None,
            stop: Arc::new(tokio::sync::Notify::new()),
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.get().mode
    }

    pub fn transition_count(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self, f: ModeSubscriber) {
        self.subscribers.lock().push(f);
    }

    /// Count enabled targets and flip mode if the count's zero/non-zero-ness changed.
    /// No enabled targets means there's nowhere to publish, so the subsystem degrades to
    /// metrics-only rather than spinning workers against an empty directory.
    pub async fn check_mode_transition(&self) {
        recheck(&self.directory, &self.state, &self.transitions, &self.subscribers).await;
    }

    /// Spawn the periodic re-check loop (default interval 5s per spec).
    pub fn start(&mut self) {
        let directory = self.directory.clone();
        let state = self.state.clone();
        let transitions = self.transitions.clone();
        let subscribers = self.subscribers.clone();
        let interval = self.recheck_interval;
        let stop = self.stop.clone();

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    biased;
                    _ = stop.notified() => break,
                    _ = ticker.tick() => recheck(&directory, &state, &transitions, &subscribers).await,
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.notify_waiters();
            handle.abort();
        }
    }
}

impl Drop for ModeManager {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn recheck(
    directory: &Arc<dyn TargetDirectory>,
    state: &Adaptive<ModeState>,
    transitions: &Arc<AtomicU64>,
    subscribers: &Arc<parking_lot::Mutex<Vec<ModeSubscriber>>>,
) {
    let enabled = directory.enabled_count().await;
    let next_mode = if enabled == 0 { Mode::MetricsOnly } else { Mode::Normal };
    let reason = if enabled == 0 {
        "no_enabled_targets".to_string()
    } else {
        format!("{enabled} enabled targets")
    };

    let previous = state.get();
    if previous.mode != next_mode {
        state.set(ModeState { mode: next_mode, reason: reason.clone() });
        transitions.fetch_add(1, Ordering::Relaxed);
        tracing::info!(from = ?previous.mode, to = ?next_mode, reason = %reason, "publishing mode transition");
        for subscriber in subscribers.lock().iter().cloned() {
            let from = previous.mode;
            let reason = reason.clone();
            tokio::spawn(async move {
                let result = std::panic::AssertUnwindSafe(|| subscriber(from, next_mode, &reason));
                if std::panic::catch_unwind(result).is_err() {
                    tracing::error!("mode transition subscriber panicked");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PublishingTarget;
    use crate::target_directory::InMemoryTargetDirectory;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    fn target(enabled: bool) -> PublishingTarget {
        PublishingTarget {
            name: "a".into(),
            target_type: "webhook".into(),
            url: "https://example.invalid".into(),
            enabled,
            format: "webhook".into(),
            headers: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn starts_in_normal_mode() {
        let dir: Arc<dyn TargetDirectory> = Arc::new(InMemoryTargetDirectory::new());
        let manager = ModeManager::new(dir, Duration::from_secs(5));
        assert_eq!(manager.mode(), Mode::Normal);
    }

    #[tokio::test]
    async fn flips_to_metrics_only_with_no_enabled_targets() {
        let inner = InMemoryTargetDirectory::new();
        inner.replace_all(vec![target(false)]);
        let dir: Arc<dyn TargetDirectory> = Arc::new(inner);
        let manager = ModeManager::new(dir, Duration::from_secs(5));
        manager.check_mode_transition().await;
        assert_eq!(manager.mode(), Mode::MetricsOnly);
        assert_eq!(manager.transition_count(), 1);
    }

    #[tokio::test]
    async fn repeated_checks_with_no_change_do_not_increment_transitions() {
        let inner = InMemoryTargetDirectory::new();
        inner.replace_all(vec![target(true)]);
        let dir: Arc<dyn TargetDirectory> = Arc::new(inner);
        let manager = ModeManager::new(dir, Duration::from_secs(5));
        manager.check_mode_transition().await;
        manager.check_mode_transition().await;
        assert_eq!(manager.transition_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_are_notified_on_transition() {
        let inner = InMemoryTargetDirectory::new();
        inner.replace_all(vec![target(false)]);
        let dir: Arc<dyn TargetDirectory> = Arc::new(inner);
        let manager = ModeManager::new(dir, Duration::from_secs(5));

        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let reason_seen = Arc::new(parking_lot::Mutex::new(String::new()));
        let reason_seen2 = reason_seen.clone();
        manager.subscribe(Arc::new(move |_from, _to, reason| {
            seen2.fetch_add(1, Ordering::SeqCst);
            *reason_seen2.lock() = reason.to_string();
        }));

        manager.check_mode_transition().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(&*reason_seen.lock(), "no_enabled_targets");
    }
}
