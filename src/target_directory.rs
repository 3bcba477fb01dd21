//! Target directory and refresh manager (spec §4.11).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::model::PublishingTarget;

#[async_trait::async_trait]
pub trait TargetDirectory: Send + Sync {
    async fn list_targets(&self) -> Vec<PublishingTarget>;
    async fn get_target(&self, name: &str) -> Option<PublishingTarget>;
    async fn get_targets_by_type(&self, target_type: &str) -> Vec<PublishingTarget>;
    async fn enabled_count(&self) -> usize;
}

/// In-memory directory, refreshed by a [`RefreshManager`] from an external source
/// (the actual fetch function is supplied by the caller, since where targets come from
/// is outside this subsystem's scope).
#[derive(Clone, Default)]
pub struct InMemoryTargetDirectory {
    inner: Arc<parking_lot::RwLock<HashMap<String, PublishingTarget>>>,
}

impl InMemoryTargetDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&self, targets: Vec<PublishingTarget>) {
        let mut map = HashMap::with_capacity(targets.len());
        for t in targets {
            map.insert(t.name.clone(), t);
        }
        *self.inner.write() = map;
    }
}

#[async_trait::async_trait]
impl TargetDirectory for InMemoryTargetDirectory {
    async fn list_targets(&self) -> Vec<PublishingTarget> {
        self.inner.read().values().cloned().collect()
    }

    async fn get_target(&self, name: &str) -> Option<PublishingTarget> {
        self.inner.read().get(name).cloned()
    }

    async fn get_targets_by_type(&self, target_type: &str) -> Vec<PublishingTarget> {
        self.inner.read().values().filter(|t| t.target_type == target_type).cloned().collect()
    }

    async fn enabled_count(&self) -> usize {
        self.inner.read().values().filter(|t| t.enabled).count()
    }
}

pub type DiscoveryFn = Arc<dyn Fn() -> futures::future::BoxFuture<'static, Result<Vec<PublishingTarget>, String>> + Send + Sync>;

/// Periodically refreshes an [`InMemoryTargetDirectory`] from a caller-supplied discovery
/// function. A failed refresh is logged and counted but never kills the loop or blanks
/// out the last-known-good set of targets.
pub struct RefreshManager {
    directory: InMemoryTargetDirectory,
    discover: DiscoveryFn,
    interval: Duration,
    failures: Arc<AtomicU64>,
    refresh_now: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
    stop: Arc<Notify>,
}

impl RefreshManager {
    pub fn new(directory: InMemoryTargetDirectory, discover: DiscoveryFn, interval: Duration) -> Self {
        Self {
            directory,
            discover,
            interval,
            failures: Arc::new(AtomicU64::new(0)),
            refresh_now: Arc::new(Notify::new()),
            handle: None,
            stop: Arc::new(Notify::new()),
        }
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Runs an initial discovery synchronously, then spawns the periodic refresh loop.
    pub async fn start(&mut self) {
        self.do_refresh().await;

        let directory = self.directory.clone();
        let discover = self.discover.clone();
        let interval = self.interval;
        let failures = self.failures.clone();
        let refresh_now = self.refresh_now.clone();
        let stop = self.stop.clone();

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // consume the immediate first tick
            loop {
                tokio::select! {
                    biased;
                    _ = stop.notified() => break,
                    _ = refresh_now.notified() => {}
                    _ = ticker.tick() => {}
                }
                match (discover)().await {
                    Ok(targets) => directory.replace_all(targets),
                    Err(e) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "target refresh failed, keeping last-known-good set");
                    }
                }
            }
        }));
    }

    async fn do_refresh(&self) {
        match (self.discover)().await {
            Ok(targets) => self.directory.replace_all(targets),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "initial target discovery failed");
            }
        }
    }

    pub fn refresh_now(&self) {
        self.refresh_now.notify_one();
    }

    /// Idempotent: calling twice is a no-op on the second call.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.notify_waiters();
            handle.abort();
        }
    }
}

impl Drop for RefreshManager {
    fn drop(&mut self) {
        self.stop();
    }
}
