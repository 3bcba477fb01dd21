//! Publishing coordinator (spec §4.9): bounded fan-out of one alert to many targets.
//! Concurrency bound mirrors [`crate::bulkhead::BulkheadPolicy`]'s `Semaphore`-based
//! limiting, generalized from "reject over capacity" to "queue and wait for a permit"
//! since fan-out naturally bounds its own width.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::mode::ModeManager;
use crate::model::{EnrichedAlert, Mode, PublishingJob, PublishingResult};
use crate::queue::PublishingQueue;
use crate::target_directory::TargetDirectory;

pub type PublishOne = Arc<dyn Fn(EnrichedAlert, String) -> futures::future::BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// The `PublishOne` every production caller should hand the coordinator: resolve the
/// target by name and hand the job to the same priority queue a direct `/submit` call
/// would use, so fan-out gets retry, circuit breaking, and the DLQ for free instead of
/// bypassing them.
pub fn queue_backed_publish_one(queue: Arc<PublishingQueue>, directory: Arc<dyn TargetDirectory>) -> PublishOne {
    Arc::new(move |alert, target_name| {
        let queue = queue.clone();
        let directory = directory.clone();
        Box::pin(async move {
            let target = directory
                .get_target(&target_name)
                .await
                .ok_or_else(|| format!("unknown target: {target_name}"))?;
            queue
                .submit(PublishingJob::new(Arc::new(alert), Arc::new(target)))
                .map_err(|e| e.to_string())
        })
    })
}

#[derive(Clone)]
pub struct PublishingCoordinator {
    directory: Arc<dyn TargetDirectory>,
    mode: Arc<ModeManager>,
    semaphore: Arc<Semaphore>,
    publish_one: PublishOne,
}

impl PublishingCoordinator {
    pub fn new(directory: Arc<dyn TargetDirectory>, mode: Arc<ModeManager>, max_concurrent: usize, publish_one: PublishOne) -> Self {
        Self { directory, mode, semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))), publish_one }
    }

    /// Fan out to every enabled target. In metrics-only mode this is a deliberate no-op:
    /// there is nowhere to publish and the coordinator never retries at this layer.
    ///
    /// Equivalent to calling [`Self::publish_to_all_cancellable`] with a token that is
    /// never cancelled.
    pub async fn publish_to_all(&self, alert: &EnrichedAlert) -> Vec<PublishingResult> {
        self.publish_to_all_cancellable(alert, &CancellationToken::new()).await
    }

    /// Same as [`Self::publish_to_all`], but `cancellation` is observed both while a
    /// submission waits on the fan-out semaphore and while it is in flight; a slot that
    /// loses the race reports a `Cancelled` result instead of blocking indefinitely.
    pub async fn publish_to_all_cancellable(
        &self,
        alert: &EnrichedAlert,
        cancellation: &CancellationToken,
    ) -> Vec<PublishingResult> {
        if self.mode.mode() == Mode::MetricsOnly {
            tracing::debug!("metrics-only mode: skipping fan-out");
            return Vec::new();
        }
        let targets = self.directory.list_targets().await;
        let names: Vec<String> = targets.into_iter().filter(|t| t.enabled).map(|t| t.name).collect();
        self.fan_out(alert, names, cancellation).await
    }

    /// Fan out to a restricted, caller-specified set of target names. Names that don't
    /// resolve in the directory are skipped with a warning, not an error.
    pub async fn publish_to_targets(&self, alert: &EnrichedAlert, names: &[String]) -> Vec<PublishingResult> {
        self.publish_to_targets_cancellable(alert, names, &CancellationToken::new()).await
    }

    /// Same as [`Self::publish_to_targets`], observing `cancellation` per submission.
    pub async fn publish_to_targets_cancellable(
        &self,
        alert: &EnrichedAlert,
        names: &[String],
        cancellation: &CancellationToken,
    ) -> Vec<PublishingResult> {
        if self.mode.mode() == Mode::MetricsOnly {
            return Vec::new();
        }
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            if self.directory.get_target(name).await.is_some() {
                resolved.push(name.clone());
            } else {
                tracing::warn!(target = %name, "skipping unresolvable publish target");
            }
        }
        self.fan_out(alert, resolved, cancellation).await
    }

    async fn fan_out(
        &self,
        alert: &EnrichedAlert,
        names: Vec<String>,
        cancellation: &CancellationToken,
    ) -> Vec<PublishingResult> {
        let futures = names.into_iter().map(|name| {
            let semaphore = self.semaphore.clone();
            let publish_one = self.publish_one.clone();
            let alert = alert.clone();
            let cancellation = cancellation.clone();
            async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => None,
                    permit = semaphore.acquire() => Some(permit.expect("semaphore never closed")),
                };
                let Some(_permit) = permit else {
                    return PublishingResult { target: name, success: false, error: Some("cancelled".into()) };
                };

                tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => {
                        PublishingResult { target: name, success: false, error: Some("cancelled".into()) }
                    }
                    result = publish_one(alert, name.clone()) => {
                        PublishingResult { target: name, success: result.is_ok(), error: result.err() }
                    }
                }
            }
        });
        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertStatus, PublishingTarget};
    use crate::target_directory::InMemoryTargetDirectory;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};

    fn alert() -> EnrichedAlert {
        EnrichedAlert {
            fingerprint: "abcdef0123456789".into(),
            alert_name: "HighCPUUsage".into(),
            status: AlertStatus::Firing,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            starts_at: SystemTime::now(),
            ends_at: None,
            generator_url: None,
            classification: None,
        }
    }

    fn target(name: &str, enabled: bool) -> PublishingTarget {
        PublishingTarget {
            name: name.into(),
            target_type: "webhook".into(),
            url: "https://example.invalid".into(),
            enabled,
            format: "webhook".into(),
            headers: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn fans_out_to_every_enabled_target() {
        let dir = InMemoryTargetDirectory::new();
        dir.replace_all(vec![target("a", true), target("b", true), target("c", false)]);
        let dir: Arc<dyn TargetDirectory> = Arc::new(dir);
        let mode = Arc::new(ModeManager::new(dir.clone(), Duration::from_secs(5)));

        let publish_one: PublishOne = Arc::new(|_, _| Box::pin(async { Ok(()) }));
        let coordinator = PublishingCoordinator::new(dir, mode, 5, publish_one);

        let results = coordinator.publish_to_all(&alert()).await;
        assert_eq!(results.len(), 2, "only enabled targets are published to");
        assert!(results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn metrics_only_mode_skips_fan_out() {
        let dir = InMemoryTargetDirectory::new();
        dir.replace_all(vec![]); // no enabled targets
        let dir: Arc<dyn TargetDirectory> = Arc::new(dir);
        let mode = Arc::new(ModeManager::new(dir.clone(), Duration::from_secs(5)));
        mode.check_mode_transition().await;
        assert_eq!(mode.mode(), Mode::MetricsOnly);

        let publish_one: PublishOne = Arc::new(|_, _| Box::pin(async { Ok(()) }));
        let coordinator = PublishingCoordinator::new(dir, mode, 5, publish_one);
        assert!(coordinator.publish_to_all(&alert()).await.is_empty());
    }

    #[tokio::test]
    async fn unresolvable_target_names_are_skipped() {
        let dir = InMemoryTargetDirectory::new();
        dir.replace_all(vec![target("a", true)]);
        let dir: Arc<dyn TargetDirectory> = Arc::new(dir);
        let mode = Arc::new(ModeManager::new(dir.clone(), Duration::from_secs(5)));

        let publish_one: PublishOne = Arc::new(|_, _| Box::pin(async { Ok(()) }));
        let coordinator = PublishingCoordinator::new(dir, mode, 5, publish_one);

        let results = coordinator.publish_to_targets(&alert(), &["a".into(), "ghost".into()]).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target, "a");
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_semaphore() {
        let dir = InMemoryTargetDirectory::new();
        dir.replace_all((0..10).map(|i| target(&format!("t{i}"), true)).collect());
        let dir: Arc<dyn TargetDirectory> = Arc::new(dir);
        let mode = Arc::new(ModeManager::new(dir.clone(), Duration::from_secs(5)));

        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let c2 = concurrent.clone();
        let m2 = max_seen.clone();
        let publish_one: PublishOne = Arc::new(move |_, _| {
            let concurrent = c2.clone();
            let max_seen = m2.clone();
            Box::pin(async move {
                let cur = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(cur, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        });

        let coordinator = PublishingCoordinator::new(dir, mode, 3, publish_one);
        coordinator.publish_to_all(&alert()).await;
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_pending_submissions() {
        let dir = InMemoryTargetDirectory::new();
        dir.replace_all(vec![target("a", true)]);
        let dir: Arc<dyn TargetDirectory> = Arc::new(dir);
        let mode = Arc::new(ModeManager::new(dir.clone(), Duration::from_secs(5)));

        let publish_one: PublishOne = Arc::new(|_, _| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
        });

        let coordinator = PublishingCoordinator::new(dir, mode, 5, publish_one);
        let token = CancellationToken::new();
        token.cancel();

        let results = coordinator.publish_to_all_cancellable(&alert(), &token).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("cancelled"));
    }
}
