//! Priority queue and worker pool (spec §4.7). Three strict-priority FIFO buckets feed a
//! fixed pool of workers; each worker drains high, then medium, then low, mirroring the
//! `tokio::sync::mpsc` channel-drain loop [`crate::telemetry::sinks::NonBlockingSink`]
//! spawns in the background, generalized from one channel to three.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backoff_calculator::{self, BackoffConfig};
use crate::circuit_breaker_registry::CircuitBreakerRegistry;
use crate::classifier;
use crate::dlq::DeadLetterStore;
use crate::error::PublishingError;
use crate::middleware::{Dispatcher, MiddlewareChain};
use crate::model::{DlqEntry, ErrorKind, JobState, Priority, PublishingJob};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueConfig {
    pub high_capacity: usize,
    pub medium_capacity: usize,
    pub low_capacity: usize,
    pub workers: usize,
    pub backoff: BackoffConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            high_capacity: 1000,
            medium_capacity: 5000,
            low_capacity: 10000,
            workers: 8,
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct QueueStats {
    pub submitted: AtomicU64,
    pub succeeded: AtomicU64,
    pub retried: AtomicU64,
    pub dead_lettered: AtomicU64,
    pub rejected: AtomicU64,
}

impl QueueStats {
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueStatsSnapshot {
    pub submitted: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub rejected: u64,
    /// Per-bucket occupancy, §4.7's `GetStats` "bucket sizes".
    pub bucket_sizes: BucketSizes,
    pub worker_count: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BucketSizes {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl BucketSizes {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// `GET /queue` response shape (spec §6): size/capacity/utilisation/worker count, as
/// distinct from `GET /queue/stats`'s lifetime totals and per-bucket breakdown.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueInfo {
    pub size: usize,
    pub capacity: usize,
    pub utilisation: f64,
    pub worker_count: usize,
}

/// A snapshot of an in-flight job, filterable the way `GET /jobs` requires.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub target_name: Option<String>,
    pub state: Option<JobState>,
    pub priority: Option<Priority>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

const MAX_JOB_PAGE_SIZE: u32 = 1000;

struct Buckets {
    high: (mpsc::Sender<PublishingJob>, tokio::sync::Mutex<mpsc::Receiver<PublishingJob>>),
    medium: (mpsc::Sender<PublishingJob>, tokio::sync::Mutex<mpsc::Receiver<PublishingJob>>),
    low: (mpsc::Sender<PublishingJob>, tokio::sync::Mutex<mpsc::Receiver<PublishingJob>>),
}

/// Priority queue with a fixed worker pool. Workers pull strictly high-before-medium-
/// before-low; a non-empty high bucket starves medium and low until it drains.
pub struct PublishingQueue {
    buckets: Arc<Buckets>,
    config: QueueConfig,
    stats: Arc<QueueStats>,
    workers: Vec<JoinHandle<()>>,
    /// A `CancellationToken` rather than a bare `Notify`: a retry task spawned after
    /// `stop()` has already fired still needs to observe shutdown immediately, not just
    /// tasks that were already polling when it fired.
    shutdown: CancellationToken,
    /// In-flight job snapshots (queued/processing/retrying), keyed by job id. Entries are
    /// removed on a terminal state (succeeded dropped, failed/exhausted moved to DLQ) per
    /// the job lifecycle in §3. Backs `GET /jobs` and `GET /jobs/{id}`.
    jobs: Arc<Mutex<HashMap<String, PublishingJob>>>,
}

impl PublishingQueue {
    pub fn new(
        config: QueueConfig,
        middleware: MiddlewareChain,
        breakers: CircuitBreakerRegistry,
        dlq: Arc<dyn DeadLetterStore>,
        dispatch: Dispatcher,
    ) -> Self {
        let (htx, hrx) = mpsc::channel(config.high_capacity);
        let (mtx, mrx) = mpsc::channel(config.medium_capacity);
        let (ltx, lrx) = mpsc::channel(config.low_capacity);
        let buckets = Arc::new(Buckets {
            high: (htx, tokio::sync::Mutex::new(hrx)),
            medium: (mtx, tokio::sync::Mutex::new(mrx)),
            low: (ltx, tokio::sync::Mutex::new(lrx)),
        });
        let stats = Arc::new(QueueStats::default());
        let shutdown = CancellationToken::new();
        let jobs = Arc::new(Mutex::new(HashMap::new()));

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let buckets = buckets.clone();
            let middleware = middleware.clone();
            let breakers = breakers.clone();
            let dlq = dlq.clone();
            let dispatch = dispatch.clone();
            let stats = stats.clone();
            let shutdown = shutdown.clone();
            let jobs = jobs.clone();
            let backoff_cfg = config.backoff;

            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, buckets, middleware, breakers, dlq, dispatch, stats, shutdown, jobs, backoff_cfg).await;
            }));
        }

        Self { buckets, config, stats, workers, shutdown, jobs }
    }

    /// Submit a job, routed by its pre-computed priority. Non-blocking: a full bucket
    /// fails immediately with `Backpressure` rather than waiting for room.
    pub fn submit(&self, job: PublishingJob) -> Result<(), PublishingError> {
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        let priority = job.priority;
        self.jobs.lock().insert(job.id.clone(), job.clone());
        let sender = match priority {
            Priority::High => &self.buckets.high.0,
            Priority::Medium => &self.buckets.medium.0,
            Priority::Low => &self.buckets.low.0,
        };
        let job_id = job.id.clone();
        sender.try_send(job).map_err(|_| {
            self.jobs.lock().remove(&job_id);
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            PublishingError::Backpressure { bucket: priority }
        })
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        let mut snapshot = self.stats.snapshot();
        snapshot.bucket_sizes = self.bucket_sizes();
        snapshot.worker_count = self.config.workers;
        snapshot
    }

    /// Per-bucket occupancy, computed from the bounded channel's spare capacity so it
    /// never needs the receiver-side lock a worker might be holding mid-poll.
    pub fn bucket_sizes(&self) -> BucketSizes {
        BucketSizes {
            high: self.buckets.high.0.max_capacity() - self.buckets.high.0.capacity(),
            medium: self.buckets.medium.0.max_capacity() - self.buckets.medium.0.capacity(),
            low: self.buckets.low.0.max_capacity() - self.buckets.low.0.capacity(),
        }
    }

    /// `GET /queue` response: size/capacity/utilisation/worker count (spec §6), driven by
    /// the live config rather than a hard-coded worker count (§9's open question).
    pub fn info(&self) -> QueueInfo {
        let sizes = self.bucket_sizes();
        let size = sizes.total();
        let capacity = self.config.high_capacity + self.config.medium_capacity + self.config.low_capacity;
        let utilisation = if capacity == 0 { 0.0 } else { size as f64 / capacity as f64 };
        QueueInfo { size, capacity, utilisation, worker_count: self.config.workers }
    }

    /// List in-flight job snapshots (queued/processing/retrying), filtered and paginated.
    pub fn list_jobs(&self, filter: &JobFilter) -> Vec<PublishingJob> {
        let guard = self.jobs.lock();
        let mut matched: Vec<PublishingJob> = guard
            .values()
            .filter(|j| filter.target_name.as_deref().map_or(true, |n| n == j.target.name))
            .filter(|j| filter.state.map_or(true, |s| s == j.state))
            .filter(|j| filter.priority.map_or(true, |p| p == j.priority))
            .cloned()
            .collect();
        drop(guard);
        matched.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.unwrap_or(MAX_JOB_PAGE_SIZE).min(MAX_JOB_PAGE_SIZE) as usize;
        matched.into_iter().skip(offset).take(limit).collect()
    }

    /// Fetch one in-flight job snapshot by id.
    pub fn get_job(&self, id: &str) -> Option<PublishingJob> {
        self.jobs.lock().get(id).cloned()
    }

    pub fn config(&self) -> QueueConfig {
        self.config
    }

    /// Signal workers to stop pulling new jobs and wait up to `drain_timeout` for
    /// in-flight work to finish.
    pub async fn stop(self, drain_timeout: Duration) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(drain_timeout, futures::future::join_all(self.workers)).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    buckets: Arc<Buckets>,
    middleware: MiddlewareChain,
    breakers: CircuitBreakerRegistry,
    dlq: Arc<dyn DeadLetterStore>,
    dispatch: Dispatcher,
    stats: Arc<QueueStats>,
    shutdown: CancellationToken,
    jobs: Arc<Mutex<HashMap<String, PublishingJob>>>,
    backoff_cfg: BackoffConfig,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            job = next_job(&buckets) => job,
        };
        let Some(mut job) = job else { break };

        tracing::debug!(worker_id, job_id = %job.id, priority = ?job.priority, "picked up job");
        job.state = JobState::Processing;
        job.started_at = Some(std::time::SystemTime::now());
        jobs.lock().insert(job.id.clone(), job.clone());

        let breaker = breakers.get_or_create(&job.target.name);
        if !breaker.can_attempt() {
            let target_name = job.target.name.clone();
            requeue_or_dlq(
                &buckets, &dlq, &stats, &jobs, &backoff_cfg, &shutdown, job,
                PublishingError::CircuitOpen { target: target_name },
            )
            .await;
            continue;
        }

        let outcome = middleware.dispatch(job.alert.as_ref(), job.target.as_ref(), dispatch.clone()).await;
        match outcome {
            Ok(()) => {
                breaker.record_success();
                job.state = JobState::Succeeded;
                job.completed_at = Some(std::time::SystemTime::now());
                stats.succeeded.fetch_add(1, Ordering::Relaxed);
                jobs.lock().remove(&job.id);
            }
            Err(err) => {
                breaker.record_failure();
                requeue_or_dlq(&buckets, &dlq, &stats, &jobs, &backoff_cfg, &shutdown, job, err).await;
            }
        }
    }
}

async fn next_job(buckets: &Buckets) -> Option<PublishingJob> {
    let mut high = buckets.high.1.lock().await;
    if let Ok(job) = high.try_recv() {
        return Some(job);
    }
    drop(high);

    let mut medium = buckets.medium.1.lock().await;
    if let Ok(job) = medium.try_recv() {
        return Some(job);
    }
    drop(medium);

    let mut low = buckets.low.1.lock().await;
    if let Ok(job) = low.try_recv() {
        return Some(job);
    }
    drop(low);

    // Nothing ready right now; block on whichever bucket yields first.
    let mut high = buckets.high.1.lock().await;
    let mut medium = buckets.medium.1.lock().await;
    let mut low = buckets.low.1.lock().await;
    tokio::select! {
        biased;
        job = high.recv() => job,
        job = medium.recv() => job,
        job = low.recv() => job,
    }
}

#[allow(clippy::too_many_arguments)]
async fn requeue_or_dlq(
    buckets: &Arc<Buckets>,
    dlq: &Arc<dyn DeadLetterStore>,
    stats: &Arc<QueueStats>,
    jobs: &Arc<Mutex<HashMap<String, PublishingJob>>>,
    backoff_cfg: &BackoffConfig,
    shutdown: &CancellationToken,
    mut job: PublishingJob,
    err: PublishingError,
) {
    let kind = classifier::classify(None::<u16>, Some(&err)).max_with(err.kind());
    job.last_error = Some(err.to_string());
    job.error_kind = Some(kind);

    if backoff_calculator::should_retry(kind, job.retry_count, backoff_cfg) {
        job.retry_count += 1;
        job.state = JobState::Retrying;
        stats.retried.fetch_add(1, Ordering::Relaxed);
        jobs.lock().insert(job.id.clone(), job.clone());
        let delay = backoff_calculator::backoff(job.retry_count, backoff_cfg);
        let sender = match job.priority {
            Priority::High => buckets.high.0.clone(),
            Priority::Medium => buckets.medium.0.clone(),
            Priority::Low => buckets.low.0.clone(),
        };
        let dlq = dlq.clone();
        let stats = stats.clone();
        let shutdown = shutdown.clone();
        let jobs = jobs.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    // Abandoned during drain: the retry timer never fired, so this job
                    // is dead-lettered as a cancellation rather than silently dropped.
                    // `cancelled()` resolves immediately for a task spawned after `stop()`
                    // already fired, not only for one that was already waiting on it.
                    job.state = JobState::Dlq;
                    job.error_kind = Some(ErrorKind::Cancelled);
                    stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                    jobs.lock().remove(&job.id);
                    let entry = DlqEntry::from_job(&job, "queue shutdown during retry wait".into(), ErrorKind::Cancelled);
                    if let Err(e) = dlq.write(entry).await {
                        tracing::error!(error = %e, "failed to write DLQ entry for abandoned retry");
                    }
                }
                _ = tokio::time::sleep(delay) => {
                    let job_id = job.id.clone();
                    if sender.try_send(job).is_err() {
                        // Bucket is full or its receiver dropped: the job would otherwise
                        // vanish from both the channel and the in-flight registry with no
                        // trace, so it gets the same dead-letter treatment as an exhausted
                        // retry instead of a silent drop.
                        job.state = JobState::Dlq;
                        job.error_kind = Some(ErrorKind::Backpressure);
                        stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                        jobs.lock().remove(&job_id);
                        let entry = DlqEntry::from_job(&job, "retry requeue rejected: bucket full".into(), ErrorKind::Backpressure);
                        if let Err(e) = dlq.write(entry).await {
                            tracing::error!(error = %e, "failed to write DLQ entry for rejected retry");
                        }
                    }
                }
            }
        });
    } else {
        job.state = JobState::Dlq;
        stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
        jobs.lock().remove(&job.id);
        let message = job.last_error.clone().unwrap_or_default();
        let entry = DlqEntry::from_job(&job, message, kind);
        let dlq = dlq.clone();
        tokio::spawn(async move {
            if let Err(e) = dlq.write(entry).await {
                tracing::error!(error = %e, "failed to write DLQ entry");
            }
        });
    }
}

trait ErrorKindExt {
    fn max_with(self, other: ErrorKind) -> ErrorKind;
}

impl ErrorKindExt for ErrorKind {
    /// When the classifier and the error's own `.kind()` disagree (the classifier only
    /// sees strings/status codes, never the richer PublishingError variant), prefer the
    /// richer one.
    fn max_with(self, other: ErrorKind) -> ErrorKind {
        if self == ErrorKind::Unknown {
            other
        } else {
            self
        }
    }
}
