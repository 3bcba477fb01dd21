//! Admin command surface for the publishing subsystem (spec §6).
//!
//! spec.md scopes HTTP handlers out explicitly, so the Admin API is modeled the way the
//! teacher models its own control plane: each verb+path becomes a [`PublishingCommand`]
//! variant dispatched through the same auth -> handler -> history/audit pipeline
//! [`crate::control::router::CommandRouter`] runs for [`super::handler::BuiltInCommand`].

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::circuit_breaker_registry::CircuitBreakerRegistry;
use crate::coordinator::PublishingCoordinator;
use crate::dlq::{DeadLetterStore, DlqFilter};
use crate::mode::ModeManager;
use crate::model::{AlertStatus, EnrichedAlert, PublishingJob, PublishingTarget, Severity};
use crate::queue::{JobFilter, PublishingQueue};
use crate::target_directory::{RefreshManager, TargetDirectory};

use super::handler::CommandHandler;
use super::types::{AuthContext, CommandEnvelope, CommandError, CommandFailure, CommandLabel, CommandResult};

/// Every operation in spec.md §6's Admin API table, as a typed, routable command.
#[derive(Clone, Debug)]
pub enum PublishingCommand {
    /// `GET /targets`
    ListTargets,
    /// `GET /targets/{name}`
    GetTarget { name: String },
    /// `POST /targets/refresh`
    RefreshTargets,
    /// `POST /targets/{name}/test` — publishes a synthetic test alert to one target.
    TestTarget { name: String },
    /// `GET /stats` — queue, breaker, and mode snapshot combined.
    Stats,
    /// `GET /queue` — size, capacity, utilisation, worker count.
    QueueInfo,
    /// `GET /queue/stats`
    QueueStats,
    /// `GET /jobs` — list in-flight job snapshots, filterable.
    ListJobs(Box<JobFilter>),
    /// `GET /jobs/{id}`
    GetJob { id: String },
    /// `GET /mode`
    GetMode,
    /// `POST /submit` — manual/backfill submission of an alert to one target, or to every
    /// enabled target when `target` is `None` (routed through the coordinator's fan-out).
    Submit {
        /// Alert payload to enqueue.
        alert: Box<EnrichedAlert>,
        /// Target name to route to; `None` means "all enabled targets".
        target: Option<String>,
    },
    /// `GET /dlq`
    ListDlq(Box<DlqFilter>),
    /// `POST /dlq/{id}/replay`
    ReplayDlq { id: String },
    /// `DELETE /dlq/purge`
    PurgeDlq {
        /// Purge entries that failed more than this many seconds ago.
        older_than_secs: u64,
    },
    /// Reset a per-target circuit breaker (operator override, not in spec.md's HTTP table
    /// but required to make `reset_circuit_breaker` reachable the way
    /// [`super::handler::BuiltInCommand::ResetCircuitBreaker`] is for the generic breaker).
    ResetBreaker { target: String },
}

impl CommandLabel for PublishingCommand {
    fn label(&self) -> &str {
        match self {
            PublishingCommand::ListTargets => "list_targets",
            PublishingCommand::GetTarget { .. } => "get_target",
            PublishingCommand::RefreshTargets => "refresh_targets",
            PublishingCommand::TestTarget { .. } => "test_target",
            PublishingCommand::Stats => "stats",
            PublishingCommand::QueueInfo => "queue_info",
            PublishingCommand::QueueStats => "queue_stats",
            PublishingCommand::ListJobs(_) => "list_jobs",
            PublishingCommand::GetJob { .. } => "get_job",
            PublishingCommand::GetMode => "get_mode",
            PublishingCommand::Submit { .. } => "submit",
            PublishingCommand::ListDlq(_) => "list_dlq",
            PublishingCommand::ReplayDlq { .. } => "replay_dlq",
            PublishingCommand::PurgeDlq { .. } => "purge_dlq",
            PublishingCommand::ResetBreaker { .. } => "reset_breaker",
        }
    }
}

fn test_alert(target_name: &str) -> EnrichedAlert {
    EnrichedAlert {
        fingerprint: format!("admin-test-{target_name}"),
        alert_name: "AdminTestAlert".into(),
        status: AlertStatus::Firing,
        labels: Default::default(),
        annotations: Default::default(),
        starts_at: SystemTime::now(),
        ends_at: None,
        generator_url: None,
        classification: Some(crate::model::Classification {
            severity: Severity::Info,
            confidence: 1.0,
            reasoning: "operator-triggered connectivity test".into(),
            recommendations: Vec::new(),
        }),
    }
}

fn not_found(what: impl Into<String>) -> CommandResult {
    CommandResult::Error(CommandFailure::NotFound { what: what.into() })
}

fn invalid(msg: impl Into<String>) -> CommandResult {
    CommandResult::Error(CommandFailure::InvalidArgs { msg: msg.into() })
}

fn to_json(value: &impl serde::Serialize) -> Result<CommandResult, CommandError> {
    serde_json::to_string(value)
        .map(CommandResult::Value)
        .map_err(|e| CommandError::Handler(format!("failed to serialize response: {e}")))
}

/// Aggregated dependencies the publishing command handler dispatches against.
pub struct PublishingCommandHandler {
    queue: Arc<PublishingQueue>,
    dlq: Arc<dyn DeadLetterStore>,
    directory: Arc<dyn TargetDirectory>,
    refresh: Arc<RefreshManager>,
    mode: Arc<ModeManager>,
    breakers: CircuitBreakerRegistry,
    coordinator: PublishingCoordinator,
}

impl PublishingCommandHandler {
    /// Wire a handler against the live subsystem components. `coordinator` must be built
    /// with a `PublishOne` that actually dispatches (e.g.
    /// [`crate::coordinator::queue_backed_publish_one`]) for `Submit { target: None }` and
    /// `TestTarget` to do anything; see [`Self::with_queue_dispatch`] for the common case.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<PublishingQueue>,
        dlq: Arc<dyn DeadLetterStore>,
        directory: Arc<dyn TargetDirectory>,
        refresh: Arc<RefreshManager>,
        mode: Arc<ModeManager>,
        breakers: CircuitBreakerRegistry,
        coordinator: PublishingCoordinator,
    ) -> Self {
        Self { queue, dlq, directory, refresh, mode, breakers, coordinator }
    }

    /// Wire a handler whose coordinator fans out through the same queue a direct
    /// `/submit` uses, via [`crate::coordinator::queue_backed_publish_one`]. This is the
    /// constructor a real deployment wants; [`Self::new`] exists for callers that need a
    /// coordinator backed by something other than this handler's own queue.
    #[allow(clippy::too_many_arguments)]
    pub fn with_queue_dispatch(
        queue: Arc<PublishingQueue>,
        dlq: Arc<dyn DeadLetterStore>,
        directory: Arc<dyn TargetDirectory>,
        refresh: Arc<RefreshManager>,
        mode: Arc<ModeManager>,
        breakers: CircuitBreakerRegistry,
        fan_out_concurrency: usize,
    ) -> Self {
        let publish_one = crate::coordinator::queue_backed_publish_one(queue.clone(), directory.clone());
        let coordinator = PublishingCoordinator::new(directory.clone(), mode.clone(), fan_out_concurrency, publish_one);
        Self::new(queue, dlq, directory, refresh, mode, breakers, coordinator)
    }

    async fn list_targets(&self) -> Result<CommandResult, CommandError> {
        to_json(&self.directory.list_targets().await)
    }

    async fn get_target(&self, name: &str) -> Result<CommandResult, CommandError> {
        match self.directory.get_target(name).await {
            Some(t) => to_json(&t),
            None => Ok(not_found(format!("target:{name}"))),
        }
    }

    async fn test_target(&self, name: &str) -> Result<CommandResult, CommandError> {
        if self.directory.get_target(name).await.is_none() {
            return Ok(not_found(format!("target:{name}")));
        }
        let results = self.coordinator.publish_to_targets(&test_alert(name), &[name.to_string()]).await;
        match results.into_iter().next() {
            Some(r) if r.success => Ok(CommandResult::Ack),
            Some(r) => Ok(CommandResult::Error(CommandFailure::Internal {
                msg: r.error.unwrap_or_else(|| "test publish failed".into()),
            })),
            None => Ok(CommandResult::Error(CommandFailure::Internal {
                msg: "test publish produced no result (metrics-only mode?)".into(),
            })),
        }
    }

    async fn stats(&self) -> Result<CommandResult, CommandError> {
        let queue_stats = self.queue.stats();
        let breakers: Vec<(String, String)> = self
            .breakers
            .snapshot()
            .into_iter()
            .map(|(name, state)| (name, format!("{state:?}")))
            .collect();
        let dlq_stats = self.dlq.stats().await;
        let body = serde_json::json!({
            "queue": queue_stats,
            "breakers": breakers,
            "mode": format!("{:?}", self.mode.mode()),
            "dlq": dlq_stats,
        });
        serde_json::to_string(&body)
            .map(CommandResult::Value)
            .map_err(|e| CommandError::Handler(format!("failed to serialize stats: {e}")))
    }

    async fn submit(&self, alert: EnrichedAlert, target: Option<&str>) -> Result<CommandResult, CommandError> {
        let Some(target) = target else {
            let results = self.coordinator.publish_to_all(&alert).await;
            return to_json(&results);
        };
        let Some(target) = self.directory.get_target(target).await else {
            return Ok(not_found(format!("target:{target}")));
        };
        let job = PublishingJob::new(Arc::new(alert), Arc::new(target));
        match self.queue.submit(job) {
            Ok(()) => Ok(CommandResult::Ack),
            Err(e) => Ok(invalid(e.to_string())),
        }
    }

    async fn list_dlq(&self, filter: DlqFilter) -> Result<CommandResult, CommandError> {
        match self.dlq.read(filter).await {
            Ok(entries) => to_json(&entries),
            Err(e) => Ok(invalid(e)),
        }
    }

    async fn replay_dlq(&self, id: &str) -> Result<CommandResult, CommandError> {
        let entry = match self.dlq.get(id).await {
            Ok(entry) => entry,
            Err(e) => return Ok(not_found(format!("dlq_entry:{id} ({e})"))),
        };
        let job = PublishingJob::new(Arc::new(entry.enriched_alert.clone()), Arc::new(entry.target_config.clone()));
        match self.queue.submit(job) {
            Ok(()) => {
                self.dlq.mark_replayed(id, "queued".into()).await.map_err(CommandError::Handler)?;
                Ok(CommandResult::Ack)
            }
            Err(e) => {
                let outcome = format!("resubmit failed: {e}");
                self.dlq.mark_replayed(id, outcome.clone()).await.map_err(CommandError::Handler)?;
                Ok(invalid(outcome))
            }
        }
    }

    async fn purge_dlq(&self, older_than_secs: u64) -> Result<CommandResult, CommandError> {
        let cutoff = SystemTime::now() - Duration::from_secs(older_than_secs);
        match self.dlq.purge(cutoff).await {
            Ok(n) => Ok(CommandResult::Value(n.to_string())),
            Err(e) => Ok(invalid(e)),
        }
    }

    fn list_jobs(&self, filter: JobFilter) -> Result<CommandResult, CommandError> {
        to_json(&self.queue.list_jobs(&filter))
    }

    fn get_job(&self, id: &str) -> Result<CommandResult, CommandError> {
        match self.queue.get_job(id) {
            Some(job) => to_json(&job),
            None => Ok(not_found(format!("job:{id}"))),
        }
    }

    fn reset_breaker(&self, target: &str) -> Result<CommandResult, CommandError> {
        match self.breakers.reset(target) {
            Ok(()) => Ok(CommandResult::Ack),
            Err(e) => Ok(not_found(format!("circuit_breaker:{target} ({e})"))),
        }
    }
}

#[async_trait]
impl CommandHandler<PublishingCommand> for PublishingCommandHandler {
    async fn handle(
        &self,
        env: CommandEnvelope<PublishingCommand>,
        _ctx: AuthContext,
    ) -> Result<CommandResult, CommandError> {
        match env.cmd {
            PublishingCommand::ListTargets => self.list_targets().await,
            PublishingCommand::GetTarget { name } => self.get_target(&name).await,
            PublishingCommand::RefreshTargets => {
                self.refresh.refresh_now();
                Ok(CommandResult::Ack)
            }
            PublishingCommand::TestTarget { name } => self.test_target(&name).await,
            PublishingCommand::Stats => self.stats().await,
            PublishingCommand::QueueInfo => to_json(&self.queue.info()),
            PublishingCommand::QueueStats => to_json(&self.queue.stats()),
            PublishingCommand::ListJobs(filter) => self.list_jobs(*filter),
            PublishingCommand::GetJob { id } => self.get_job(&id),
            PublishingCommand::GetMode => Ok(CommandResult::Value(format!("{:?}", self.mode.mode()))),
            PublishingCommand::Submit { alert, target } => self.submit(*alert, target.as_deref()).await,
            PublishingCommand::ListDlq(filter) => self.list_dlq(*filter).await,
            PublishingCommand::ReplayDlq { id } => self.replay_dlq(&id).await,
            PublishingCommand::PurgeDlq { older_than_secs } => self.purge_dlq(older_than_secs).await,
            PublishingCommand::ResetBreaker { target } => self.reset_breaker(&target),
        }
    }
}
