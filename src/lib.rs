#![forbid(unsafe_code)]

//! # alert-publishing
//!
//! Multi-target alert publishing subsystem: a priority queue and worker pool fan
//! enriched alerts out to an arbitrary number of external targets (webhooks,
//! incident platforms, paging systems, chat channels), with a per-target circuit
//! breaker, a classifier that buckets transport/HTTP failures into a retry
//! decision, a dead-letter store for exhausted jobs, and a mode manager that
//! demotes the whole subsystem to metrics-only when no target is healthy enough
//! to receive traffic.
//!
//! ## Features
//!
//! - **Priority queue & worker pool** ([`queue`]) — strict-priority dispatch with
//!   backoff-scheduled requeues and dead-letter fallback.
//! - **Per-target circuit breakers** ([`circuit_breaker_registry`]) wrapping the
//!   lock-free [`circuit_breaker::CircuitBreaker`] state machine.
//! - **Error classification** ([`classifier`]) mapping status codes and error
//!   text onto [`model::ErrorKind`].
//! - **Format registry** ([`format`]) transforming enriched alerts into each
//!   target's wire shape (Alertmanager, incident platform, paging, chat, generic
//!   webhook).
//! - **Dead-letter store** ([`dlq`]) and **mode manager** ([`mode`]) for
//!   operating degraded.
//! - **Admin surface** ([`control::publishing`]) exposing every operation through
//!   the same `CommandRouter` control plane the rest of this crate's built-in
//!   commands use, rather than an HTTP framework.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use alert_publishing::prelude::*;
//! use alert_publishing::circuit_breaker::CircuitBreakerConfig;
//! use alert_publishing::backoff_calculator::BackoffConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let directory: Arc<dyn TargetDirectory> = Arc::new(InMemoryTargetDirectory::new());
//! let cache = TtlLruCache::new(10_000, None);
//! let middleware = alert_publishing::middleware::MiddlewareChain::new(
//!     default_registry(),
//!     Arc::new(cache),
//!     Duration::from_secs(5),
//! );
//! let breakers = CircuitBreakerRegistry::new(CircuitBreakerConfig::default());
//! let dlq: Arc<dyn DeadLetterStore> = Arc::new(InMemoryDeadLetterStore::new());
//! let dispatch: alert_publishing::middleware::Dispatcher =
//!     Arc::new(|_target, _payload| Box::pin(async { Ok(()) }));
//!
//! let queue = Arc::new(PublishingQueue::new(
//!     QueueConfig { backoff: BackoffConfig::default(), ..Default::default() },
//!     middleware,
//!     breakers,
//!     dlq,
//!     dispatch,
//! ));
//!
//! let mode = Arc::new(ModeManager::new(directory.clone(), Duration::from_secs(60)));
//! // Fan-out re-enters the same queue a direct `/submit` uses, so a `Submit { target:
//! // None }` or `TestTarget` command gets retry, circuit breaking, and the DLQ too.
//! let publish_one = alert_publishing::coordinator::queue_backed_publish_one(queue.clone(), directory.clone());
//! let coordinator = PublishingCoordinator::new(directory, mode, 5, publish_one);
//! let _ = coordinator;
//! # Ok(())
//! # }
//! ```

mod clock;

pub mod adaptive;
pub mod backoff_calculator;
pub mod cache;
pub mod circuit_breaker;
pub mod circuit_breaker_registry;
pub mod classifier;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod dlq;
pub mod error;
pub mod format;
pub mod incident_sink;
pub mod middleware;
pub mod mode;
pub mod model;
pub mod queue;
pub mod rate_limit;
pub mod silence;
pub mod sink;
pub mod target_directory;
pub mod telemetry;
pub mod validator;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use clock::{Clock, MonotonicClock};
pub use error::{PublishingError, Violation};
pub use model::{
    AlertStatus, Classification, EnrichedAlert, ErrorKind, JobState, Mode, Priority,
    PublishingJob, PublishingResult, PublishingTarget, Severity, Silence, SilenceFilter,
};

pub mod prelude;
