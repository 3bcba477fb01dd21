//! Middleware chain (spec §4.5): Validation → Cache → Metrics → RateLimit → Timeout,
//! wrapped around one delivery attempt for a single job.
//!
//! Mirrors the inside-out closure composition [`crate::stack::ResilienceStack`] uses for
//! its own layer order, generalized to `PublishingError` instead of `ResilienceError<E>`.
//! The chain's final Retry layer is not nested here: retry-with-backoff requires freeing
//! a worker slot between attempts, so it is owned by the queue's requeue loop
//! (see [`crate::queue`]), which re-invokes [`MiddlewareChain::dispatch`] per attempt.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::cache::TtlLruCache;
use crate::error::PublishingError;
use crate::format::FormatRegistry;
use crate::model::{EnrichedAlert, PublishingTarget};
use crate::rate_limit::{Decision, RateLimiter};
use crate::telemetry::{emit_best_effort, PublishingEvent, RequestOutcome, TelemetrySink};
use crate::validator;

/// Cache key derived from the fields that fully determine a formatted payload.
fn cache_key(alert: &EnrichedAlert, format: &str) -> String {
    let severity = alert
        .classification
        .as_ref()
        .map(|c| format!("{:?}", c.severity))
        .unwrap_or_default();
    format!("{}:{:?}:{}:{}", alert.fingerprint, alert.status, severity, format)
}

/// Per-target dispatch function: takes a formatted payload and delivers it.
pub type Dispatcher = Arc<dyn Fn(PublishingTarget, Value) -> futures::future::BoxFuture<'static, Result<(), PublishingError>> + Send + Sync>;

/// Erased, fire-and-forget event emitter so [`MiddlewareChain`] doesn't need to be generic
/// over a concrete [`TelemetrySink`] (it's cloned into every worker, same reasoning as
/// [`Dispatcher`] being a boxed closure rather than a type parameter).
type EventEmitter = Arc<dyn Fn(PublishingEvent) -> futures::future::BoxFuture<'static, ()> + Send + Sync>;

/// Adapt any [`TelemetrySink`] into the closure-shaped emitter the chain holds.
fn erase_sink<S>(sink: S) -> EventEmitter
where
    S: TelemetrySink + 'static,
    S::Future: Send,
{
    Arc::new(move |event| {
        let sink = sink.clone();
        Box::pin(emit_best_effort(sink, event))
    })
}

#[derive(Clone)]
pub struct MiddlewareChain {
    formats: FormatRegistry,
    cache: Arc<TtlLruCache<String, Value>>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    metrics: Option<EventEmitter>,
    timeout: Duration,
}

impl MiddlewareChain {
    pub fn new(formats: FormatRegistry, cache: Arc<TtlLruCache<String, Value>>, timeout: Duration) -> Self {
        Self { formats, cache, rate_limiter: None, metrics: None, timeout }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Emit a `PublishingEvent::Request` (success/failure + duration) through `sink` for
    /// every dispatch attempt. Best-effort: a sink that errors or isn't ready drops the
    /// event rather than failing the attempt.
    pub fn with_metrics_sink<S>(mut self, sink: S) -> Self
    where
        S: TelemetrySink + 'static,
        S::Future: Send,
    {
        self.metrics = Some(erase_sink(sink));
        self
    }

    /// Run one delivery attempt for `alert` against `target`, using `dispatch` for the
    /// final network call. Steps run in order: Validation, Cache (format only), RateLimit,
    /// Timeout. Metrics isn't a separate pass — its outcome isn't known until the
    /// dispatch/timeout step resolves — so it wraps that step instead, emitting a
    /// `Request::{Success,Failure}` event with the attempt's duration to `metrics` when one
    /// is configured.
    pub async fn dispatch(
        &self,
        alert: &EnrichedAlert,
        target: &PublishingTarget,
        dispatch: Dispatcher,
    ) -> Result<(), PublishingError> {
        let violations = validator::validate(alert);
        if !violations.is_empty() {
            return Err(PublishingError::Validation(violations));
        }

        let key = cache_key(alert, &target.format);
        let payload = if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(target = %target.name, "format cache hit");
            cached
        } else {
            let handle = self.formats.checkout(&target.format)?;
            let value = handle.formatter().format(alert)?;
            self.cache.set(key, value.clone(), None);
            value
        };

        if let Some(limiter) = &self.rate_limiter {
            match limiter.acquire(1).await {
                Ok(Decision::Allowed { .. }) => {}
                Ok(Decision::Denied { .. }) => return Err(PublishingError::RateLimit),
                Err(e) => {
                    tracing::warn!(error = %e, "rate limiter backend error, failing open");
                }
            }
        }

        let start = tokio::time::Instant::now();
        let target_owned = target.clone();
        let outcome = match tokio::time::timeout(self.timeout, dispatch(target_owned, payload)).await {
            Ok(result) => result,
            Err(_) => Err(PublishingError::Timeout { elapsed: start.elapsed(), limit: self.timeout }),
        };

        if let Some(metrics) = &self.metrics {
            let duration = start.elapsed();
            let event = PublishingEvent::Request(if outcome.is_ok() {
                RequestOutcome::Success { duration }
            } else {
                RequestOutcome::Failure { duration }
            });
            tokio::spawn(metrics(event));
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::default_registry;
    use crate::model::AlertStatus;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;

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

    fn target() -> PublishingTarget {
        PublishingTarget {
            name: "ops-webhook".into(),
            target_type: "webhook".into(),
            url: "https://example.invalid/hook".into(),
            enabled: true,
            format: "webhook".into(),
            headers: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn invalid_alert_short_circuits_before_dispatch() {
        let chain = MiddlewareChain::new(default_registry(), Arc::new(TtlLruCache::new(16, None)), Duration::from_secs(1));
        let called = Arc::new(AtomicUsize::new(0));
        let called2 = called.clone();
        let dispatch: Dispatcher = Arc::new(move |_, _| {
            called2.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        });

        let mut bad = alert();
        bad.alert_name = "bad name".into();
        let result = chain.dispatch(&bad, &target(), dispatch).await;
        assert!(matches!(result, Err(PublishingError::Validation(_))));
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_dispatch_populates_cache() {
        let cache = Arc::new(TtlLruCache::new(16, None));
        let chain = MiddlewareChain::new(default_registry(), cache.clone(), Duration::from_secs(1));
        let dispatch: Dispatcher = Arc::new(|_, _| Box::pin(async { Ok(()) }));

        chain.dispatch(&alert(), &target(), dispatch).await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn timeout_is_surfaced_as_publishing_error() {
        let chain = MiddlewareChain::new(default_registry(), Arc::new(TtlLruCache::new(16, None)), Duration::from_millis(10));
        let dispatch: Dispatcher = Arc::new(|_, _| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        });

        tokio::time::pause();
        let fut = chain.dispatch(&alert(), &target(), dispatch);
        tokio::pin!(fut);
        tokio::time::advance(Duration::from_millis(11)).await;
        let result = fut.await;
        assert!(matches!(result, Err(PublishingError::Timeout { .. })));
    }

    #[tokio::test]
    async fn unknown_format_surfaces_format_error() {
        let chain = MiddlewareChain::new(default_registry(), Arc::new(TtlLruCache::new(16, None)), Duration::from_secs(1));
        let dispatch: Dispatcher = Arc::new(|_, _| Box::pin(async { Ok(()) }));
        let mut t = target();
        t.format = "does-not-exist".into();
        let result = chain.dispatch(&alert(), &t, dispatch).await;
        assert!(matches!(result, Err(PublishingError::Format(_))));
    }

    #[tokio::test]
    async fn successful_dispatch_emits_a_request_success_event() {
        use crate::telemetry::MemorySink;

        let sink = MemorySink::new();
        let chain = MiddlewareChain::new(default_registry(), Arc::new(TtlLruCache::new(16, None)), Duration::from_secs(1))
            .with_metrics_sink(sink.clone());
        let dispatch: Dispatcher = Arc::new(|_, _| Box::pin(async { Ok(()) }));

        chain.dispatch(&alert(), &target(), dispatch).await.unwrap();
        // The emit is spawned onto its own task; give it a beat to land.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PublishingEvent::Request(RequestOutcome::Success { .. })));
    }

    #[tokio::test]
    async fn failed_dispatch_emits_a_request_failure_event() {
        use crate::telemetry::MemorySink;

        let sink = MemorySink::new();
        let chain = MiddlewareChain::new(default_registry(), Arc::new(TtlLruCache::new(16, None)), Duration::from_secs(1))
            .with_metrics_sink(sink.clone());
        let dispatch: Dispatcher = Arc::new(|_, _| Box::pin(async { Err(PublishingError::Permanent("nope".into())) }));

        let _ = chain.dispatch(&alert(), &target(), dispatch).await;
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PublishingEvent::Request(RequestOutcome::Failure { .. })));
    }
}
