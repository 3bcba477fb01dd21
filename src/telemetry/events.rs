use std::fmt;
use std::time::Duration;

#[cfg(feature = "telemetry-json")]
use serde_json::json;

use crate::model::{ErrorKind, Mode, Priority};

/// Structured telemetry emitted by the publishing subsystem.
///
/// Every stage of the pipeline (queue, circuit breaker, DLQ, mode manager, the
/// timeout wrapped around each dispatch, and the terminal outcome of each job)
/// emits one of these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishingEvent {
    /// Priority queue events.
    Queue(QueueEvent),
    /// Per-target circuit breaker events.
    CircuitBreaker(CircuitBreakerEvent),
    /// Dead-letter store events.
    Dlq(DlqEvent),
    /// Mode manager transitions.
    Mode(ModeEvent),
    /// Per-dispatch timeout events.
    Timeout(TimeoutEvent),
    /// Terminal outcome of a single publish attempt.
    Request(RequestOutcome),
}

/// Events emitted by the priority queue and its requeue loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A job was accepted into a priority bucket.
    Submitted {
        /// Bucket the job was routed into.
        priority: Priority,
    },
    /// A job is being retried after backoff.
    Retried {
        /// Attempt number (1-indexed) about to be made.
        attempt: u32,
        /// Backoff delay before this retry.
        delay: Duration,
    },
    /// A job was rejected because its bucket was full.
    Rejected {
        /// Bucket that was full.
        priority: Priority,
    },
}

/// Events emitted by per-target circuit breakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerEvent {
    /// Circuit transitioned to open; the target stops receiving attempts.
    Opened {
        /// Number of consecutive failures that triggered the open.
        failure_count: usize,
    },
    /// Circuit transitioned to half-open; a probe attempt is allowed.
    HalfOpen,
    /// Circuit transitioned to closed; normal delivery resumes.
    Closed,
}

/// Events emitted by the dead-letter store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlqEvent {
    /// A job exhausted retries (or failed permanently) and was written to the DLQ.
    Written {
        /// Target the job was destined for.
        target: String,
        /// Classified error kind that caused the write.
        error_kind: ErrorKind,
    },
    /// An operator replayed a DLQ entry.
    Replayed {
        /// DLQ entry ID.
        id: String,
    },
    /// An operator (or retention policy) purged DLQ entries.
    Purged {
        /// Number of entries removed.
        count: u64,
    },
}

/// Events emitted by the mode manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// The subsystem's publishing mode changed.
    Transitioned {
        /// Mode before the transition.
        from: Mode,
        /// Mode after the transition.
        to: Mode,
    },
}

/// Events emitted when a dispatch attempt is wrapped in a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutEvent {
    /// A dispatch attempt exceeded its allotted duration.
    Occurred {
        /// Timeout duration that was exceeded.
        timeout: Duration,
    },
}

/// Terminal outcome of a single publish attempt, emitted by all pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The attempt succeeded.
    Success {
        /// Time taken to complete.
        duration: Duration,
    },
    /// The attempt failed.
    Failure {
        /// Time taken before failure.
        duration: Duration,
    },
}

impl fmt::Display for PublishingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishingEvent::Queue(event) => write!(f, "Queue::{}", event),
            PublishingEvent::CircuitBreaker(event) => write!(f, "CircuitBreaker::{}", event),
            PublishingEvent::Dlq(event) => write!(f, "Dlq::{}", event),
            PublishingEvent::Mode(event) => write!(f, "Mode::{}", event),
            PublishingEvent::Timeout(event) => write!(f, "Timeout::{}", event),
            PublishingEvent::Request(event) => write!(f, "Request::{}", event),
        }
    }
}

impl fmt::Display for QueueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueEvent::Submitted { priority } => write!(f, "Submitted({:?})", priority),
            QueueEvent::Retried { attempt, delay } => {
                write!(f, "Retried(#{}, delay={:?})", attempt, delay)
            }
            QueueEvent::Rejected { priority } => write!(f, "Rejected({:?})", priority),
        }
    }
}

impl fmt::Display for CircuitBreakerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitBreakerEvent::Opened { failure_count } => {
                write!(f, "Opened(failures={})", failure_count)
            }
            CircuitBreakerEvent::HalfOpen => write!(f, "HalfOpen"),
            CircuitBreakerEvent::Closed => write!(f, "Closed"),
        }
    }
}

impl fmt::Display for DlqEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DlqEvent::Written { target, error_kind } => {
                write!(f, "Written(target={}, kind={:?})", target, error_kind)
            }
            DlqEvent::Replayed { id } => write!(f, "Replayed({})", id),
            DlqEvent::Purged { count } => write!(f, "Purged({})", count),
        }
    }
}

impl fmt::Display for ModeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeEvent::Transitioned { from, to } => write!(f, "Transitioned({:?} -> {:?})", from, to),
        }
    }
}

impl fmt::Display for TimeoutEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutEvent::Occurred { timeout } => write!(f, "Occurred(timeout={:?})", timeout),
        }
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOutcome::Success { duration } => write!(f, "Success(duration={:?})", duration),
            RequestOutcome::Failure { duration } => write!(f, "Failure(duration={:?})", duration),
        }
    }
}

#[cfg_attr(not(feature = "telemetry-json"), allow(dead_code))]
#[inline]
fn clamp_u64(val: u128) -> u64 {
    val.min(u128::from(u64::MAX)) as u64
}

/// Convert a `PublishingEvent` into a JSON value for sinks.
#[cfg(feature = "telemetry-json")]
pub fn event_to_json(event: &PublishingEvent) -> serde_json::Value {
    match event {
        PublishingEvent::Queue(q) => match q {
            QueueEvent::Submitted { priority } => json!({
                "kind": "queue_submitted",
                "priority": format!("{:?}", priority),
            }),
            QueueEvent::Retried { attempt, delay } => json!({
                "kind": "queue_retried",
                "attempt": *attempt,
                "delay_ms": clamp_u64(delay.as_millis()),
            }),
            QueueEvent::Rejected { priority } => json!({
                "kind": "queue_rejected",
                "priority": format!("{:?}", priority),
            }),
        },
        PublishingEvent::CircuitBreaker(c) => match c {
            CircuitBreakerEvent::Opened { failure_count } => {
                json!({ "kind": "circuit_opened", "failures": *failure_count })
            }
            CircuitBreakerEvent::HalfOpen => json!({ "kind": "circuit_half_open" }),
            CircuitBreakerEvent::Closed => json!({ "kind": "circuit_closed" }),
        },
        PublishingEvent::Dlq(d) => match d {
            DlqEvent::Written { target, error_kind } => json!({
                "kind": "dlq_written",
                "target": target,
                "error_kind": format!("{:?}", error_kind),
            }),
            DlqEvent::Replayed { id } => json!({ "kind": "dlq_replayed", "id": id }),
            DlqEvent::Purged { count } => json!({ "kind": "dlq_purged", "count": *count }),
        },
        PublishingEvent::Mode(m) => match m {
            ModeEvent::Transitioned { from, to } => json!({
                "kind": "mode_transitioned",
                "from": format!("{:?}", from),
                "to": format!("{:?}", to),
            }),
        },
        PublishingEvent::Timeout(t) => match t {
            TimeoutEvent::Occurred { timeout } => json!({
                "kind": "timeout",
                "timeout_ms": clamp_u64(timeout.as_millis())
            }),
        },
        PublishingEvent::Request(r) => match r {
            RequestOutcome::Success { duration } => json!({
                "kind": "request_success",
                "duration_ms": clamp_u64(duration.as_millis())
            }),
            RequestOutcome::Failure { duration } => json!({
                "kind": "request_failure",
                "duration_ms": clamp_u64(duration.as_millis())
            }),
        },
    }
}

#[cfg(all(test, feature = "telemetry-json"))]
mod json_tests {
    use super::*;

    #[test]
    fn queue_retried_json() {
        let v = event_to_json(&PublishingEvent::Queue(QueueEvent::Retried {
            attempt: 3,
            delay: Duration::from_millis(150),
        }));
        assert_eq!(v["kind"], "queue_retried");
        assert_eq!(v["attempt"], 3);
        assert_eq!(v["delay_ms"], 150);
    }

    #[test]
    fn circuit_opened_json() {
        let v = event_to_json(&PublishingEvent::CircuitBreaker(CircuitBreakerEvent::Opened {
            failure_count: 4,
        }));
        assert_eq!(v["kind"], "circuit_opened");
        assert_eq!(v["failures"], 4);
    }

    #[test]
    fn dlq_written_json() {
        let v = event_to_json(&PublishingEvent::Dlq(DlqEvent::Written {
            target: "ops-webhook".into(),
            error_kind: ErrorKind::Permanent,
        }));
        assert_eq!(v["kind"], "dlq_written");
        assert_eq!(v["target"], "ops-webhook");
    }

    #[test]
    fn mode_transitioned_json() {
        let v = event_to_json(&PublishingEvent::Mode(ModeEvent::Transitioned {
            from: Mode::Normal,
            to: Mode::MetricsOnly,
        }));
        assert_eq!(v["kind"], "mode_transitioned");
    }

    #[test]
    fn request_success_json() {
        let v = event_to_json(&PublishingEvent::Request(RequestOutcome::Success {
            duration: Duration::from_millis(42),
        }));
        assert_eq!(v["kind"], "request_success");
        assert_eq!(v["duration_ms"], 42);
    }

    #[test]
    fn telemetry_json_contains_no_auth_fields() {
        let v = event_to_json(&PublishingEvent::Request(RequestOutcome::Success {
            duration: Duration::from_millis(1),
        }));
        let s = serde_json::to_string(&v).unwrap();
        assert!(!s.contains("auth"), "telemetry JSON should not carry auth payloads; got {s}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_event_display() {
        let event = QueueEvent::Retried { attempt: 2, delay: Duration::from_millis(100) };
        assert!(event.to_string().contains("Retried"));
        assert!(event.to_string().contains("#2"));
    }

    #[test]
    fn circuit_breaker_event_display() {
        let event = CircuitBreakerEvent::Opened { failure_count: 5 };
        assert!(event.to_string().contains("Opened"));
        assert!(event.to_string().contains('5'));
    }

    #[test]
    fn dlq_event_display() {
        let event = DlqEvent::Purged { count: 10 };
        assert!(event.to_string().contains("Purged"));
        assert!(event.to_string().contains("10"));
    }

    #[test]
    fn publishing_event_clone() {
        let event = PublishingEvent::Queue(QueueEvent::Retried {
            attempt: 1,
            delay: Duration::from_millis(50),
        });
        let cloned = event.clone();
        assert_eq!(event, cloned);
    }

    #[test]
    fn publishing_event_request_variants_display() {
        let ok = PublishingEvent::Request(RequestOutcome::Success { duration: Duration::from_millis(5) });
        let err = PublishingEvent::Request(RequestOutcome::Failure { duration: Duration::from_millis(7) });
        assert!(format!("{}", ok).contains("Success"));
        assert!(format!("{}", err).contains("Failure"));
    }
}
