//! Top-level error taxonomy for the publishing subsystem (spec §7).

use std::time::Duration;

use crate::model::{ErrorKind, Priority};

/// Per-field structural violation produced by the alert validator.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{field}: {message}")]
pub struct Violation {
    pub field: String,
    pub message: String,
    pub offending_value: Option<String>,
    pub remediation: Option<String>,
}

/// Unified error type surfaced to callers and telemetry.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PublishingError {
    /// Structural validation failures; never retried.
    #[error("validation failed: {0:?}")]
    Validation(Vec<Violation>),

    /// Token-bucket rejection; not retried by the middleware.
    #[error("rate limited")]
    RateLimit,

    /// A downstream step exceeded its allotted duration.
    #[error("timeout after {elapsed:?} (limit {limit:?})")]
    Timeout { elapsed: Duration, limit: Duration },

    /// Network/server-side recoverable error.
    #[error("transient: {0}")]
    Transient(String),

    /// Client-side invariant violation; not retried.
    #[error("permanent: {0}")]
    Permanent(String),

    /// Uninterpretable error; treated as transient for retry purposes.
    #[error("unknown error: {0}")]
    Unknown(String),

    /// The target's circuit breaker is open.
    #[error("circuit open for target {target}")]
    CircuitOpen { target: String },

    /// The target priority bucket is full.
    #[error("backpressure: {bucket:?} bucket full")]
    Backpressure { bucket: Priority },

    /// The operation was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Format registry / formatter-level error.
    #[error("format error: {0}")]
    Format(String),

    /// Unknown publishing target name.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// The remote resource this operation addressed (e.g. an incident id) doesn't exist,
    /// distinct from the general `Permanent` bucket so callers that need to tell "gone"
    /// apart from other 4xx/5xx failures (spec §4.12's incident lifecycle) can.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote resource is in a state that conflicts with this operation (e.g. an
    /// incident already closed out-of-band), distinct from `Permanent` for the same reason
    /// as `NotFound`.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl PublishingError {
    /// Map this error onto the §7 taxonomy kind used by telemetry and retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishingError::Validation(_) => ErrorKind::Validation,
            PublishingError::RateLimit => ErrorKind::RateLimit,
            PublishingError::Timeout { .. } => ErrorKind::Timeout,
            PublishingError::Transient(_) => ErrorKind::Transient,
            PublishingError::Permanent(_) => ErrorKind::Permanent,
            PublishingError::Unknown(_) => ErrorKind::Unknown,
            PublishingError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            PublishingError::Backpressure { .. } => ErrorKind::Backpressure,
            PublishingError::Cancelled => ErrorKind::Cancelled,
            PublishingError::Format(_) => ErrorKind::Permanent,
            PublishingError::UnknownTarget(_) => ErrorKind::Permanent,
            PublishingError::NotFound(_) => ErrorKind::Permanent,
            PublishingError::Conflict(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
