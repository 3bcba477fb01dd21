//! Minimal capability trait for a delivery sink (spec §9 design notes): enough surface
//! for dynamic dispatch over heterogeneous sink implementations, nothing more.

use serde_json::Value;

use crate::error::PublishingError;

#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Stable name used for logging, telemetry, and circuit breaker keying.
    fn name(&self) -> &str;

    /// Deliver an already-formatted payload.
    async fn publish(&self, payload: Value) -> Result<(), PublishingError>;
}
