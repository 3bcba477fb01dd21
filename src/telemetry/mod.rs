//! Telemetry and observability for the publishing subsystem.
//!
//! This module provides the event system that lets every pipeline stage emit
//! structured telemetry. Events flow through `TelemetrySink` implementations
//! which can log, aggregate, or forward events to external systems.
//!
//! # Event Types
//!
//! - **Queue**: `Submitted`, `Retried`, `Rejected`
//! - **Circuit Breaker**: `Opened`, `HalfOpen`, `Closed`
//! - **Dlq**: `Written`, `Replayed`, `Purged`
//! - **Mode**: `Transitioned`
//! - **Timeout**: `Occurred`
//! - **Every stage**: `Request::Success`, `Request::Failure`
//!
//! # Telemetry Sinks
//!
//! The `TelemetrySink` trait defines how events are consumed.

pub mod events;
pub mod sinks;

pub use events::{
    CircuitBreakerEvent, DlqEvent, ModeEvent, PublishingEvent, QueueEvent, RequestOutcome,
    TimeoutEvent,
};
pub use sinks::{
    emit_best_effort, ComposedSinkError, FallbackSink, LogSink, MemorySink, MulticastSink,
    NonBlockingSink, NullSink, StreamingSink, TelemetrySink,
};

#[cfg(test)]
mod tests {
    // Note: Tests have been moved to submodules (events.rs and sinks.rs)
}