//! Convenient re-exports for the publishing subsystem's commonly used types.
pub use crate::{
    adaptive::Adaptive,
    cache::TtlLruCache,
    circuit_breaker::{CircuitBreakerConfig, CircuitState},
    circuit_breaker_registry::CircuitBreakerRegistry,
    config::PublishingConfig,
    control::{
        AuthMode, AuthPayload, AuthProvider, AuthRegistry, CommandEnvelope, CommandMeta,
        CommandRouter, PublishingCommand, PublishingCommandHandler,
    },
    coordinator::PublishingCoordinator,
    dlq::{DeadLetterStore, DlqEntry, DlqFilter, InMemoryDeadLetterStore},
    error::{PublishingError, Violation},
    format::{default_registry, FormatRegistry},
    mode::ModeManager,
    model::{EnrichedAlert, ErrorKind, Mode, Priority, PublishingJob, PublishingResult, PublishingTarget},
    queue::{PublishingQueue, QueueConfig},
    silence::{InMemorySilenceRepository, SilenceRepository},
    target_directory::{InMemoryTargetDirectory, RefreshManager, TargetDirectory},
    telemetry::{LogSink, MemorySink, NonBlockingSink, TelemetrySink},
};
