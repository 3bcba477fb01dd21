//! Control plane primitives: command envelope, auth, history, router.
//!
//! This is a lightweight, transport-agnostic control plane. Transports populate
//! `CommandEnvelope` with an `AuthPayload`; the router dispatches to handlers
//! after auth. History storage is pluggable.

/// Authentication providers and payload verification.
pub mod auth;
/// Pre-built, dynamically-parsed config/store/breaker commands (`set`, `get`, `read_config`, ...).
pub mod builtin_commands;
/// Factory parsing [`builtin_commands`] from wire JSON.
pub mod builtin_factory;
/// Dynamic `Box<dyn Command>` abstraction used by wire-parsed transports.
pub mod command;
/// Core command handler traits and built-in command definitions.
pub mod handler;
/// Admin command surface for the publishing subsystem.
pub mod publishing;
/// Command router orchestration (auth -> handler -> audit/history).
pub mod router;
/// Transport abstractions.
pub mod transport;
/// Channel-based transport implementation.
pub mod transport_channel;
/// Shared control-plane data types.
pub mod types;

// Re-export everything for convenience and backward compatibility.
pub use auth::*;
pub use command::{Command, CommandFactory, CommandRegistry};
pub use handler::*;
pub use publishing::{PublishingCommand, PublishingCommandHandler};
pub use router::*;
pub use types::*;
