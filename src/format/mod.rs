//! Format registry and built-in formatters (spec §4.6).

pub mod formatters;
pub mod registry;

pub use formatters::{
    AlertmanagerFormatter, ChatBlocksFormatter, Formatter, GenericWebhookFormatter,
    IncidentPlatformFormatter, PagingEventsFormatter,
};
pub use registry::{FormatRegistry, FormatterHandle};

use std::sync::Arc;

/// A registry pre-populated with the five built-in formatters, ready for use.
pub fn default_registry() -> FormatRegistry {
    let registry = FormatRegistry::new();
    registry.register("alertmanager", Arc::new(AlertmanagerFormatter)).expect("valid name");
    registry.register("incident", Arc::new(IncidentPlatformFormatter)).expect("valid name");
    registry.register("paging", Arc::new(PagingEventsFormatter)).expect("valid name");
    registry.register("chat", Arc::new(ChatBlocksFormatter)).expect("valid name");
    registry.register("webhook", Arc::new(GenericWebhookFormatter)).expect("valid name");
    registry
}
