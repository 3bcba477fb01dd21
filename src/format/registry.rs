//! Format registry (spec §4.6): named, reference-counted checkout of formatter
//! implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::formatters::Formatter;
use crate::error::PublishingError;

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    !name.is_empty() && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

struct Entry {
    formatter: Arc<dyn Formatter>,
    refcount: Arc<AtomicUsize>,
}

/// Checked-out handle to a registered formatter. Dropping it releases the reference.
#[derive(Clone)]
pub struct FormatterHandle {
    formatter: Arc<dyn Formatter>,
    refcount: Arc<AtomicUsize>,
}

impl FormatterHandle {
    pub fn formatter(&self) -> &dyn Formatter {
        self.formatter.as_ref()
    }
}

impl Drop for FormatterHandle {
    fn drop(&mut self) {
        self.refcount.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Registry of named formatters. Unregistering while any handle is checked out is
/// refused to avoid pulling a formatter out from under an in-flight publish.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, formatter: Arc<dyn Formatter>) -> Result<(), PublishingError> {
        if !is_valid_name(name) {
            return Err(PublishingError::Format(format!(
                "invalid formatter name `{name}`: must match ^[a-z][a-z0-9_-]*$"
            )));
        }
        self.inner.lock().insert(
            name.to_string(),
            Entry { formatter, refcount: Arc::new(AtomicUsize::new(0)) },
        );
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Result<(), PublishingError> {
        let mut guard = self.inner.lock();
        match guard.get(name) {
            Some(entry) if entry.refcount.load(Ordering::Acquire) > 0 => Err(PublishingError::Format(
                format!("formatter `{name}` is checked out and cannot be unregistered"),
            )),
            Some(_) => {
                guard.remove(name);
                Ok(())
            }
            None => Err(PublishingError::Format(format!("no formatter registered as `{name}`"))),
        }
    }

    /// Check out a handle to the named formatter, incrementing its refcount.
    pub fn checkout(&self, name: &str) -> Result<FormatterHandle, PublishingError> {
        let guard = self.inner.lock();
        match guard.get(name) {
            Some(entry) => {
                entry.refcount.fetch_add(1, Ordering::AcqRel);
                Ok(FormatterHandle { formatter: entry.formatter.clone(), refcount: entry.refcount.clone() })
            }
            None => Err(PublishingError::Format(format!("no formatter registered as `{name}`"))),
        }
    }

    /// Sorted list of registered formatter names.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::formatters::GenericWebhookFormatter;

    #[test]
    fn rejects_invalid_names() {
        let reg = FormatRegistry::new();
        assert!(reg.register("Bad-Name", Arc::new(GenericWebhookFormatter)).is_err());
        assert!(reg.register("", Arc::new(GenericWebhookFormatter)).is_err());
    }

    #[test]
    fn checkout_increments_and_drop_decrements_refcount() {
        let reg = FormatRegistry::new();
        reg.register("webhook", Arc::new(GenericWebhookFormatter)).unwrap();
        let handle = reg.checkout("webhook").unwrap();
        assert!(reg.unregister("webhook").is_err(), "checked out, cannot unregister");
        drop(handle);
        assert!(reg.unregister("webhook").is_ok());
    }

    #[test]
    fn list_is_sorted() {
        let reg = FormatRegistry::new();
        reg.register("zeta", Arc::new(GenericWebhookFormatter)).unwrap();
        reg.register("alpha", Arc::new(GenericWebhookFormatter)).unwrap();
        assert_eq!(reg.list(), vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn unregister_unknown_errors() {
        let reg = FormatRegistry::new();
        assert!(reg.unregister("ghost").is_err());
    }
}
