//! Error classifier (spec §4.1): maps any error into transient / permanent / unknown.

use crate::model::ErrorKind;

/// Something that can be asked for an HTTP status code, if it carries one.
pub trait HasStatusCode {
    fn status_code(&self) -> Option<u16>;
}

impl HasStatusCode for u16 {
    fn status_code(&self) -> Option<u16> {
        Some(*self)
    }
}

/// Classify an HTTP status code per the §4.1 bucket table.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        408 | 429 | 502 | 503 | 504 => ErrorKind::Transient,
        400 | 401 | 403 | 404 | 405 | 409 | 410 | 422 => ErrorKind::Permanent,
        500..=599 => ErrorKind::Permanent,
        _ => ErrorKind::Unknown,
    }
}

/// Network-level conditions that are always transient regardless of status code.
fn message_is_network_transient(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("temporary")
        || lower.contains("dns")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("connection timed out")
}

/// Scan a free-form error message for an embedded decimal status code, falling back to
/// the same bucket table used for a typed status.
fn classify_message(msg: &str) -> ErrorKind {
    if message_is_network_transient(msg) {
        return ErrorKind::Transient;
    }
    for token in msg.split(|c: char| !c.is_ascii_digit()) {
        if token.len() == 3 {
            if let Ok(code) = token.parse::<u16>() {
                if (100..=599).contains(&code) {
                    let kind = classify_status(code);
                    if kind != ErrorKind::Unknown {
                        return kind;
                    }
                }
            }
        }
    }
    ErrorKind::Unknown
}

/// Classify an error of any shape: an explicit status code wins, otherwise the message
/// is scanned. `None`/empty input classifies as `Unknown`.
pub fn classify<E: std::fmt::Display>(status: Option<u16>, err: Option<&E>) -> ErrorKind {
    if let Some(status) = status {
        return classify_status(status);
    }
    match err {
        Some(e) => classify_message(&e.to_string()),
        None => ErrorKind::Unknown,
    }
}
