//! Built-in formatters (spec §4.6): each turns an enriched alert into the wire shape a
//! given sink type expects.

use serde_json::{json, Value};

use crate::error::PublishingError;
use crate::model::{AlertStatus, EnrichedAlert, Severity};

/// Converts an alert into a sink-specific JSON payload.
pub trait Formatter: Send + Sync {
    fn format(&self, alert: &EnrichedAlert) -> Result<Value, PublishingError>;
}

fn severity_str(s: Severity) -> &'static str {
    match s {
        Severity::Critical => "critical",
        Severity::Warning => "warning",
        Severity::Info => "info",
        Severity::Noise => "noise",
    }
}

fn status_str(s: AlertStatus) -> &'static str {
    match s {
        AlertStatus::Firing => "firing",
        AlertStatus::Resolved => "resolved",
    }
}

fn rfc3339(t: std::time::SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339()
}

/// Alertmanager-compatible webhook payload.
pub struct AlertmanagerFormatter;

impl Formatter for AlertmanagerFormatter {
    fn format(&self, alert: &EnrichedAlert) -> Result<Value, PublishingError> {
        Ok(json!({
            "version": "4",
            "status": status_str(alert.status),
            "alerts": [{
                "status": status_str(alert.status),
                "labels": alert.labels,
                "annotations": alert.annotations,
                "startsAt": rfc3339(alert.starts_at),
                "endsAt": alert.ends_at.map(rfc3339),
                "generatorURL": alert.generator_url,
                "fingerprint": alert.fingerprint,
            }],
        }))
    }
}

/// Incident-management platform payload (PagerDuty/Opsgenie-style incident create).
pub struct IncidentPlatformFormatter;

impl Formatter for IncidentPlatformFormatter {
    fn format(&self, alert: &EnrichedAlert) -> Result<Value, PublishingError> {
        let severity = alert.effective_severity().map(severity_str).unwrap_or("warning");
        Ok(json!({
            "title": alert.alert_name,
            "description": alert.annotations.get("description").cloned().unwrap_or_default(),
            "severity": severity,
            "started_at": rfc3339(alert.starts_at),
            "tags": alert.labels,
            "custom_fields": {
                "fingerprint": alert.fingerprint,
                "classification": alert.classification.as_ref().map(|c| severity_str(c.severity)),
            },
        }))
    }
}

/// PagerDuty Events v2 style paging payload.
pub struct PagingEventsFormatter;

impl Formatter for PagingEventsFormatter {
    fn format(&self, alert: &EnrichedAlert) -> Result<Value, PublishingError> {
        let event_action = match alert.status {
            AlertStatus::Firing => "trigger",
            AlertStatus::Resolved => "resolve",
        };
        Ok(json!({
            "routing_key": "__configured_by_target__",
            "dedup_key": alert.fingerprint,
            "event_action": event_action,
            "payload": {
                "summary": alert.alert_name,
                "severity": alert.effective_severity().map(severity_str).unwrap_or("warning"),
                "source": alert.labels.get("instance").cloned().unwrap_or_else(|| "unknown".into()),
                "custom_details": alert.annotations,
            },
        }))
    }
}

/// Chat-platform block/attachment payload (Slack-style).
pub struct ChatBlocksFormatter;

impl Formatter for ChatBlocksFormatter {
    fn format(&self, alert: &EnrichedAlert) -> Result<Value, PublishingError> {
        let color = match alert.effective_severity() {
            Some(Severity::Critical) => "#d93025",
            Some(Severity::Warning) => "#f9ab00",
            Some(Severity::Info) => "#1a73e8",
            _ => "#9aa0a6",
        };
        Ok(json!({
            "blocks": [{
                "type": "header",
                "text": { "type": "plain_text", "text": alert.alert_name },
            }, {
                "type": "section",
                "text": { "type": "mrkdwn", "text": alert.annotations.get("summary").cloned().unwrap_or_default() },
            }],
            "attachments": [{
                "color": color,
                "fields": alert.labels,
            }],
        }))
    }
}

/// Passthrough formatter for generic webhook sinks with no fixed schema.
pub struct GenericWebhookFormatter;

impl Formatter for GenericWebhookFormatter {
    fn format(&self, alert: &EnrichedAlert) -> Result<Value, PublishingError> {
        serde_json::to_value(alert).map_err(|e| PublishingError::Format(e.to_string()))
    }
}
