//! Data model for the publishing subsystem: alerts, targets, jobs, and DLQ entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// `firing` or `resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

/// Severity carried by an alert label or a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Noise,
}

/// Machine-generated classification attached to an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub severity: Severity,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// A raw monitoring alert plus an optional machine-generated classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedAlert {
    pub fingerprint: String,
    pub alert_name: String,
    pub status: AlertStatus,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub starts_at: SystemTime,
    pub ends_at: Option<SystemTime>,
    pub generator_url: Option<String>,
    pub classification: Option<Classification>,
}

impl EnrichedAlert {
    /// Severity used for priority routing (classification wins over the label).
    pub fn effective_severity(&self) -> Option<Severity> {
        if let Some(c) = &self.classification {
            return Some(c.severity);
        }
        match self.labels.get("severity").map(String::as_str) {
            Some("critical") => Some(Severity::Critical),
            Some("warning") => Some(Severity::Warning),
            Some("info") => Some(Severity::Info),
            Some("noise") => Some(Severity::Noise),
            _ => None,
        }
    }
}

/// Immutable snapshot of a downstream sink, owned exclusively by the target directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingTarget {
    pub name: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub url: String,
    pub enabled: bool,
    pub format: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Priority bucket a job is routed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// §4.7: resolved or info/noise severity goes low; critical (classification, or
    /// label severity on a firing alert) goes high; everything else is medium.
    pub fn classify(alert: &EnrichedAlert) -> Priority {
        if alert.status == AlertStatus::Resolved {
            return Priority::Low;
        }
        let label_severity_critical = alert.labels.get("severity").map(String::as_str) == Some("critical");
        if label_severity_critical {
            return Priority::High;
        }
        match alert.effective_severity() {
            Some(Severity::Info) | Some(Severity::Noise) => Priority::Low,
            Some(Severity::Critical) => Priority::High,
            _ => Priority::Medium,
        }
    }
}

/// Lifecycle state of a `PublishingJob`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    Retrying,
    Succeeded,
    Failed,
    Dlq,
}

/// Classification of the last error seen by a job, mirrors §7's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    RateLimit,
    Timeout,
    Transient,
    Permanent,
    Unknown,
    CircuitOpen,
    Backpressure,
    Cancelled,
}

impl ErrorKind {
    /// Permanent classifications, and exhausted retries, are never retried further.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorKind::Permanent | ErrorKind::Validation | ErrorKind::Cancelled)
    }
}

/// Transient record owned by the queue for the lifetime of one delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct PublishingJob {
    pub id: String,
    pub alert: Arc<EnrichedAlert>,
    pub target: Arc<PublishingTarget>,
    pub priority: Priority,
    pub state: JobState,
    pub retry_count: u32,
    pub submitted_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub completed_at: Option<SystemTime>,
    pub last_error: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl PublishingJob {
    pub fn new(alert: Arc<EnrichedAlert>, target: Arc<PublishingTarget>) -> Self {
        let priority = Priority::classify(&alert);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            alert,
            target,
            priority,
            state: JobState::Queued,
            retry_count: 0,
            submitted_at: SystemTime::now(),
            started_at: None,
            completed_at: None,
            last_error: None,
            error_kind: None,
        }
    }
}

/// Durable record mirroring a terminal job, written once retries are exhausted or the
/// error is permanent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub id: String,
    pub job_id: String,
    pub fingerprint: String,
    pub target_name: String,
    pub target_type: String,
    pub enriched_alert: EnrichedAlert,
    pub target_config: PublishingTarget,
    pub error_message: String,
    pub error_type: ErrorKind,
    pub retry_count: u32,
    pub priority: Priority,
    pub failed_at: SystemTime,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub replayed: bool,
    pub replayed_at: Option<SystemTime>,
    pub replay_result: Option<String>,
    pub last_retry_at: Option<SystemTime>,
}

impl DlqEntry {
    pub fn from_job(job: &PublishingJob, error_message: String, error_type: ErrorKind) -> Self {
        let now = SystemTime::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job.id.clone(),
            fingerprint: job.alert.fingerprint.clone(),
            target_name: job.target.name.clone(),
            target_type: job.target.target_type.clone(),
            enriched_alert: (*job.alert).clone(),
            target_config: (*job.target).clone(),
            error_message,
            error_type,
            retry_count: job.retry_count,
            priority: job.priority,
            failed_at: now,
            created_at: now,
            updated_at: now,
            replayed: false,
            replayed_at: None,
            replay_result: None,
            last_retry_at: job.started_at,
        }
    }
}

/// Process-wide publishing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Normal,
    MetricsOnly,
}

/// Outcome of a single target submission, as reported by the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct PublishingResult {
    pub target: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Filter-driven SELECT interface touched only at the boundary (§6); no SQL implementation
/// ships here, the repository is owned by an adjacent module.
#[derive(Debug, Clone, Default)]
pub struct SilenceFilter {
    pub matcher_name: Option<String>,
    pub matcher_value: Option<String>,
    pub sort_by: Option<SilenceSortField>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceSortField {
    CreatedAt,
    StartsAt,
    EndsAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Silence {
    pub id: String,
    pub created_by: String,
    pub comment: String,
    pub starts_at: SystemTime,
    pub ends_at: SystemTime,
    pub matchers: serde_json::Value,
    pub status: String,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(status: AlertStatus, severity: Option<Severity>) -> EnrichedAlert {
        let mut labels = HashMap::new();
        if let Some(s) = severity {
            let s = match s {
                Severity::Critical => "critical",
                Severity::Warning => "warning",
                Severity::Info => "info",
                Severity::Noise => "noise",
            };
            labels.insert("severity".to_string(), s.to_string());
        }
        EnrichedAlert {
            fingerprint: "abc123abc123abcd".into(),
            alert_name: "HighCPU".into(),
            status,
            labels,
            annotations: HashMap::new(),
            starts_at: SystemTime::now(),
            ends_at: None,
            generator_url: None,
            classification: None,
        }
    }

    #[test]
    fn resolved_alerts_are_always_low_priority() {
        let a = alert(AlertStatus::Resolved, Some(Severity::Critical));
        assert_eq!(Priority::classify(&a), Priority::Low);
    }

    #[test]
    fn firing_critical_label_is_high_priority() {
        let a = alert(AlertStatus::Firing, Some(Severity::Critical));
        assert_eq!(Priority::classify(&a), Priority::High);
    }

    #[test]
    fn firing_with_no_severity_is_medium() {
        let a = alert(AlertStatus::Firing, None);
        assert_eq!(Priority::classify(&a), Priority::Medium);
    }

    #[test]
    fn firing_info_severity_is_low() {
        let a = alert(AlertStatus::Firing, Some(Severity::Info));
        assert_eq!(Priority::classify(&a), Priority::Low);
    }

    #[test]
    fn classification_severity_wins_over_label() {
        let mut a = alert(AlertStatus::Firing, Some(Severity::Warning));
        a.classification = Some(Classification {
            severity: Severity::Critical,
            confidence: 0.9,
            reasoning: "spike".into(),
            recommendations: vec![],
        });
        assert_eq!(Priority::classify(&a), Priority::High);
    }

    #[test]
    fn label_critical_wins_high_even_when_classification_is_lower() {
        let mut a = alert(AlertStatus::Firing, Some(Severity::Critical));
        a.classification = Some(Classification {
            severity: Severity::Warning,
            confidence: 0.4,
            reasoning: "ambiguous".into(),
            recommendations: vec![],
        });
        assert_eq!(Priority::classify(&a), Priority::High);
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!ErrorKind::Permanent.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(ErrorKind::Transient.is_retryable());
        assert!(ErrorKind::Unknown.is_retryable());
    }
}
