//! Alert validator (spec §4.5): an ordered rule list that accumulates every violation
//! rather than bailing out on the first one.

use std::time::{Duration, SystemTime};

use crate::error::Violation;
use crate::model::{AlertStatus, EnrichedAlert};

const MAX_PAST: Duration = Duration::from_secs(365 * 24 * 60 * 60);
const MAX_FUTURE: Duration = Duration::from_secs(60 * 60);

fn violation(field: &str, message: impl Into<String>, value: Option<String>, hint: &str) -> Violation {
    Violation {
        field: field.to_string(),
        message: message.into(),
        offending_value: value,
        remediation: Some(hint.to_string()),
    }
}

fn is_alert_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_fingerprint(s: &str) -> bool {
    s.len() >= 16 && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

fn is_label_key(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_parseable_url(s: &str) -> bool {
    match s.split_once("://") {
        Some((scheme, rest)) => !scheme.is_empty() && !rest.is_empty(),
        None => false,
    }
}

/// Runs every rule against `alert`, returning every violation found (possibly empty).
pub fn validate(alert: &EnrichedAlert) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !is_alert_name(&alert.alert_name) {
        violations.push(violation(
            "alertName",
            "must start with an uppercase letter and contain only letters, digits, `_`, or `-`",
            Some(alert.alert_name.clone()),
            "rename the alert to match ^[A-Z][A-Za-z0-9_-]+$",
        ));
    }

    if !is_fingerprint(&alert.fingerprint) {
        violations.push(violation(
            "fingerprint",
            "must be at least 16 lowercase hex characters",
            Some(alert.fingerprint.clone()),
            "ensure the upstream source emits a stable hex fingerprint",
        ));
    }

    let now = SystemTime::now();
    match now.duration_since(alert.starts_at) {
        Ok(age) if age > MAX_PAST => violations.push(violation(
            "startsAt",
            "is more than one year in the past",
            None,
            "check the upstream clock or drop stale alerts before ingestion",
        )),
        Err(e) if e.duration() > MAX_FUTURE => violations.push(violation(
            "startsAt",
            "is more than one hour in the future",
            None,
            "check the upstream clock",
        )),
        _ => {}
    }

    if let Some(ends_at) = alert.ends_at {
        if ends_at <= alert.starts_at {
            violations.push(violation(
                "endsAt",
                "must be strictly after startsAt",
                None,
                "fix the resolution timestamp emitted by the source",
            ));
        }
    }

    for (key, _) in alert.labels.iter() {
        if !is_label_key(key) {
            violations.push(violation(
                "labels",
                format!("key `{key}` must match ^[A-Za-z_][A-Za-z0-9_]*$"),
                Some(key.clone()),
                "sanitize label keys at the source before enrichment",
            ));
        }
    }
    for (key, _) in alert.annotations.iter() {
        if !is_label_key(key) {
            violations.push(violation(
                "annotations",
                format!("key `{key}` must match ^[A-Za-z_][A-Za-z0-9_]*$"),
                Some(key.clone()),
                "sanitize annotation keys at the source before enrichment",
            ));
        }
    }

    if let Some(url) = &alert.generator_url {
        if !is_parseable_url(url) {
            violations.push(violation(
                "generatorURL",
                "must be a parseable URL with a scheme",
                Some(url.clone()),
                "drop generatorURL or provide a fully qualified URL",
            ));
        }
    }

    if let Some(classification) = &alert.classification {
        if !(0.0..=1.0).contains(&classification.confidence) {
            violations.push(violation(
                "classification.confidence",
                "must be within [0, 1]",
                Some(classification.confidence.to_string()),
                "clamp the classifier's confidence output before enrichment",
            ));
        }
        if classification.confidence > 0.0 && classification.reasoning.trim().is_empty() {
            violations.push(violation(
                "classification.reasoning",
                "must be non-empty when confidence is greater than zero",
                None,
                "have the classifier emit reasoning alongside any non-zero confidence",
            ));
        }
    }

    // `status` is `AlertStatus`, an enum of exactly {firing, resolved}, so the §4.5
    // "status in {firing,resolved}" rule is enforced by the type and needs no runtime check.

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classification, Severity};
    use std::collections::HashMap;
    use std::time::Duration;

    fn base_alert() -> EnrichedAlert {
        EnrichedAlert {
            fingerprint: "abcdef0123456789".into(),
            alert_name: "HighCPUUsage".into(),
            status: AlertStatus::Firing,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            starts_at: SystemTime::now(),
            ends_at: None,
            generator_url: None,
            classification: None,
        }
    }

    #[test]
    fn valid_alert_has_no_violations() {
        assert!(validate(&base_alert()).is_empty());
    }

    #[test]
    fn bad_alert_name_is_flagged() {
        let mut a = base_alert();
        a.alert_name = "high cpu!".into();
        let v = validate(&a);
        assert!(v.iter().any(|x| x.field == "alertName"));
    }

    #[test]
    fn short_fingerprint_is_flagged() {
        let mut a = base_alert();
        a.fingerprint = "abc".into();
        let v = validate(&a);
        assert!(v.iter().any(|x| x.field == "fingerprint"));
    }

    #[test]
    fn ends_at_before_starts_at_is_flagged() {
        let mut a = base_alert();
        a.ends_at = Some(a.starts_at - Duration::from_secs(60));
        let v = validate(&a);
        assert!(v.iter().any(|x| x.field == "endsAt"));
    }

    #[test]
    fn starts_at_too_far_in_past_is_flagged() {
        let mut a = base_alert();
        a.starts_at = SystemTime::now() - Duration::from_secs(400 * 24 * 60 * 60);
        let v = validate(&a);
        assert!(v.iter().any(|x| x.field == "startsAt"));
    }

    #[test]
    fn bad_label_key_is_flagged() {
        let mut a = base_alert();
        a.labels.insert("1bad-key".into(), "x".into());
        let v = validate(&a);
        assert!(v.iter().any(|x| x.field == "labels"));
    }

    #[test]
    fn unparseable_generator_url_is_flagged() {
        let mut a = base_alert();
        a.generator_url = Some("not a url".into());
        let v = validate(&a);
        assert!(v.iter().any(|x| x.field == "generatorURL"));
    }

    #[test]
    fn confidence_out_of_range_is_flagged() {
        let mut a = base_alert();
        a.classification = Some(Classification {
            severity: Severity::Critical,
            confidence: 1.5,
            reasoning: "x".into(),
            recommendations: vec![],
        });
        let v = validate(&a);
        assert!(v.iter().any(|x| x.field == "classification.confidence"));
    }

    #[test]
    fn nonzero_confidence_requires_reasoning() {
        let mut a = base_alert();
        a.classification = Some(Classification {
            severity: Severity::Critical,
            confidence: 0.8,
            reasoning: "   ".into(),
            recommendations: vec![],
        });
        let v = validate(&a);
        assert!(v.iter().any(|x| x.field == "classification.reasoning"));
    }

    #[test]
    fn multiple_violations_all_accumulate() {
        let mut a = base_alert();
        a.alert_name = "bad name".into();
        a.fingerprint = "x".into();
        let v = validate(&a);
        assert!(v.len() >= 2);
    }
}
