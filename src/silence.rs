//! Silence repository (spec §6): a filter-driven read interface for an adjacent module's
//! table, included here only as a trait boundary because the publishing core touches it
//! (a silenced alert is still evaluated by a caller upstream of this crate) — no SQL
//! implementation ships in this crate, per `SPEC_FULL.md`'s decision on this point.
//!
//! The real backend (JSONB-matcher queries, parameter binding, sort-field allowlisting)
//! is owned by the alert-history service this subsystem is embedded in; an
//! [`InMemorySilenceRepository`] is provided only so this crate's own tests can exercise
//! the boundary without depending on that service.

use crate::model::{Silence, SilenceFilter, SilenceSortField};

#[async_trait::async_trait]
pub trait SilenceRepository: Send + Sync {
    async fn list(&self, filter: SilenceFilter) -> Result<Vec<Silence>, String>;
}

const MAX_PAGE_SIZE: u32 = 1000;
const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Clone, Default)]
pub struct InMemorySilenceRepository {
    silences: std::sync::Arc<parking_lot::Mutex<Vec<Silence>>>,
}

impl InMemorySilenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, silence: Silence) {
        self.silences.lock().push(silence);
    }
}

#[async_trait::async_trait]
impl SilenceRepository for InMemorySilenceRepository {
    async fn list(&self, filter: SilenceFilter) -> Result<Vec<Silence>, String> {
        let guard = self.silences.lock();
        let mut matched: Vec<Silence> = guard
            .iter()
            .filter(|s| {
                filter.matcher_name.as_deref().map_or(true, |name| {
                    s.matchers
                        .as_array()
                        .map(|matchers| matchers.iter().any(|m| m.get("name").and_then(|v| v.as_str()) == Some(name)))
                        .unwrap_or(false)
                })
            })
            .filter(|s| {
                filter.matcher_value.as_deref().map_or(true, |value| {
                    s.matchers
                        .as_array()
                        .map(|matchers| matchers.iter().any(|m| m.get("value").and_then(|v| v.as_str()) == Some(value)))
                        .unwrap_or(false)
                })
            })
            .cloned()
            .collect();

        match filter.sort_by.unwrap_or(SilenceSortField::CreatedAt) {
            SilenceSortField::CreatedAt => matched.sort_by_key(|s| s.created_at),
            SilenceSortField::StartsAt => matched.sort_by_key(|s| s.starts_at),
            SilenceSortField::EndsAt => matched.sort_by_key(|s| s.ends_at),
            SilenceSortField::UpdatedAt => matched.sort_by_key(|s| s.updated_at),
        }

        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE) as usize;
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn silence(id: &str, matcher_name: &str, created_at: SystemTime) -> Silence {
        Silence {
            id: id.into(),
            created_by: "operator".into(),
            comment: "maintenance window".into(),
            starts_at: created_at,
            ends_at: created_at + Duration::from_secs(3600),
            matchers: serde_json::json!([{"name": matcher_name, "value": "prod"}]),
            status: "active".into(),
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn list_with_no_filter_returns_everything() {
        let repo = InMemorySilenceRepository::new();
        repo.insert(silence("s1", "env", SystemTime::now()));
        repo.insert(silence("s2", "service", SystemTime::now()));
        let all = repo.list(SilenceFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn filters_by_matcher_name() {
        let repo = InMemorySilenceRepository::new();
        repo.insert(silence("s1", "env", SystemTime::now()));
        repo.insert(silence("s2", "service", SystemTime::now()));
        let filter = SilenceFilter { matcher_name: Some("service".into()), ..Default::default() };
        let found = repo.list(filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "s2");
    }

    #[tokio::test]
    async fn pagination_defaults_to_100_and_caps_at_1000() {
        let repo = InMemorySilenceRepository::new();
        for i in 0..5 {
            repo.insert(silence(&format!("s{i}"), "env", SystemTime::now()));
        }
        let capped = repo.list(SilenceFilter { limit: Some(10_000), ..Default::default() }).await.unwrap();
        assert_eq!(capped.len(), 5);

        let limited = repo.list(SilenceFilter { limit: Some(2), ..Default::default() }).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn offset_skips_entries() {
        let repo = InMemorySilenceRepository::new();
        repo.insert(silence("s1", "env", SystemTime::now()));
        repo.insert(silence("s2", "env", SystemTime::now()));
        let filter = SilenceFilter { offset: Some(1), ..Default::default() };
        let found = repo.list(filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "s2");
    }
}
