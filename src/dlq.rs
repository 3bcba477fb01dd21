//! Dead-letter store (spec §4.8): interface only. The spec scopes persistence out, so the
//! only implementation shipped here is an in-memory one; a durable backend plugs in behind
//! the same trait.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::Serialize;

use crate::model::{DlqEntry, ErrorKind, Priority};

#[derive(Debug, Clone, Default)]
pub struct DlqFilter {
    pub target_name: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub priority: Option<Priority>,
    pub replayed: Option<bool>,
    pub failed_after: Option<SystemTime>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DlqStats {
    pub total: u64,
    pub replayed: u64,
    pub pending: u64,
}

#[async_trait::async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn write(&self, entry: DlqEntry) -> Result<(), String>;
    async fn read(&self, filter: DlqFilter) -> Result<Vec<DlqEntry>, String>;
    /// Fetch a single entry by id without mutating it, so a caller can rebuild a job
    /// from it before deciding whether the replay actually succeeded.
    async fn get(&self, id: &str) -> Result<DlqEntry, String>;
    /// Record that `id` was replayed, with the outcome of resubmission (e.g. `"queued"`
    /// or an error string). Only called once resubmission to the queue is known to have
    /// succeeded or failed — marking happens after the fact, not speculatively.
    async fn mark_replayed(&self, id: &str, result: String) -> Result<DlqEntry, String>;
    async fn purge(&self, older_than: SystemTime) -> Result<u64, String>;
    async fn stats(&self) -> DlqStats;
}

const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Clone, Default)]
pub struct InMemoryDeadLetterStore {
    entries: Arc<Mutex<Vec<DlqEntry>>>,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn write(&self, entry: DlqEntry) -> Result<(), String> {
        self.entries.lock().push(entry);
        Ok(())
    }

    async fn read(&self, filter: DlqFilter) -> Result<Vec<DlqEntry>, String> {
        let guard = self.entries.lock();
        let mut matched: Vec<DlqEntry> = guard
            .iter()
            .filter(|e| filter.target_name.as_deref().map_or(true, |n| n == e.target_name))
            .filter(|e| filter.error_kind.map_or(true, |k| k == e.error_type))
            .filter(|e| filter.priority.map_or(true, |p| p == e.priority))
            .filter(|e| filter.replayed.map_or(true, |r| r == e.replayed))
            .filter(|e| filter.failed_after.map_or(true, |t| e.failed_at >= t))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));

        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE) as usize;
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn get(&self, id: &str) -> Result<DlqEntry, String> {
        let guard = self.entries.lock();
        guard.iter().find(|e| e.id == id).cloned().ok_or_else(|| format!("no DLQ entry {id}"))
    }

    async fn mark_replayed(&self, id: &str, result: String) -> Result<DlqEntry, String> {
        let mut guard = self.entries.lock();
        let entry = guard.iter_mut().find(|e| e.id == id).ok_or_else(|| format!("no DLQ entry {id}"))?;
        entry.replayed = true;
        entry.replayed_at = Some(SystemTime::now());
        entry.replay_result = Some(result);
        Ok(entry.clone())
    }

    async fn purge(&self, older_than: SystemTime) -> Result<u64, String> {
        let mut guard = self.entries.lock();
        let before = guard.len();
        guard.retain(|e| e.failed_at >= older_than);
        Ok((before - guard.len()) as u64)
    }

    async fn stats(&self) -> DlqStats {
        let guard = self.entries.lock();
        let total = guard.len() as u64;
        let replayed = guard.iter().filter(|e| e.replayed).count() as u64;
        DlqStats { total, replayed, pending: total - replayed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertStatus, EnrichedAlert, PublishingJob, PublishingTarget};
    use std::collections::HashMap;

    fn job() -> PublishingJob {
        let alert = Arc::new(EnrichedAlert {
            fingerprint: "abcdef0123456789".into(),
            alert_name: "HighCPUUsage".into(),
            status: AlertStatus::Firing,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            starts_at: SystemTime::now(),
            ends_at: None,
            generator_url: None,
            classification: None,
        });
        let target = Arc::new(PublishingTarget {
            name: "ops-webhook".into(),
            target_type: "webhook".into(),
            url: "https://example.invalid".into(),
            enabled: true,
            format: "webhook".into(),
            headers: HashMap::new(),
        });
        PublishingJob::new(alert, target)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = InMemoryDeadLetterStore::new();
        let entry = DlqEntry::from_job(&job(), "boom".into(), ErrorKind::Permanent);
        store.write(entry.clone()).await.unwrap();
        let found = store.read(DlqFilter::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, entry.id);
    }

    #[tokio::test]
    async fn filter_by_target_name() {
        let store = InMemoryDeadLetterStore::new();
        store.write(DlqEntry::from_job(&job(), "a".into(), ErrorKind::Permanent)).await.unwrap();
        let filter = DlqFilter { target_name: Some("no-such-target".into()), ..Default::default() };
        assert!(store.read(filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_replayed_records_entry_and_outcome() {
        let store = InMemoryDeadLetterStore::new();
        let entry = DlqEntry::from_job(&job(), "a".into(), ErrorKind::Permanent);
        store.write(entry.clone()).await.unwrap();
        let replayed = store.mark_replayed(&entry.id, "queued".into()).await.unwrap();
        assert!(replayed.replayed);
        assert_eq!(replayed.replay_result.as_deref(), Some("queued"));
        assert_eq!(store.stats().await.replayed, 1);
    }

    #[tokio::test]
    async fn get_returns_entry_without_mutating_it() {
        let store = InMemoryDeadLetterStore::new();
        let entry = DlqEntry::from_job(&job(), "a".into(), ErrorKind::Permanent);
        store.write(entry.clone()).await.unwrap();
        let found = store.get(&entry.id).await.unwrap();
        assert!(!found.replayed);
        assert_eq!(store.stats().await.pending, 1);
    }

    #[tokio::test]
    async fn mark_replayed_unknown_id_errors() {
        let store = InMemoryDeadLetterStore::new();
        assert!(store.mark_replayed("ghost", "queued".into()).await.is_err());
    }

    #[tokio::test]
    async fn purge_removes_entries_older_than_cutoff() {
        let store = InMemoryDeadLetterStore::new();
        store.write(DlqEntry::from_job(&job(), "a".into(), ErrorKind::Permanent)).await.unwrap();
        let removed = store.purge(SystemTime::now() + std::time::Duration::from_secs(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.stats().await.total, 0);
    }

    #[tokio::test]
    async fn pagination_limit_is_capped() {
        let store = InMemoryDeadLetterStore::new();
        for _ in 0..5 {
            store.write(DlqEntry::from_job(&job(), "a".into(), ErrorKind::Permanent)).await.unwrap();
        }
        let filter = DlqFilter { limit: Some(2), ..Default::default() };
        assert_eq!(store.read(filter).await.unwrap().len(), 2);
    }
}
