//! Sink lifecycle adapter for incident-platform-style targets (spec §4.12): firing alerts
//! create or update an open incident, resolved alerts close it. Dedup state lives in the
//! same [`crate::cache::TtlLruCache`] used for format output, keyed by fingerprint.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlLruCache;
use crate::error::PublishingError;
use crate::model::{AlertStatus, EnrichedAlert};

/// What the remote incident platform should be asked to do for this alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Create,
    Update,
    Resolve,
    NoOp,
}

#[async_trait::async_trait]
pub trait IncidentClient: Send + Sync {
    async fn create(&self, alert: &EnrichedAlert) -> Result<String, PublishingError>;
    async fn update(&self, incident_id: &str, alert: &EnrichedAlert) -> Result<(), PublishingError>;
    async fn resolve(&self, incident_id: &str) -> Result<(), PublishingError>;
}

/// Remembers the remote incident id for every fingerprint currently tracked as open.
pub struct IncidentSink<C: IncidentClient> {
    client: C,
    dedup: TtlLruCache<String, String>,
}

impl<C: IncidentClient> IncidentSink<C> {
    pub fn new(client: C, dedup_ttl: Duration) -> Self {
        Self { client, dedup: TtlLruCache::new(10_000, Some(dedup_ttl)) }
    }

    pub async fn handle(&self, alert: &EnrichedAlert) -> Result<(), PublishingError> {
        let tracked = self.dedup.get(&alert.fingerprint);
        match (alert.status, tracked) {
            (AlertStatus::Firing, None) => {
                let id = self.client.create(alert).await?;
                self.dedup.set(alert.fingerprint.clone(), id, None);
                Ok(())
            }
            (AlertStatus::Firing, Some(id)) => match self.client.update(&id, alert).await {
                Ok(()) => Ok(()),
                Err(PublishingError::NotFound(_) | PublishingError::Conflict(_)) => {
                    // Remote forgot about this incident (already closed out-of-band, or
                    // IDs collided); evict and retry as a fresh create. Anything else
                    // (auth, validation, 5xx) propagates unchanged below.
                    self.dedup.delete(&alert.fingerprint);
                    let new_id = self.client.create(alert).await?;
                    self.dedup.set(alert.fingerprint.clone(), new_id, None);
                    Ok(())
                }
                Err(e) => Err(e),
            },
            (AlertStatus::Resolved, Some(id)) => match self.client.resolve(&id).await {
                Ok(()) => {
                    self.dedup.delete(&alert.fingerprint);
                    Ok(())
                }
                Err(PublishingError::NotFound(_) | PublishingError::Conflict(_)) => {
                    // Already gone remotely; treat as success locally.
                    self.dedup.delete(&alert.fingerprint);
                    Ok(())
                }
                Err(e) => Err(e),
            },
            (AlertStatus::Resolved, None) => {
                tracing::debug!(fingerprint = %alert.fingerprint, "resolved alert for untracked incident, ignoring");
                Ok(())
            }
        }
    }
}
