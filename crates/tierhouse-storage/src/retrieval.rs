//! Retrieval Coordinator
//!
//! Looks a record up by identifier, probing Hot, then Cool, then Archive and
//! returning the first hit. An Archive-only record is handed to the
//! [`Rehydrator`] before it is returned.
//!
//! The per-identifier lock is held for the probes and released before any
//! rehydration delay starts.

use std::sync::Arc;
use std::time::Duration;

use tierhouse_core::{Priority, Record, RecordId, TierLocation};
use tracing::{debug, warn};

use crate::cache::RehydratedCache;
use crate::error::{Error, Result};
use crate::lock::KeyLocks;
use crate::rehydration::Rehydrator;
use crate::store::{StoredPayload, TierSet};

/// A retrieved record and where it was served from.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub record: Record,

    /// `Hot` or `Cool` for direct hits, `Archive` for a fresh rehydration,
    /// `RehydratedCache` for an existing rehydrated copy.
    pub served_from: TierLocation,
}

enum Probe {
    Found(Retrieved),
    Archived(StoredPayload),
}

pub struct RetrievalCoordinator {
    tiers: TierSet,
    locks: Arc<KeyLocks>,
    cache: Arc<RehydratedCache>,
    rehydrator: Rehydrator,
    serve_rehydrated_copies: bool,
}

impl RetrievalCoordinator {
    pub fn new(
        tiers: TierSet,
        locks: Arc<KeyLocks>,
        cache: Arc<RehydratedCache>,
        rehydrator: Rehydrator,
        serve_rehydrated_copies: bool,
    ) -> Self {
        Self {
            tiers,
            locks,
            cache,
            rehydrator,
            serve_rehydrated_copies,
        }
    }

    /// Retrieve `id`, rehydrating at `priority` when only Archive holds it.
    ///
    /// With a `timeout`, the caller gets [`Error::Timeout`] once it expires;
    /// an in-flight rehydration keeps running and still fills the cache.
    pub async fn fetch(
        &self,
        id: &RecordId,
        priority: Priority,
        timeout: Option<Duration>,
    ) -> Result<Retrieved> {
        let result = match timeout {
            Some(after) => match tokio::time::timeout(after, self.fetch_inner(id, priority)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    id: id.clone(),
                    after,
                }),
            },
            None => self.fetch_inner(id, priority).await,
        };

        match &result {
            Ok(retrieved) => {
                tierhouse_observability::metrics::RETRIEVALS_TOTAL
                    .with_label_values(&[retrieved.served_from.dir_name()])
                    .inc();
            }
            Err(e) => {
                tierhouse_observability::metrics::RETRIEVAL_ERRORS_TOTAL
                    .with_label_values(&[e.kind().as_str()])
                    .inc();
                debug!(record_id = %id, error = %e, "Retrieval failed");
            }
        }
        result
    }

    pub async fn retrieve(&self, id: &RecordId, priority: Priority) -> Result<Record> {
        self.fetch(id, priority, None).await.map(|r| r.record)
    }

    pub fn rehydrator(&self) -> &Rehydrator {
        &self.rehydrator
    }

    async fn fetch_inner(&self, id: &RecordId, priority: Priority) -> Result<Retrieved> {
        let payload = match self.probe(id).await? {
            Probe::Found(retrieved) => return Ok(retrieved),
            Probe::Archived(payload) => payload,
        };

        let record = self.rehydrator.rehydrate(payload, priority).await?;
        Ok(Retrieved {
            record,
            served_from: TierLocation::Archive,
        })
    }

    async fn probe(&self, id: &RecordId) -> Result<Probe> {
        let _guard = self.locks.lock(id).await;

        for (tier, store) in self.tiers.iter() {
            if tier == TierLocation::Archive {
                break;
            }
            match store.read(id).await {
                Ok(stored) => {
                    debug!(record_id = %id, tier = %tier, "Served directly");
                    return Ok(Probe::Found(Retrieved {
                        record: stored.record,
                        served_from: tier,
                    }));
                }
                Err(Error::MissingFromTier { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        let archive = self
            .tiers
            .get(TierLocation::Archive)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        let payload = match archive.read_payload(id).await {
            Ok(payload) => payload,
            Err(Error::MissingFromTier { .. }) => return Err(Error::NotFound(id.clone())),
            Err(e) => return Err(e),
        };

        if self.serve_rehydrated_copies {
            match self.cache.get(id).await {
                Ok(Some(record)) => {
                    debug!(record_id = %id, "Served existing rehydrated copy");
                    return Ok(Probe::Found(Retrieved {
                        record,
                        served_from: TierLocation::RehydratedCache,
                    }));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(record_id = %id, error = %e, "Rehydrated cache unreadable, restoring again");
                }
            }
        }

        Ok(Probe::Archived(payload))
    }
}
