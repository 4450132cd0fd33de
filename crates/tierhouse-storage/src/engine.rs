//! Tier Engine
//!
//! The top-level coordinator: one value that owns the tier stores, the
//! rehydrated cache, the transit journal and the per-identifier locks, and
//! routes every external request to the component responsible for it.
//!
//! ## Architecture
//!
//! ```text
//! TierEngine
//!     │
//!     ├─ ingest ──────────────→ Hot store (uncompressed)
//!     │
//!     ├─ run_transition_pass ─→ TransitionExecutor ─→ TransitJournal
//!     │                               │
//!     │                               └─ Hot → Cool → Archive
//!     │
//!     └─ retrieve ────────────→ RetrievalCoordinator ─→ Rehydrator ─→ RehydratedCache
//! ```
//!
//! All components share one [`KeyLocks`], so operations on the same identifier
//! are serialized across ingestion, passes and retrieval.
//!
//! ## Usage
//!
//! ```ignore
//! use tierhouse_storage::{TierEngine, TieringConfig};
//! use tierhouse_core::Priority;
//!
//! let engine = TierEngine::open(TieringConfig::with_data_dir("./data")).await?;
//! engine.ingest(record).await?;
//!
//! let report = engine.run_transition_pass().await;
//! println!("moved {} records", report.total_moved());
//!
//! let record = engine.retrieve(&id, Priority::Expedited).await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tierhouse_core::{CompressionLevel, Priority, Record, RecordId, TierLocation};
use tracing::{debug, info};

use crate::cache::{CacheStats, RehydratedCache};
use crate::config::TieringConfig;
use crate::error::{Error, Result};
use crate::executor::{TransitionExecutor, TransitionReport};
use crate::journal::{RecoveryReport, TransitJournal};
use crate::lock::KeyLocks;
use crate::policy::PolicyEngine;
use crate::rehydration::{RehydrationLatency, Rehydrator};
use crate::retrieval::{RetrievalCoordinator, Retrieved};
use crate::store::TierSet;

/// One entry of a [`TierEngine::tier_contents`] listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierEntry {
    pub id: RecordId,
    pub compression: Option<CompressionLevel>,
    pub size_bytes: u64,
}

/// Snapshot of every location, lifecycle tiers plus the rehydrated cache.
pub type TierContents = BTreeMap<TierLocation, Vec<TierEntry>>;

pub struct TierEngine {
    config: TieringConfig,
    tiers: TierSet,
    locks: Arc<KeyLocks>,
    cache: Arc<RehydratedCache>,
    executor: TransitionExecutor,
    retrieval: RetrievalCoordinator,
    recovery: RecoveryReport,
}

impl TierEngine {
    /// Open file-backed tiers under `config.data_dir`, replaying any leftover
    /// transit markers before returning.
    pub async fn open(config: TieringConfig) -> Result<Self> {
        config.validate()?;
        let tiers = TierSet::open_files(config.data_dir()).await?;
        Self::open_with_tiers(config, tiers).await
    }

    /// Like [`TierEngine::open`], but over caller-supplied lifecycle stores.
    /// The rehydrated cache and transit journal still live under `data_dir`.
    pub async fn open_with_tiers(config: TieringConfig, tiers: TierSet) -> Result<Self> {
        config.validate()?;
        tierhouse_observability::init();

        let locks = Arc::new(KeyLocks::new());
        let cache = Arc::new(
            RehydratedCache::open_with_locks(
                config.tier_dir(TierLocation::RehydratedCache),
                config.rehydrated_cache_max_bytes,
                locks.clone(),
            )
            .await?,
        );
        let journal = Arc::new(TransitJournal::open(config.transit_dir()).await?);

        let recovery = journal.recover(&tiers).await?;
        if !recovery.is_clean() {
            info!(
                completed = recovery.completed,
                rolled_back = recovery.rolled_back,
                deferred = recovery.deferred,
                "Replayed transit journal"
            );
        }

        let executor = TransitionExecutor::new(
            tiers.clone(),
            locks.clone(),
            journal,
            PolicyEngine::new(config.policies()),
            config.transition_concurrency,
        );
        let latency = RehydrationLatency::new(config.expedited_latency, config.standard_latency)?;
        let retrieval = RetrievalCoordinator::new(
            tiers.clone(),
            locks.clone(),
            cache.clone(),
            Rehydrator::new(cache.clone(), locks.clone(), latency),
            config.serve_rehydrated_copies,
        );

        info!(data_dir = %config.data_dir().display(), "Tier engine opened");

        Ok(Self {
            config,
            tiers,
            locks,
            cache,
            executor,
            retrieval,
            recovery,
        })
    }

    /// Store a new record in Hot, uncompressed.
    ///
    /// Rejects invalid records and identifiers already held by any lifecycle tier.
    pub async fn ingest(&self, record: Record) -> Result<()> {
        record.validate()?;
        let _guard = self.locks.lock(&record.id).await;

        let present = self.tiers.locate(&record.id).await;
        if let Some(tier) = present.first() {
            return Err(Error::InvalidInput(format!(
                "record {} already exists in {}",
                record.id, tier
            )));
        }

        let hot = self
            .tiers
            .get(TierLocation::Hot)
            .ok_or_else(|| Error::InvalidConfig("no hot tier configured".to_string()))?;
        let meta = hot.write(&record, None).await?;

        tierhouse_observability::metrics::RECORDS_INGESTED_TOTAL.inc();
        debug!(record_id = %record.id, size_bytes = meta.size_bytes, "Ingested record");
        Ok(())
    }

    /// Run one transition pass evaluated at the current time.
    pub async fn run_transition_pass(&self) -> TransitionReport {
        self.run_transition_pass_at(Utc::now()).await
    }

    /// Run one transition pass as if the clock read `now`.
    pub async fn run_transition_pass_at(&self, now: DateTime<Utc>) -> TransitionReport {
        self.executor.run_pass(now).await
    }

    pub async fn retrieve(&self, id: &RecordId, priority: Priority) -> Result<Record> {
        self.retrieval.retrieve(id, priority).await
    }

    /// Retrieve with a caller-side deadline. A rehydration that outlives the
    /// deadline still completes and fills the cache.
    pub async fn retrieve_with_timeout(
        &self,
        id: &RecordId,
        priority: Priority,
        timeout: Duration,
    ) -> Result<Record> {
        self.retrieval
            .fetch(id, priority, Some(timeout))
            .await
            .map(|r| r.record)
    }

    /// Retrieve along with the location the record was served from.
    pub async fn fetch(
        &self,
        id: &RecordId,
        priority: Priority,
        timeout: Option<Duration>,
    ) -> Result<Retrieved> {
        self.retrieval.fetch(id, priority, timeout).await
    }

    /// Every identifier per location, sorted, with its stored compression.
    pub async fn tier_contents(&self) -> TierContents {
        let mut contents = TierContents::new();

        for (tier, store) in self.tiers.iter() {
            contents.insert(tier, to_entries(store.entries().await));
        }
        contents.insert(
            TierLocation::RehydratedCache,
            to_entries(self.cache.entries().await),
        );

        contents
    }

    /// Lifecycle tiers currently holding `id`.
    pub async fn locate(&self, id: &RecordId) -> Vec<TierLocation> {
        self.tiers.locate(id).await
    }

    /// What the transit journal replay did when this engine was opened.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Rehydrations currently in flight.
    pub fn rehydrations_in_flight(&self) -> usize {
        self.retrieval.rehydrator().in_flight()
    }

    pub fn config(&self) -> &TieringConfig {
        &self.config
    }
}

fn to_entries(entries: Vec<(RecordId, crate::store::EntryMeta)>) -> Vec<TierEntry> {
    let mut entries: Vec<TierEntry> = entries
        .into_iter()
        .map(|(id, meta)| TierEntry {
            id,
            compression: meta.compression,
            size_bytes: meta.size_bytes,
        })
        .collect();
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;
    use tierhouse_core::LineItem;

    fn record(seq: u32, issued_at: DateTime<Utc>) -> Record {
        Record::new(
            RecordId::billing(seq),
            format!("CUST-{:03}", seq),
            issued_at,
            seq as f64 * 1.23 + 100.0,
            "USD",
            "Cloud services",
            vec![LineItem::new("Compute", 1, 80.0), LineItem::new("Storage", 2, 10.0)],
        )
    }

    fn config(dir: &TempDir) -> TieringConfig {
        TieringConfig {
            expedited_latency: Duration::from_millis(20),
            standard_latency: Duration::from_millis(60),
            ..TieringConfig::with_data_dir(dir.path())
        }
    }

    #[tokio::test]
    async fn test_ingest_lands_in_hot_uncompressed() {
        let dir = TempDir::new().unwrap();
        let engine = TierEngine::open(config(&dir)).await.unwrap();

        engine.ingest(record(1, Utc::now())).await.unwrap();

        let contents = engine.tier_contents().await;
        let hot = &contents[&TierLocation::Hot];
        assert_eq!(hot.len(), 1);
        assert_eq!(hot[0].id, RecordId::billing(1));
        assert_eq!(hot[0].compression, None);
        assert!(contents[&TierLocation::Cool].is_empty());
        assert!(contents[&TierLocation::RehydratedCache].is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_ingest_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = TierEngine::open(config(&dir)).await.unwrap();
        let issued = Utc::now() - ChronoDuration::days(100);

        engine.ingest(record(1, issued)).await.unwrap();
        engine.run_transition_pass().await;
        assert_eq!(engine.locate(&RecordId::billing(1)).await, vec![TierLocation::Cool]);

        // Still rejected once the record has moved on
        let result = engine.ingest(record(1, Utc::now())).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(engine.locate(&RecordId::billing(1)).await, vec![TierLocation::Cool]);
    }

    #[tokio::test]
    async fn test_invalid_record_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = TierEngine::open(config(&dir)).await.unwrap();
        let mut bad = record(2, Utc::now());
        bad.currency = String::new();

        assert!(matches!(engine.ingest(bad).await, Err(Error::Core(_))));
        assert!(engine.locate(&RecordId::billing(2)).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let config = TieringConfig {
            expedited_latency: Duration::from_secs(20),
            standard_latency: Duration::from_secs(10),
            ..TieringConfig::with_data_dir(dir.path())
        };
        assert!(matches!(
            TierEngine::open(config).await,
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_reopen_keeps_contents() {
        let dir = TempDir::new().unwrap();
        {
            let engine = TierEngine::open(config(&dir)).await.unwrap();
            engine.ingest(record(1, Utc::now())).await.unwrap();
            engine
                .ingest(record(2, Utc::now() - ChronoDuration::days(400)))
                .await
                .unwrap();
            engine.run_transition_pass().await;
        }

        let engine = TierEngine::open(config(&dir)).await.unwrap();
        assert!(engine.recovery_report().is_clean());
        assert_eq!(engine.locate(&RecordId::billing(1)).await, vec![TierLocation::Hot]);
        assert_eq!(
            engine.locate(&RecordId::billing(2)).await,
            vec![TierLocation::Archive]
        );
    }

    #[tokio::test]
    async fn test_tier_contents_lists_rehydrated_copies() {
        let dir = TempDir::new().unwrap();
        let engine = TierEngine::open(config(&dir)).await.unwrap();
        let rec = record(3, Utc::now() - ChronoDuration::days(400));
        engine.ingest(rec.clone()).await.unwrap();
        engine.run_transition_pass().await;

        let retrieved = engine.retrieve(&rec.id, Priority::Expedited).await.unwrap();
        assert_eq!(retrieved, rec);

        let contents = engine.tier_contents().await;
        assert_eq!(contents[&TierLocation::Archive][0].compression, Some(CompressionLevel::BEST));
        assert_eq!(contents[&TierLocation::RehydratedCache].len(), 1);
        assert_eq!(contents[&TierLocation::RehydratedCache][0].id, rec.id);
        assert!(engine.cache_stats().await.entry_count >= 1);
    }
}
