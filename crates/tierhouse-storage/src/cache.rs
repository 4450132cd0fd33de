//! Rehydrated Cache with LRU Eviction
//!
//! Disk-backed overlay holding decompressed copies of Archive records. It is a
//! read-through convenience only: entries may be overwritten or evicted at any
//! time and are never the authoritative copy, so eviction never touches the
//! Archive tier.
//!
//! ## How It Works
//!
//! ```text
//! retrieve(BILL-00042) finds it only in Archive
//!         ↓
//! Rehydrator waits the priority delay, decompresses
//!         ↓
//! put() writes data/rehydrated/BILL-00042.json
//!         ↓
//! Cache over its byte budget?
//!         ↓
//!     YES → evict least recently used copies
//! ```
//!
//! Entries survive restarts: opening the cache rescans its directory, and the
//! byte budget is enforced again immediately.
//!
//! Eviction only removes copies whose identifier lock is free at that moment.
//! A copy in use is skipped and the next least recently used one goes instead.

use std::path::Path;
use std::sync::Arc;

use lru::LruCache;
use tierhouse_core::{Record, RecordId, TierLocation};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::lock::KeyLocks;
use crate::store::{EntryMeta, FileTierStore, TierStore};

struct CacheState {
    /// Current total size of all cached copies
    current_size: u64,

    /// LRU tracker: maps record id → payload size
    lru: LruCache<RecordId, u64>,
}

/// Size-bounded LRU cache of rehydrated records
pub struct RehydratedCache {
    store: FileTierStore,
    max_size_bytes: u64,
    locks: Arc<KeyLocks>,
    state: Mutex<CacheState>,
}

impl RehydratedCache {
    /// Open the cache directory, index what is already there and trim it to
    /// `max_size_bytes`.
    pub async fn open(cache_dir: impl AsRef<Path>, max_size_bytes: u64) -> Result<Self> {
        Self::open_with_locks(cache_dir, max_size_bytes, Arc::new(KeyLocks::new())).await
    }

    /// Open the cache sharing the engine's per-identifier locks, so eviction
    /// never deletes a copy someone is reading or writing.
    pub async fn open_with_locks(
        cache_dir: impl AsRef<Path>,
        max_size_bytes: u64,
        locks: Arc<KeyLocks>,
    ) -> Result<Self> {
        let store = FileTierStore::open(cache_dir, TierLocation::RehydratedCache).await?;

        // Only the byte budget bounds the tracker
        let mut lru = LruCache::unbounded();
        let mut current_size = 0u64;
        for (id, meta) in store.entries().await {
            current_size += meta.size_bytes;
            lru.put(id, meta.size_bytes);
        }

        let cache = Self {
            store,
            max_size_bytes,
            locks,
            state: Mutex::new(CacheState { current_size, lru }),
        };
        {
            let mut state = cache.state.lock().await;
            cache.evict_if_needed(&mut state, None).await;
            tierhouse_observability::metrics::REHYDRATED_CACHE_BYTES.set(state.current_size as i64);
        }
        Ok(cache)
    }

    /// Get a rehydrated copy.
    ///
    /// Returns `None` on a miss. A copy that no longer decodes is dropped and
    /// reported as a miss, since the Archive original can always be restored again.
    pub async fn get(&self, id: &RecordId) -> Result<Option<Record>> {
        if !self.store.exists(id).await {
            return Ok(None);
        }

        match self.store.read(id).await {
            Ok(stored) => {
                self.state.lock().await.lru.get(id);
                tracing::debug!(record_id = %id, "Rehydrated cache hit");
                Ok(Some(stored.record))
            }
            Err(Error::MissingFromTier { .. }) => {
                self.forget(id).await;
                Ok(None)
            }
            Err(Error::CorruptRecord { reason, .. }) => {
                tracing::warn!(record_id = %id, reason = %reason, "Dropping corrupt rehydrated copy");
                self.remove(id).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Store a rehydrated copy, overwriting any previous one, then evict least
    /// recently used copies until the cache fits its budget again.
    pub async fn put(&self, record: &Record) -> Result<()> {
        let mut state = self.state.lock().await;

        let meta = self.store.write(record, None).await?;
        if let Some(previous) = state.lru.put(record.id.clone(), meta.size_bytes) {
            state.current_size = state.current_size.saturating_sub(previous);
        }
        state.current_size += meta.size_bytes;

        self.evict_if_needed(&mut state, Some(&record.id)).await;
        tierhouse_observability::metrics::REHYDRATED_CACHE_BYTES.set(state.current_size as i64);

        tracing::debug!(
            record_id = %record.id,
            size = meta.size_bytes,
            "Cached rehydrated copy"
        );
        Ok(())
    }

    /// Drop a copy. Missing copies are not an error.
    pub async fn remove(&self, id: &RecordId) -> Result<()> {
        let mut state = self.state.lock().await;
        match self.store.delete(id).await {
            Ok(()) | Err(Error::MissingFromTier { .. }) => {}
            Err(e) => return Err(e),
        }
        if let Some(size) = state.lru.pop(id) {
            state.current_size = state.current_size.saturating_sub(size);
        }
        tierhouse_observability::metrics::REHYDRATED_CACHE_BYTES.set(state.current_size as i64);
        Ok(())
    }

    pub async fn contains(&self, id: &RecordId) -> bool {
        self.store.exists(id).await
    }

    /// Every cached copy with its metadata.
    pub async fn entries(&self) -> Vec<(RecordId, EntryMeta)> {
        self.store.entries().await
    }

    async fn forget(&self, id: &RecordId) {
        let mut state = self.state.lock().await;
        if let Some(size) = state.lru.pop(id) {
            state.current_size = state.current_size.saturating_sub(size);
        }
    }

    /// Evict LRU copies until the budget holds. `keep` and copies whose
    /// identifier is locked right now are skipped.
    async fn evict_if_needed(&self, state: &mut CacheState, keep: Option<&RecordId>) {
        if state.current_size <= self.max_size_bytes {
            return;
        }

        let mut excess = state.current_size - self.max_size_bytes;
        let mut victims = Vec::new();
        for (id, size) in state.lru.iter().rev() {
            if excess == 0 {
                break;
            }
            if Some(id) == keep {
                continue;
            }
            let Some(guard) = self.locks.try_lock(id) else {
                tracing::debug!(record_id = %id, "Skipping busy rehydrated copy");
                continue;
            };
            victims.push((id.clone(), *size, guard));
            excess = excess.saturating_sub(*size);
        }

        for (id, size, _guard) in victims {
            state.lru.pop(&id);
            if let Err(e) = self.store.delete(&id).await {
                tracing::warn!(
                    record_id = %id,
                    error = %e,
                    "Failed to delete evicted rehydrated copy"
                );
            }
            state.current_size = state.current_size.saturating_sub(size);

            tracing::debug!(record_id = %id, size, "Evicted from rehydrated cache");
        }

        if state.current_size > self.max_size_bytes {
            tracing::warn!(
                current_size = state.current_size,
                max_size = self.max_size_bytes,
                "Rehydrated cache over budget, remaining copies are in use or just written"
            );
        }
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;

        CacheStats {
            current_size: state.current_size,
            max_size: self.max_size_bytes,
            entry_count: state.lru.len(),
            utilization_pct: if self.max_size_bytes == 0 {
                0.0
            } else {
                state.current_size as f64 / self.max_size_bytes as f64 * 100.0
            },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current total size of cached copies
    pub current_size: u64,

    /// Maximum allowed cache size
    pub max_size: u64,

    /// Number of cached copies
    pub entry_count: usize,

    /// Cache utilization percentage (0-100)
    pub utilization_pct: f64,
}
