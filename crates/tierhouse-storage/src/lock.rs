//! Per-identifier mutual exclusion.
//!
//! Every store operation touching a record runs while holding that record's
//! lock, so operations on one identifier observe a total order while
//! different identifiers never contend. Entries are held weakly and pruned
//! once no guard references them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tierhouse_core::RecordId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

// Prune dead entries whenever the map doubles past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// Guard for one identifier's lock. Dropping it releases the lock.
pub type KeyGuard = OwnedMutexGuard<()>;

#[derive(Default)]
struct LockTable {
    locks: HashMap<RecordId, Weak<AsyncMutex<()>>>,
    prune_at: usize,
}

/// A table of lazily created, per-identifier async locks.
#[derive(Default)]
pub struct KeyLocks {
    table: Mutex<LockTable>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn lock(&self, id: &RecordId) -> KeyGuard {
        let mutex = self.handle(id);
        mutex.lock_owned().await
    }

    /// Take `id`'s lock only if nobody holds it right now.
    pub fn try_lock(&self, id: &RecordId) -> Option<KeyGuard> {
        self.handle(id).try_lock_owned().ok()
    }

    fn handle(&self, id: &RecordId) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = table.locks.get(id).and_then(Weak::upgrade) {
            return existing;
        }

        let mutex = Arc::new(AsyncMutex::new(()));
        table.locks.insert(id.clone(), Arc::downgrade(&mutex));

        if table.locks.len() > table.prune_at.max(PRUNE_THRESHOLD) {
            table.locks.retain(|_, w| w.strong_count() > 0);
            table.prune_at = table.locks.len() * 2;
        }
        mutex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_id_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let id = RecordId::billing(1);

        let guard = locks.lock(&id).await;

        let contender = {
            let locks = locks.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_ids_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.lock(&RecordId::billing(1)).await;
        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.lock(&RecordId::billing(2)),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_try_lock_skips_held_ids() {
        let locks = KeyLocks::new();
        let id = RecordId::billing(1);

        let guard = locks.lock(&id).await;
        assert!(locks.try_lock(&id).is_none());
        assert!(locks.try_lock(&RecordId::billing(2)).is_some());

        drop(guard);
        assert!(locks.try_lock(&id).is_some());
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = KeyLocks::new();
        for seq in 0..(PRUNE_THRESHOLD as u32 + 10) {
            let _guard = locks.lock(&RecordId::billing(seq)).await;
        }
        let table = locks.table.lock().unwrap();
        assert!(table.locks.values().all(|w| w.strong_count() == 0));
        assert!(table.locks.len() <= PRUNE_THRESHOLD);
    }
}
