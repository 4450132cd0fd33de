//! Rehydration Simulator
//!
//! Restores a readable copy of an Archive record. The restore is simulated: a
//! priority-dependent delay, then decompression, then a write into the
//! [`RehydratedCache`]. The Archive original is never touched.
//!
//! ## Coalescing
//!
//! ```text
//! request A (expedited) ─┐
//! request B (standard)  ─┼──→ one spawned task: sleep → decode → cache.put
//! request C (expedited) ─┘            │
//!                                     └──→ watch channel: every caller gets the same result
//! ```
//!
//! At most one rehydration runs per identifier. The first request starts a
//! task and publishes a `watch` receiver; later requests for the same
//! identifier subscribe to it, whatever their priority. The task owns the
//! work, so a caller that gives up (timeout, cancellation) does not stop it:
//! the copy still lands in the cache.
//!
//! The delay holds no per-identifier lock. The lock is taken only for the
//! cache write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tierhouse_core::{Priority, Record, RecordId};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::RehydratedCache;
use crate::codec;
use crate::error::{Error, Result};
use crate::lock::KeyLocks;
use crate::store::StoredPayload;

/// Shareable failure of one rehydration, handed to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehydrationFailure {
    pub id: RecordId,
    pub reason: String,
}

impl From<RehydrationFailure> for Error {
    fn from(failure: RehydrationFailure) -> Self {
        Error::Rehydration {
            id: failure.id,
            reason: failure.reason,
        }
    }
}

type Outcome = Option<std::result::Result<Record, RehydrationFailure>>;
type InFlight = Arc<Mutex<HashMap<RecordId, watch::Receiver<Outcome>>>>;

/// Simulated restore delays per priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RehydrationLatency {
    pub expedited: Duration,
    pub standard: Duration,
}

impl RehydrationLatency {
    pub fn new(expedited: Duration, standard: Duration) -> Result<Self> {
        if expedited >= standard {
            return Err(Error::InvalidConfig(format!(
                "expedited latency {:?} must be shorter than standard latency {:?}",
                expedited, standard
            )));
        }
        Ok(Self {
            expedited,
            standard,
        })
    }

    pub fn for_priority(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Expedited => self.expedited,
            Priority::Standard => self.standard,
        }
    }
}

pub struct Rehydrator {
    cache: Arc<RehydratedCache>,
    locks: Arc<KeyLocks>,
    latency: RehydrationLatency,
    in_flight: InFlight,
}

impl Rehydrator {
    pub fn new(cache: Arc<RehydratedCache>, locks: Arc<KeyLocks>, latency: RehydrationLatency) -> Self {
        Self {
            cache,
            locks,
            latency,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Restore `payload` (an Archive payload) and return the decoded record.
    ///
    /// Joins an in-flight rehydration of the same identifier if there is one.
    pub async fn rehydrate(&self, payload: StoredPayload, priority: Priority) -> Result<Record> {
        let id = payload.id.clone();
        let mut rx = self.join_or_start(payload, priority);

        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Rehydration {
                id: id.clone(),
                reason: "rehydration task ended without a result".to_string(),
            })?
            .clone();

        match outcome {
            Some(Ok(record)) => Ok(record),
            Some(Err(failure)) => Err(failure.into()),
            None => Err(Error::Rehydration {
                id,
                reason: "rehydration produced no result".to_string(),
            }),
        }
    }

    /// Number of identifiers currently being rehydrated.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn join_or_start(&self, payload: StoredPayload, priority: Priority) -> watch::Receiver<Outcome> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = in_flight.get(&payload.id) {
            // A task that died without publishing leaves a closed, empty channel behind.
            let abandoned = existing.borrow().is_none() && existing.has_changed().is_err();
            if !abandoned {
                tierhouse_observability::metrics::REHYDRATIONS_COALESCED_TOTAL.inc();
                debug!(record_id = %payload.id, priority = %priority, "Joining in-flight rehydration");
                return existing.clone();
            }
        }

        let (tx, rx) = watch::channel(None);
        in_flight.insert(payload.id.clone(), rx.clone());
        drop(in_flight);

        tierhouse_observability::metrics::REHYDRATIONS_TOTAL
            .with_label_values(&[&priority.to_string()])
            .inc();

        let task = RehydrationTask {
            id: payload.id.clone(),
            data: payload.data,
            is_compressed: payload.meta.is_compressed(),
            priority,
            delay: self.latency.for_priority(priority),
            cache: self.cache.clone(),
            locks: self.locks.clone(),
        };
        let registration = Registration {
            in_flight: self.in_flight.clone(),
            id: payload.id,
        };

        tokio::spawn(async move {
            let outcome = task.run().await;
            let _ = tx.send(Some(outcome));
            drop(registration);
        });

        rx
    }
}

/// Removes the in-flight entry when the task finishes, panics included.
struct Registration {
    in_flight: InFlight,
    id: RecordId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.id);
    }
}

struct RehydrationTask {
    id: RecordId,
    data: Bytes,
    is_compressed: bool,
    priority: Priority,
    delay: Duration,
    cache: Arc<RehydratedCache>,
    locks: Arc<KeyLocks>,
}

impl RehydrationTask {
    async fn run(self) -> std::result::Result<Record, RehydrationFailure> {
        let started = Instant::now();
        debug!(
            record_id = %self.id,
            priority = %self.priority,
            delay_ms = self.delay.as_millis() as u64,
            "Rehydration started"
        );

        tokio::time::sleep(self.delay).await;

        let record = codec::decode(&self.data, self.is_compressed).map_err(|e| RehydrationFailure {
            id: self.id.clone(),
            reason: e.to_string(),
        })?;
        if record.id != self.id {
            return Err(RehydrationFailure {
                id: self.id.clone(),
                reason: format!("archive payload carries identifier {}", record.id),
            });
        }

        {
            let _guard = self.locks.lock(&self.id).await;
            if let Err(e) = self.cache.put(&record).await {
                // The caller still gets the record; only the cached copy is lost.
                tierhouse_observability::metrics::REHYDRATED_CACHE_WRITE_FAILURES_TOTAL.inc();
                warn!(record_id = %self.id, error = %e, "Failed to cache rehydrated copy");
            }
        }

        let elapsed = started.elapsed();
        tierhouse_observability::metrics::REHYDRATION_SECONDS
            .with_label_values(&[&self.priority.to_string()])
            .observe(elapsed.as_secs_f64());
        info!(
            record_id = %self.id,
            priority = %self.priority,
            elapsed_ms = elapsed.as_millis() as u64,
            "Rehydration complete"
        );
        Ok(record)
    }
}
