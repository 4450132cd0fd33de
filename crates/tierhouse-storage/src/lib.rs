//! Tierhouse Storage Layer
//!
//! This crate implements the record lifecycle engine: records are ingested
//! into a Hot tier, move to Cool and then Archive as they age, and come back
//! out of Archive through a simulated rehydration.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐
//! │  ingest     │
//! └──────┬──────┘
//!        │ uncompressed
//!        ▼
//! ┌─────────────┐   age >= 3 months    ┌─────────────┐   age >= 12 months   ┌─────────────┐
//! │     Hot     │ ───────────────────→ │    Cool     │ ───────────────────→ │   Archive   │
//! │  (json)     │  TransitionExecutor  │ (gzip -5)   │  TransitionExecutor  │ (gzip -9)   │
//! └─────────────┘                      └─────────────┘                      └──────┬──────┘
//!                                                                                  │ Rehydrator
//!                                                                                  ▼
//!                                                                          ┌───────────────┐
//!                                                                          │ Rehydrated    │
//!                                                                          │ cache (LRU)   │
//!                                                                          └───────────────┘
//! ```
//!
//! ## Main Components
//!
//! - [`TierStore`] / [`FileTierStore`]: one directory per tier, one file per
//!   record, written with write-then-rename and indexed in memory.
//! - [`PolicyEngine`]: age-based eligibility, `age_months = days / 30.44`.
//! - [`TransitionExecutor`]: moves eligible records down the chain, one
//!   [`TransitJournal`] marker per move so an interrupted move is finished or
//!   rolled back on the next open.
//! - [`RetrievalCoordinator`]: probes Hot, Cool, Archive in order.
//! - [`Rehydrator`]: priority-dependent delay, then decompression into the
//!   [`RehydratedCache`]. Concurrent requests for one identifier share a
//!   single rehydration.
//! - [`TierEngine`]: the facade tying the above together.
//! - [`TransitionScheduler`]: runs passes on an interval.
//!
//! ## Usage Example
//!
//! ```ignore
//! use tierhouse_storage::{TierEngine, TieringConfig};
//! use tierhouse_core::{Priority, RecordId};
//!
//! let engine = TierEngine::open(TieringConfig::default()).await?;
//! let report = engine.run_transition_pass().await;
//! let record = engine.retrieve(&RecordId::billing(1), Priority::Standard).await?;
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod journal;
pub mod lock;
pub mod policy;
pub mod rehydration;
pub mod retrieval;
pub mod scheduler;
pub mod store;

pub use cache::{CacheStats, RehydratedCache};
pub use config::TieringConfig;
pub use engine::{TierContents, TierEngine, TierEntry};
pub use error::{Error, ErrorKind, Result};
pub use executor::{TransitionExecutor, TransitionFailure, TransitionReport};
pub use journal::{RecoveryReport, TransitJournal, TransitMarker};
pub use lock::KeyLocks;
pub use policy::{age_months, PolicyEngine, TransitionPolicy, MS_PER_MONTH};
pub use rehydration::{RehydrationFailure, RehydrationLatency, Rehydrator};
pub use retrieval::{RetrievalCoordinator, Retrieved};
pub use scheduler::TransitionScheduler;
pub use store::{EntryMeta, FileTierStore, StoredPayload, StoredRecord, TierSet, TierStore};
