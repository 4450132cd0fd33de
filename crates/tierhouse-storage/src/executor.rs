//! Transition Executor
//!
//! Runs one batch pass over every tier with an outgoing policy. Tiers are
//! processed hottest first, and each tier is listed only after the previous
//! one has finished, so a record old enough for both moves cascades
//! Hot -> Cool -> Archive within a single pass and a second pass finds nothing
//! left to do.
//!
//! ## Per-Record Protocol
//!
//! ```text
//! lock(id)
//!   read from source ──── gone? ──→ vanished (moved by someone else)
//!   eligible? ─────────── no ────→ untouched
//!   journal.begin(marker)
//!   write to destination at its compression level
//!   delete from source
//!   journal.complete(id)
//! unlock(id)
//! ```
//!
//! Records within one tier are processed concurrently, bounded by
//! `transition_concurrency`. Every per-record failure is caught, classified
//! and added to the [`TransitionReport`]; nothing aborts the pass. No state
//! survives between passes: ineligible records are simply looked at again.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tierhouse_core::{RecordId, TierLocation};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::journal::{TransitJournal, TransitMarker};
use crate::lock::KeyLocks;
use crate::policy::{PolicyEngine, TransitionPolicy};
use crate::store::{TierSet, TierStore};

/// One record that could not be moved.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionFailure {
    pub id: RecordId,
    pub tier: TierLocation,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Result of one transition pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionReport {
    /// Evaluation time used for every age check in the pass
    pub evaluated_at: DateTime<Utc>,

    /// Records moved, per (source, destination)
    pub moved: BTreeMap<(TierLocation, TierLocation), usize>,

    /// Records examined across all tiers
    pub examined: usize,

    /// Records not yet old enough
    pub not_eligible: usize,

    /// Listed records that were gone by the time they were processed
    pub vanished: usize,

    pub failures: Vec<TransitionFailure>,
}

impl TransitionReport {
    fn new(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            evaluated_at,
            moved: BTreeMap::new(),
            examined: 0,
            not_eligible: 0,
            vanished: 0,
            failures: Vec::new(),
        }
    }

    pub fn moved_between(&self, from: TierLocation, to: TierLocation) -> usize {
        self.moved.get(&(from, to)).copied().unwrap_or(0)
    }

    pub fn total_moved(&self) -> usize {
        self.moved.values().sum()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Failures grouped by classification.
    pub fn failures_by_kind(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.kind).or_insert(0) += 1;
        }
        counts
    }
}

enum Step {
    Moved,
    NotEligible,
    Vanished,
}

/// Moves eligible records down the tier chain.
pub struct TransitionExecutor {
    tiers: TierSet,
    locks: Arc<KeyLocks>,
    journal: Arc<TransitJournal>,
    policies: PolicyEngine,
    concurrency: usize,
    // Passes never overlap; a scheduled tick and a manual pass queue up.
    pass_lock: Mutex<()>,
}

impl TransitionExecutor {
    pub fn new(
        tiers: TierSet,
        locks: Arc<KeyLocks>,
        journal: Arc<TransitJournal>,
        policies: PolicyEngine,
        concurrency: usize,
    ) -> Self {
        Self {
            tiers,
            locks,
            journal,
            policies,
            concurrency: concurrency.max(1),
            pass_lock: Mutex::new(()),
        }
    }

    /// Run one full pass evaluated at `now`.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> TransitionReport {
        let _pass = self.pass_lock.lock().await;
        let mut report = TransitionReport::new(now);

        for policy in self.policies.policies() {
            let (Some(source), Some(destination)) = (
                self.tiers.get(policy.source),
                self.tiers.get(policy.destination),
            ) else {
                warn!(
                    from = %policy.source,
                    to = %policy.destination,
                    "Skipping policy between non-lifecycle tiers"
                );
                continue;
            };

            let ids = source.list_ids().await;
            debug!(tier = %policy.source, candidates = ids.len(), "Evaluating tier");

            let outcomes: Vec<(RecordId, Result<Step>)> = stream::iter(ids)
                .map(|id| async move {
                    let outcome = self
                        .transition_one(&id, policy, source.as_ref(), destination.as_ref(), now)
                        .await;
                    (id, outcome)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for (id, outcome) in outcomes {
                report.examined += 1;
                match outcome {
                    Ok(Step::Moved) => {
                        *report
                            .moved
                            .entry((policy.source, policy.destination))
                            .or_insert(0) += 1;
                        tierhouse_observability::metrics::TRANSITIONS_TOTAL
                            .with_label_values(&[
                                policy.source.dir_name(),
                                policy.destination.dir_name(),
                            ])
                            .inc();
                    }
                    Ok(Step::NotEligible) => report.not_eligible += 1,
                    Ok(Step::Vanished) => report.vanished += 1,
                    Err(e) => {
                        let kind = e.kind();
                        warn!(
                            record_id = %id,
                            tier = %policy.source,
                            kind = %kind,
                            error = %e,
                            "Transition failed, record left in place"
                        );
                        tierhouse_observability::metrics::TRANSITION_FAILURES_TOTAL
                            .with_label_values(&[policy.source.dir_name(), kind.as_str()])
                            .inc();
                        report.failures.push(TransitionFailure {
                            id,
                            tier: policy.source,
                            kind,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            moved = report.total_moved(),
            hot_to_cool = report.moved_between(TierLocation::Hot, TierLocation::Cool),
            cool_to_archive = report.moved_between(TierLocation::Cool, TierLocation::Archive),
            not_eligible = report.not_eligible,
            vanished = report.vanished,
            failed = report.failed(),
            "Transition pass complete"
        );
        report
    }

    async fn transition_one(
        &self,
        id: &RecordId,
        policy: &TransitionPolicy,
        source: &dyn TierStore,
        destination: &dyn TierStore,
        now: DateTime<Utc>,
    ) -> Result<Step> {
        let _guard = self.locks.lock(id).await;

        let stored = match source.read(id).await {
            Ok(stored) => stored,
            Err(Error::MissingFromTier { .. }) => {
                debug!(record_id = %id, tier = %policy.source, "Record moved since listing");
                return Ok(Step::Vanished);
            }
            Err(e) => return Err(e),
        };

        if !policy.is_eligible(&stored.record, now) {
            return Ok(Step::NotEligible);
        }

        self.journal
            .begin(&TransitMarker {
                id: id.clone(),
                from: policy.source,
                to: policy.destination,
                compression: policy.destination_compression,
                started_at: Utc::now(),
            })
            .await?;

        if let Err(e) = destination
            .write(&stored.record, policy.destination_compression)
            .await
        {
            // Nothing landed in the destination; the move never happened.
            if let Err(clear) = self.journal.complete(id).await {
                warn!(record_id = %id, error = %clear, "Failed to clear transit marker");
            }
            return Err(e);
        }

        // A failed delete keeps the marker; the next pass or the next open finishes the move.
        source.delete(id).await?;

        if let Err(e) = self.journal.complete(id).await {
            warn!(record_id = %id, error = %e, "Move finished but transit marker not cleared");
        }

        info!(
            record_id = %id,
            from = %policy.source,
            to = %policy.destination,
            compression = ?policy.destination_compression.map(|l| l.get()),
            "Record transitioned"
        );
        Ok(Step::Moved)
    }
}
