//! Transit Journal
//!
//! Two-phase handoff for tier moves. Before a record is written to its
//! destination, a marker naming the source and destination is persisted. The
//! marker is cleared only after the source copy has been deleted, so a crash
//! anywhere in between leaves evidence behind.
//!
//! ## Recovery
//!
//! Markers found when the engine opens are replayed before anything else runs:
//!
//! | Destination holds the record? | Action                                   | Outcome      |
//! |-------------------------------|------------------------------------------|--------------|
//! | yes                           | delete the source copy if still present  | `completed`  |
//! | no                            | drop the marker, source stays in place   | `rolled_back`|
//!
//! Destination writes are atomic renames, so a present destination payload is
//! always a complete one. A rolled-back record is simply re-evaluated by the
//! next transition pass.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tierhouse_core::{CompressionLevel, RecordId, TierLocation};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::TierSet;

/// Persisted evidence of an in-progress move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitMarker {
    pub id: RecordId,
    pub from: TierLocation,
    pub to: TierLocation,
    pub compression: Option<CompressionLevel>,
    pub started_at: DateTime<Utc>,
}

/// Outcome of replaying leftover markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Moves finished by deleting the remaining source copy
    pub completed: usize,

    /// Moves abandoned because the destination write never landed
    pub rolled_back: usize,

    /// Markers left in place because recovery itself failed; retried on next open
    pub deferred: usize,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.completed == 0 && self.rolled_back == 0 && self.deferred == 0
    }
}

/// Directory of transit markers, one file per identifier.
pub struct TransitJournal {
    directory: PathBuf,
}

impl TransitJournal {
    pub async fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&directory).await?;
        Ok(Self { directory })
    }

    fn marker_path(&self, id: &RecordId) -> PathBuf {
        self.directory.join(format!("{}.json", id))
    }

    fn tmp_path(&self, id: &RecordId) -> PathBuf {
        self.directory.join(format!("{}.json.tmp", id))
    }

    /// Persist a marker. Must succeed before the destination write starts.
    pub async fn begin(&self, marker: &TransitMarker) -> Result<()> {
        let data = serde_json::to_vec(marker)
            .map_err(|e| Error::InvalidInput(format!("unserializable transit marker: {}", e)))?;

        let tmp = self.tmp_path(&marker.id);
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, self.marker_path(&marker.id)).await?;

        debug!(
            record_id = %marker.id,
            from = %marker.from,
            to = %marker.to,
            "Transit marker written"
        );
        Ok(())
    }

    /// Clear a marker once the source copy is gone.
    pub async fn complete(&self, id: &RecordId) -> Result<()> {
        match tokio::fs::remove_file(self.marker_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// All markers currently on disk. Unreadable markers are discarded.
    pub async fn pending(&self) -> Result<Vec<TransitMarker>> {
        let mut markers = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.directory).await?;

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".tmp") {
                let _ = tokio::fs::remove_file(entry.path()).await;
                continue;
            }
            if !name.ends_with(".json") {
                continue;
            }

            let data = tokio::fs::read(entry.path()).await?;
            match serde_json::from_slice::<TransitMarker>(&data) {
                Ok(marker) => markers.push(marker),
                Err(e) => {
                    warn!(file = %name, error = %e, "Discarding unreadable transit marker");
                    let _ = tokio::fs::remove_file(entry.path()).await;
                }
            }
        }

        Ok(markers)
    }

    /// Replay every pending marker against `tiers`.
    pub async fn recover(&self, tiers: &TierSet) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for marker in self.pending().await? {
            match self.replay(&marker, tiers).await {
                Ok(outcome) => {
                    self.complete(&marker.id).await?;
                    match outcome {
                        Replay::Completed => report.completed += 1,
                        Replay::RolledBack => report.rolled_back += 1,
                    }
                    tierhouse_observability::metrics::TRANSIT_RECOVERIES_TOTAL
                        .with_label_values(&[outcome.as_str()])
                        .inc();
                    info!(
                        record_id = %marker.id,
                        from = %marker.from,
                        to = %marker.to,
                        outcome = outcome.as_str(),
                        "Recovered in-transit record"
                    );
                }
                Err(e) => {
                    report.deferred += 1;
                    tierhouse_observability::metrics::TRANSIT_RECOVERIES_TOTAL
                        .with_label_values(&["deferred"])
                        .inc();
                    warn!(
                        record_id = %marker.id,
                        error = %e,
                        "Transit recovery failed, marker kept"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn replay(&self, marker: &TransitMarker, tiers: &TierSet) -> Result<Replay> {
        let unknown = |tier: TierLocation| {
            Error::InvalidInput(format!(
                "transit marker for {} names non-lifecycle tier {}",
                marker.id, tier
            ))
        };
        let source = tiers.get(marker.from).ok_or_else(|| unknown(marker.from))?;
        let destination = tiers.get(marker.to).ok_or_else(|| unknown(marker.to))?;

        if !destination.exists(&marker.id).await {
            return Ok(Replay::RolledBack);
        }

        if source.exists(&marker.id).await {
            match source.delete(&marker.id).await {
                Ok(()) | Err(Error::MissingFromTier { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Replay::Completed)
    }
}

#[derive(Debug, Clone, Copy)]
enum Replay {
    Completed,
    RolledBack,
}

impl Replay {
    fn as_str(&self) -> &'static str {
        match self {
            Replay::Completed => "completed",
            Replay::RolledBack => "rolled_back",
        }
    }
}
