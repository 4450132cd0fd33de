//! Storage Error Types
//!
//! This module defines all error types that can occur during tier operations.
//!
//! ## Error Categories
//!
//! ### Lookup Errors
//! - `NotFound`: identifier absent from Hot, Cool and Archive at retrieval time
//! - `MissingFromTier`: a single store does not hold the identifier
//!
//! ### Data Errors
//! - `CorruptRecord`: stored payload does not decode to a usable record
//!
//! ### I/O Errors
//! - `Io`: underlying read/write/delete/rename failure
//!
//! ### Rehydration Errors
//! - `Rehydration`: simulated restore or decompression failed
//! - `Timeout`: caller-supplied retrieval deadline expired
//!
//! ## Propagation
//!
//! Inside a transition pass every per-record error is caught, classified with
//! [`Error::kind`] and aggregated into the pass report. A single retrieval
//! returns its error directly to the caller. None of these are fatal to the
//! process.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tierhouse_core::{RecordId, TierLocation};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Record not found in any tier: {0}")]
    NotFound(RecordId),

    #[error("Record {id} is not present in the {tier} tier")]
    MissingFromTier { id: RecordId, tier: TierLocation },

    #[error("Corrupt record {id} in {tier} tier: {reason}")]
    CorruptRecord {
        id: RecordId,
        tier: TierLocation,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rehydration of {id} failed: {reason}")]
    Rehydration { id: RecordId, reason: String },

    #[error("Retrieval of {id} timed out after {after:?}")]
    Timeout { id: RecordId, after: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Core(#[from] tierhouse_core::Error),
}

/// Coarse classification used by reports and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    CorruptRecord,
    Io,
    Rehydration,
    Timeout,
    Config,
    InvalidInput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::CorruptRecord => "corrupt_record",
            ErrorKind::Io => "io",
            ErrorKind::Rehydration => "rehydration",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Config => "config",
            ErrorKind::InvalidInput => "invalid_input",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            // A store-level absence is the "IOError if absent" case of the store contract.
            Error::MissingFromTier { .. } | Error::Io(_) => ErrorKind::Io,
            Error::CorruptRecord { .. } => ErrorKind::CorruptRecord,
            Error::Rehydration { .. } => ErrorKind::Rehydration,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::InvalidConfig(_) => ErrorKind::Config,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Core(tierhouse_core::Error::Io(_)) => ErrorKind::Io,
            Error::Core(tierhouse_core::Error::Decode(_))
            | Error::Core(tierhouse_core::Error::Compression(_)) => ErrorKind::CorruptRecord,
            Error::Core(_) => ErrorKind::InvalidInput,
        }
    }

    pub(crate) fn corrupt(id: &RecordId, tier: TierLocation, err: impl std::fmt::Display) -> Self {
        Error::CorruptRecord {
            id: id.clone(),
            tier,
            reason: err.to_string(),
        }
    }
}
