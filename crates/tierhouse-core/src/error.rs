//! Error Types for Tierhouse
//!
//! This module defines the errors raised by the core record types and by the
//! record codec built on top of them.
//!
//! ## Error Categories
//!
//! ### I/O Errors
//! - Reading or writing a compression stream
//!
//! ### Data Integrity Errors
//! - `Decode`: a payload is not a well-formed record (corrupt or truncated)
//! - `Compression`: the gzip filter rejected the payload
//!
//! ### Validation Errors
//! - `InvalidRecord`: a record failed ingestion-time validation
//! - `InvalidIdentifier`: an identifier is empty or not filesystem safe
//! - `InvalidCompressionLevel`: a level outside 0..=9
//! - `InvalidPriority`: an unrecognised rehydration priority name
//!
//! ## Usage
//! All functions in Tierhouse return `Result<T>` which is aliased to `Result<T, Error>`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid compression level: {0} (expected 0-9)")]
    InvalidCompressionLevel(u32),

    #[error("Unknown priority: {0:?}")]
    InvalidPriority(String),
}

pub type Result<T> = std::result::Result<T, Error>;
