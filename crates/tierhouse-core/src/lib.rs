//! Tierhouse core types.
//!
//! Shared vocabulary for every Tierhouse crate: the immutable [`Record`],
//! validated identifiers, tier locations and compression levels. Nothing in
//! this crate performs I/O.

pub mod error;
pub mod id;
pub mod record;
pub mod tier;

pub use error::{Error, Result};
pub use id::RecordId;
pub use record::{LineItem, Record};
pub use tier::{CompressionLevel, Priority, TierLocation};
