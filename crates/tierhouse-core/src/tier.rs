//! Tier locations, compression levels and rehydration priorities.
//!
//! ## Tier Overview
//!
//! | Tier            | Payload           | Lifecycle stage |
//! |-----------------|-------------------|-----------------|
//! | Hot             | plain JSON        | yes             |
//! | Cool            | gzip (mid level)  | yes             |
//! | Archive         | gzip (max level)  | yes             |
//! | RehydratedCache | plain JSON        | no, disposable  |
//!
//! Records only ever move Hot -> Cool -> Archive. The rehydrated cache is an
//! overlay populated from Archive and never counts as the authoritative copy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where a record (or a copy of it) lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierLocation {
    Hot,
    Cool,
    Archive,
    RehydratedCache,
}

impl TierLocation {
    /// The three lifecycle tiers, hottest first. This is also the retrieval probe order.
    pub const LIFECYCLE: [TierLocation; 3] =
        [TierLocation::Hot, TierLocation::Cool, TierLocation::Archive];

    /// The tier a record demotes to, if any.
    pub fn next(&self) -> Option<TierLocation> {
        match self {
            TierLocation::Hot => Some(TierLocation::Cool),
            TierLocation::Cool => Some(TierLocation::Archive),
            TierLocation::Archive | TierLocation::RehydratedCache => None,
        }
    }

    /// Directory name used under the data root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            TierLocation::Hot => "hot",
            TierLocation::Cool => "cool",
            TierLocation::Archive => "archive",
            TierLocation::RehydratedCache => "rehydrated",
        }
    }

    /// Ordering index for comparison (lower = hotter).
    pub fn tier_order(&self) -> u8 {
        match self {
            TierLocation::Hot => 0,
            TierLocation::Cool => 1,
            TierLocation::Archive => 2,
            TierLocation::RehydratedCache => 3,
        }
    }
}

impl fmt::Display for TierLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierLocation::Hot => write!(f, "hot"),
            TierLocation::Cool => write!(f, "cool"),
            TierLocation::Archive => write!(f, "archive"),
            TierLocation::RehydratedCache => write!(f, "rehydrated"),
        }
    }
}

/// A gzip compression level in `0..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    pub const FASTEST: CompressionLevel = CompressionLevel(1);
    pub const BEST: CompressionLevel = CompressionLevel(9);

    pub fn new(level: u32) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidCompressionLevel(level));
        }
        Ok(Self(level))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for CompressionLevel {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CompressionLevel> for u32 {
    fn from(level: CompressionLevel) -> Self {
        level.0
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rehydration service class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Faster, costlier restore
    Expedited,
    /// Slower, cheaper restore
    #[default]
    Standard,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Expedited => write!(f, "expedited"),
            Priority::Standard => write!(f, "standard"),
        }
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "expedited" | "high" => Ok(Priority::Expedited),
            "standard" | "normal" => Ok(Priority::Standard),
            _ => Err(Error::InvalidPriority(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_chain_is_one_directional() {
        assert_eq!(TierLocation::Hot.next(), Some(TierLocation::Cool));
        assert_eq!(TierLocation::Cool.next(), Some(TierLocation::Archive));
        assert_eq!(TierLocation::Archive.next(), None);
        assert_eq!(TierLocation::RehydratedCache.next(), None);

        for tier in TierLocation::LIFECYCLE {
            if let Some(next) = tier.next() {
                assert!(next.tier_order() > tier.tier_order());
            }
        }
    }

    #[test]
    fn test_rehydrated_cache_is_not_a_stage() {
        assert!(!TierLocation::LIFECYCLE.contains(&TierLocation::RehydratedCache));
    }

    #[test]
    fn test_tier_display_matches_dir_name() {
        for tier in [
            TierLocation::Hot,
            TierLocation::Cool,
            TierLocation::Archive,
            TierLocation::RehydratedCache,
        ] {
            assert_eq!(tier.to_string(), tier.dir_name());
        }
    }

    #[test]
    fn test_compression_level_bounds() {
        assert_eq!(CompressionLevel::new(0).unwrap().get(), 0);
        assert_eq!(CompressionLevel::new(9).unwrap(), CompressionLevel::BEST);
        assert!(matches!(
            CompressionLevel::new(10),
            Err(Error::InvalidCompressionLevel(10))
        ));
    }

    #[test]
    fn test_compression_level_serde() {
        let level: CompressionLevel = serde_json::from_str("5").unwrap();
        assert_eq!(level.get(), 5);
        assert!(serde_json::from_str::<CompressionLevel>("12").is_err());
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!("expedited".parse::<Priority>().unwrap(), Priority::Expedited);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::Expedited);
        assert_eq!("standard".parse::<Priority>().unwrap(), Priority::Standard);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::default(), Priority::Standard);
    }
}
