//! Tiering Configuration
//!
//! This module defines the configuration value handed to [`crate::TierEngine`]
//! and every component it builds. Nothing reads global state: thresholds,
//! compression levels and rehydration latencies all arrive through this struct.
//!
//! ## TieringConfig
//!
//! - **data_dir**: root directory; each tier gets a sub-directory (default: `./data`)
//! - **hot_to_cool_months**: age at which Hot records demote (default: 3)
//! - **cool_to_archive_months**: age at which Cool records demote, measured from
//!   issuance, not time-in-tier (default: 12)
//! - **cool_compression_level** / **archive_compression_level**: gzip levels (defaults: 5 / 9)
//! - **expedited_latency** / **standard_latency**: simulated restore delays (defaults: 5s / 15s)
//! - **rehydrated_cache_max_bytes**: LRU bound for rehydrated copies (default: 64MB)
//! - **serve_rehydrated_copies**: serve an existing rehydrated copy instead of restoring again
//! - **transition_concurrency**: records moved concurrently per store during a pass (default: 8)
//! - **schedule_interval**: tick of the background transition scheduler (default: 60s)
//!
//! ## Usage
//!
//! ```ignore
//! use tierhouse_storage::TieringConfig;
//!
//! let config = TieringConfig {
//!     data_dir: "/var/lib/tierhouse".into(),
//!     expedited_latency: Duration::from_millis(500),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tierhouse_core::{CompressionLevel, Priority, TierLocation};

use crate::error::{Error, Result};
use crate::policy::TransitionPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieringConfig {
    /// Root directory for all tiers (default: ./data)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Age in months at which Hot records move to Cool (default: 3)
    #[serde(default = "default_hot_to_cool_months")]
    pub hot_to_cool_months: f64,

    /// Age in months at which Cool records move to Archive (default: 12)
    #[serde(default = "default_cool_to_archive_months")]
    pub cool_to_archive_months: f64,

    /// gzip level for the Cool tier (default: 5)
    #[serde(default = "default_cool_compression_level")]
    pub cool_compression_level: CompressionLevel,

    /// gzip level for the Archive tier (default: 9)
    #[serde(default = "default_archive_compression_level")]
    pub archive_compression_level: CompressionLevel,

    /// Simulated delay for expedited rehydration (default: 5s)
    #[serde(default = "default_expedited_latency", with = "duration_ms")]
    pub expedited_latency: Duration,

    /// Simulated delay for standard rehydration (default: 15s)
    #[serde(default = "default_standard_latency", with = "duration_ms")]
    pub standard_latency: Duration,

    /// Size bound for the rehydrated cache in bytes (default: 64MB)
    #[serde(default = "default_rehydrated_cache_max_bytes")]
    pub rehydrated_cache_max_bytes: u64,

    /// Serve an already rehydrated copy without a new restore delay (default: true)
    #[serde(default = "default_serve_rehydrated_copies")]
    pub serve_rehydrated_copies: bool,

    /// Records processed concurrently within one store during a pass (default: 8)
    #[serde(default = "default_transition_concurrency")]
    pub transition_concurrency: usize,

    /// Interval between scheduled transition passes (default: 60s)
    #[serde(default = "default_schedule_interval", with = "duration_ms")]
    pub schedule_interval: Duration,
}

impl Default for TieringConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            hot_to_cool_months: default_hot_to_cool_months(),
            cool_to_archive_months: default_cool_to_archive_months(),
            cool_compression_level: default_cool_compression_level(),
            archive_compression_level: default_archive_compression_level(),
            expedited_latency: default_expedited_latency(),
            standard_latency: default_standard_latency(),
            rehydrated_cache_max_bytes: default_rehydrated_cache_max_bytes(),
            serve_rehydrated_copies: default_serve_rehydrated_copies(),
            transition_concurrency: default_transition_concurrency(),
            schedule_interval: default_schedule_interval(),
        }
    }
}

impl TieringConfig {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, months) in [
            ("hot_to_cool_months", self.hot_to_cool_months),
            ("cool_to_archive_months", self.cool_to_archive_months),
        ] {
            if !months.is_finite() || months < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, months
                )));
            }
        }
        if self.cool_to_archive_months < self.hot_to_cool_months {
            return Err(Error::InvalidConfig(format!(
                "cool_to_archive_months ({}) must not be below hot_to_cool_months ({})",
                self.cool_to_archive_months, self.hot_to_cool_months
            )));
        }
        if self.expedited_latency >= self.standard_latency {
            return Err(Error::InvalidConfig(format!(
                "expedited_latency ({:?}) must be strictly shorter than standard_latency ({:?})",
                self.expedited_latency, self.standard_latency
            )));
        }
        if self.transition_concurrency == 0 {
            return Err(Error::InvalidConfig(
                "transition_concurrency must be at least 1".to_string(),
            ));
        }
        if self.schedule_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "schedule_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding a tier's payloads.
    pub fn tier_dir(&self, tier: TierLocation) -> PathBuf {
        self.data_dir.join(tier.dir_name())
    }

    /// Directory holding in-transit markers.
    pub fn transit_dir(&self) -> PathBuf {
        self.data_dir.join("transit")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Simulated restore delay for a priority.
    pub fn latency_for(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Expedited => self.expedited_latency,
            Priority::Standard => self.standard_latency,
        }
    }

    /// Compression applied when a record is written into `tier`.
    pub fn compression_for(&self, tier: TierLocation) -> Option<CompressionLevel> {
        match tier {
            TierLocation::Hot | TierLocation::RehydratedCache => None,
            TierLocation::Cool => Some(self.cool_compression_level),
            TierLocation::Archive => Some(self.archive_compression_level),
        }
    }

    /// The active outgoing policies, hottest source first.
    pub fn policies(&self) -> Vec<TransitionPolicy> {
        vec![
            TransitionPolicy {
                source: TierLocation::Hot,
                destination: TierLocation::Cool,
                age_threshold_months: self.hot_to_cool_months,
                destination_compression: self.compression_for(TierLocation::Cool),
            },
            TransitionPolicy {
                source: TierLocation::Cool,
                destination: TierLocation::Archive,
                age_threshold_months: self.cool_to_archive_months,
                destination_compression: self.compression_for(TierLocation::Archive),
            },
        ]
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_hot_to_cool_months() -> f64 {
    3.0
}

fn default_cool_to_archive_months() -> f64 {
    12.0
}

fn default_cool_compression_level() -> CompressionLevel {
    CompressionLevel::new(5).unwrap_or(CompressionLevel::BEST)
}

fn default_archive_compression_level() -> CompressionLevel {
    CompressionLevel::BEST
}

fn default_expedited_latency() -> Duration {
    Duration::from_secs(5)
}

fn default_standard_latency() -> Duration {
    Duration::from_secs(15)
}

fn default_rehydrated_cache_max_bytes() -> u64 {
    64 * 1024 * 1024 // 64MB
}

fn default_serve_rehydrated_copies() -> bool {
    true
}

fn default_transition_concurrency() -> usize {
    8
}

fn default_schedule_interval() -> Duration {
    Duration::from_secs(60)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
