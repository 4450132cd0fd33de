//! Tier Policy Engine
//!
//! Decides whether a record is old enough to leave its tier. Age is measured
//! from the record's `issued_at`, never from when it was ingested or when it
//! entered its current tier, so Cool -> Archive uses cumulative age.
//!
//! ## Age
//!
//! | Unit  | Length                                   |
//! |-------|------------------------------------------|
//! | month | 30.44 days = 2,630,016 s = 2,630,016,000 ms |
//!
//! Ages are fractional and computed at millisecond precision. Eligibility is
//! inclusive: a record exactly at the threshold moves, one second younger
//! does not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tierhouse_core::{CompressionLevel, Record, TierLocation};

/// Average month length used for age computation, in milliseconds.
pub const MS_PER_MONTH: i64 = 2_630_016_000;

/// Outgoing rule for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionPolicy {
    pub source: TierLocation,
    pub destination: TierLocation,
    pub age_threshold_months: f64,
    /// Compression applied when writing into `destination`
    pub destination_compression: Option<CompressionLevel>,
}

impl TransitionPolicy {
    pub fn is_eligible(&self, record: &Record, now: DateTime<Utc>) -> bool {
        is_eligible_at(record.issued_at, self.age_threshold_months, now)
    }
}

/// Elapsed months between `issued_at` and `now`. Negative for future issuance.
pub fn age_months(issued_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    elapsed_ms(issued_at, now) as f64 / MS_PER_MONTH as f64
}

/// Inclusive threshold check.
///
/// Compares milliseconds rather than fractional months so that whole-month
/// thresholds land exactly on their boundary.
pub fn is_eligible_at(issued_at: DateTime<Utc>, threshold_months: f64, now: DateTime<Utc>) -> bool {
    elapsed_ms(issued_at, now) as f64 >= threshold_months * MS_PER_MONTH as f64
}

fn elapsed_ms(issued_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(issued_at).num_milliseconds()
}

/// The set of active outgoing policies, at most one per source tier.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    policies: Vec<TransitionPolicy>,
}

impl PolicyEngine {
    pub fn new(mut policies: Vec<TransitionPolicy>) -> Self {
        policies.sort_by_key(|p| p.source.tier_order());
        policies.dedup_by_key(|p| p.source);
        Self { policies }
    }

    /// Outgoing policy for `source`, if it has one.
    pub fn policy_for(&self, source: TierLocation) -> Option<&TransitionPolicy> {
        self.policies.iter().find(|p| p.source == source)
    }

    /// Policies in evaluation order, hottest source first.
    pub fn policies(&self) -> &[TransitionPolicy] {
        &self.policies
    }

    /// The policy `record` satisfies while stored in `source`, if any.
    ///
    /// A store is only ever evaluated against its own outgoing policy.
    pub fn evaluate(
        &self,
        record: &Record,
        source: TierLocation,
        now: DateTime<Utc>,
    ) -> Option<&TransitionPolicy> {
        self.policy_for(source)
            .filter(|policy| policy.is_eligible(record, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tierhouse_core::RecordId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn record_issued(issued_at: DateTime<Utc>) -> Record {
        Record::new(
            RecordId::billing(1),
            "CUST-001",
            issued_at,
            101.23,
            "USD",
            "Cloud services",
            vec![],
        )
    }

    fn engine() -> PolicyEngine {
        PolicyEngine::new(vec![
            TransitionPolicy {
                source: TierLocation::Cool,
                destination: TierLocation::Archive,
                age_threshold_months: 12.0,
                destination_compression: Some(CompressionLevel::BEST),
            },
            TransitionPolicy {
                source: TierLocation::Hot,
                destination: TierLocation::Cool,
                age_threshold_months: 3.0,
                destination_compression: CompressionLevel::new(5).ok(),
            },
        ])
    }

    // Test 1: Month length
    #[test]
    fn test_one_month_is_30_44_days() {
        let issued = now() - Duration::milliseconds(MS_PER_MONTH);
        assert_eq!(age_months(issued, now()), 1.0);
        assert_eq!(MS_PER_MONTH, (30.44_f64 * 86_400_000.0).round() as i64);
    }

    // Test 2: Fractional ages
    #[test]
    fn test_age_is_fractional() {
        let age = age_months(now() - Duration::days(100), now());
        assert!((age - 100.0 / 30.44).abs() < 1e-9);
        assert!(age_months(now() + Duration::days(1), now()) < 0.0);
    }

    // Test 3: Exact threshold is eligible, one second short is not
    #[test]
    fn test_boundary_is_inclusive() {
        let exact = now() - Duration::milliseconds(3 * MS_PER_MONTH);
        assert!(is_eligible_at(exact, 3.0, now()));

        let short = exact + Duration::seconds(1);
        assert!(!is_eligible_at(short, 3.0, now()));
    }

    // Test 4: Zero threshold admits anything not issued in the future
    #[test]
    fn test_zero_threshold() {
        assert!(is_eligible_at(now(), 0.0, now()));
        assert!(!is_eligible_at(now() + Duration::seconds(1), 0.0, now()));
    }

    // Test 5: Policies sorted hottest first
    #[test]
    fn test_engine_orders_policies() {
        let engine = engine();
        let sources: Vec<_> = engine.policies().iter().map(|p| p.source).collect();
        assert_eq!(sources, vec![TierLocation::Hot, TierLocation::Cool]);
        assert!(engine.policy_for(TierLocation::Archive).is_none());
    }

    // Test 6: Each tier only uses its own policy
    #[test]
    fn test_evaluate_uses_source_policy() {
        let engine = engine();
        let record = record_issued(now() - Duration::days(100));

        let policy = engine.evaluate(&record, TierLocation::Hot, now()).unwrap();
        assert_eq!(policy.destination, TierLocation::Cool);

        // 100 days is well short of the Cool threshold
        assert!(engine.evaluate(&record, TierLocation::Cool, now()).is_none());
        assert!(engine.evaluate(&record, TierLocation::Archive, now()).is_none());
    }

    // Test 7: Cool threshold measured from issuance
    #[test]
    fn test_cool_threshold_is_cumulative() {
        let engine = engine();
        let record = record_issued(now() - Duration::days(400));
        let policy = engine.evaluate(&record, TierLocation::Cool, now()).unwrap();
        assert_eq!(policy.destination, TierLocation::Archive);
        assert_eq!(policy.destination_compression, Some(CompressionLevel::BEST));
    }
}
