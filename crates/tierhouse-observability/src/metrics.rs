use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Once;

static INIT: Once = Once::new();

lazy_static! {
    /// Global Prometheus metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Ingestion Metrics
    // ============================================================================

    /// Records accepted into the Hot tier
    pub static ref RECORDS_INGESTED_TOTAL: IntCounter = IntCounter::new(
        "tierhouse_records_ingested_total",
        "Total records ingested into the hot tier"
    ).expect("metric can be created");

    // ============================================================================
    // Transition Metrics
    // ============================================================================

    /// Completed tier moves
    pub static ref TRANSITIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tierhouse_transitions_total", "Total records moved between tiers"),
        &["from", "to"]
    ).expect("metric can be created");

    /// Per-record transition failures
    pub static ref TRANSITION_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tierhouse_transition_failures_total", "Total per-record transition failures"),
        &["tier", "kind"] // kind: corrupt_record, io, ...
    ).expect("metric can be created");

    /// Transit markers replayed at startup
    pub static ref TRANSIT_RECOVERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tierhouse_transit_recoveries_total", "Total in-transit markers recovered at startup"),
        &["outcome"] // completed, rolled_back
    ).expect("metric can be created");

    // ============================================================================
    // Retrieval Metrics
    // ============================================================================

    /// Successful retrievals by serving location
    pub static ref RETRIEVALS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tierhouse_retrievals_total", "Total successful retrievals"),
        &["tier"]
    ).expect("metric can be created");

    /// Failed retrievals
    pub static ref RETRIEVAL_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tierhouse_retrieval_errors_total", "Total failed retrievals"),
        &["kind"]
    ).expect("metric can be created");

    // ============================================================================
    // Rehydration Metrics
    // ============================================================================

    /// Rehydrations started (one per coalesced group)
    pub static ref REHYDRATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tierhouse_rehydrations_total", "Total rehydrations started"),
        &["priority"]
    ).expect("metric can be created");

    /// Requests that joined an in-flight rehydration
    pub static ref REHYDRATIONS_COALESCED_TOTAL: IntCounter = IntCounter::new(
        "tierhouse_rehydrations_coalesced_total",
        "Total retrievals that awaited an in-flight rehydration"
    ).expect("metric can be created");

    /// End-to-end rehydration time, including the simulated delay
    pub static ref REHYDRATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("tierhouse_rehydration_seconds", "Rehydration duration in seconds")
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0]),
        &["priority"]
    ).expect("metric can be created");

    /// Rehydrated copies that could not be written to the cache
    pub static ref REHYDRATED_CACHE_WRITE_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "tierhouse_rehydrated_cache_write_failures_total",
        "Total failed writes into the rehydrated cache"
    ).expect("metric can be created");

    /// Bytes held by the rehydrated cache
    pub static ref REHYDRATED_CACHE_BYTES: IntGauge = IntGauge::new(
        "tierhouse_rehydrated_cache_bytes",
        "Current size of the rehydrated cache in bytes"
    ).expect("metric can be created");
}

/// Initialize metrics registry
/// Can be called multiple times safely (idempotent)
pub fn init() {
    INIT.call_once(|| {
        // Ingestion metrics
        REGISTRY
            .register(Box::new(RECORDS_INGESTED_TOTAL.clone()))
            .expect("records_ingested_total can be registered");

        // Transition metrics
        REGISTRY
            .register(Box::new(TRANSITIONS_TOTAL.clone()))
            .expect("transitions_total can be registered");
        REGISTRY
            .register(Box::new(TRANSITION_FAILURES_TOTAL.clone()))
            .expect("transition_failures_total can be registered");
        REGISTRY
            .register(Box::new(TRANSIT_RECOVERIES_TOTAL.clone()))
            .expect("transit_recoveries_total can be registered");

        // Retrieval metrics
        REGISTRY
            .register(Box::new(RETRIEVALS_TOTAL.clone()))
            .expect("retrievals_total can be registered");
        REGISTRY
            .register(Box::new(RETRIEVAL_ERRORS_TOTAL.clone()))
            .expect("retrieval_errors_total can be registered");

        // Rehydration metrics
        REGISTRY
            .register(Box::new(REHYDRATIONS_TOTAL.clone()))
            .expect("rehydrations_total can be registered");
        REGISTRY
            .register(Box::new(REHYDRATIONS_COALESCED_TOTAL.clone()))
            .expect("rehydrations_coalesced_total can be registered");
        REGISTRY
            .register(Box::new(REHYDRATION_SECONDS.clone()))
            .expect("rehydration_seconds can be registered");
        REGISTRY
            .register(Box::new(REHYDRATED_CACHE_WRITE_FAILURES_TOTAL.clone()))
            .expect("rehydrated_cache_write_failures_total can be registered");
        REGISTRY
            .register(Box::new(REHYDRATED_CACHE_BYTES.clone()))
            .expect("rehydrated_cache_bytes can be registered");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        init();
        // If no panic, registration succeeded
    }

    #[test]
    fn test_transition_metrics() {
        TRANSITIONS_TOTAL.with_label_values(&["hot", "cool"]).inc();
        TRANSITIONS_TOTAL.with_label_values(&["hot", "cool"]).inc_by(2);

        assert_eq!(TRANSITIONS_TOTAL.with_label_values(&["hot", "cool"]).get(), 3);
    }

    #[test]
    fn test_rehydration_histogram() {
        REHYDRATION_SECONDS.with_label_values(&["expedited"]).observe(5.0);
        assert_eq!(
            REHYDRATION_SECONDS
                .with_label_values(&["expedited"])
                .get_sample_count(),
            1
        );
    }

    #[test]
    fn test_cache_gauge() {
        REHYDRATED_CACHE_BYTES.set(4096);
        assert_eq!(REHYDRATED_CACHE_BYTES.get(), 4096);
    }
}
