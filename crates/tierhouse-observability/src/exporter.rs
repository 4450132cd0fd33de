use prometheus::{Encoder, TextEncoder};

use crate::metrics::REGISTRY;

/// Render every registered metric in the Prometheus text exposition format.
pub fn gather_text() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics;

    #[test]
    fn test_gather_text_contains_lifecycle_metrics() {
        metrics::init();
        metrics::RECORDS_INGESTED_TOTAL.inc();
        metrics::TRANSITIONS_TOTAL
            .with_label_values(&["cool", "archive"])
            .inc();

        let text = gather_text().unwrap();
        assert!(text.contains("tierhouse_records_ingested_total"));
        assert!(text.contains("tierhouse_transitions_total{from=\"cool\",to=\"archive\"}"));
    }

    #[test]
    fn test_gather_text_has_help_lines() {
        metrics::init();
        let text = gather_text().unwrap();
        assert!(text.contains("# HELP tierhouse_records_ingested_total"));
        assert!(text.contains("# TYPE tierhouse_records_ingested_total counter"));
    }
}
