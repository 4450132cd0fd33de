//! Synthetic billing records for demos and smoke tests

use chrono::{DateTime, Utc};
use tierhouse_core::{LineItem, Record, RecordId};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Billing record number `seq`, issued at `issued_at`.
pub fn billing_record(seq: u32, issued_at: DateTime<Utc>) -> Record {
    Record::new(
        RecordId::billing(seq),
        format!("CUST-{:03}", seq % 100 + 1),
        issued_at,
        round2(seq as f64 * 1.23 + 100.0),
        "USD",
        format!(
            "Service usage for period ending {}",
            issued_at.format("%Y-%m-%d")
        ),
        vec![
            LineItem::new("Compute", seq % 5 + 1, round2(20.5 + (seq % 3) as f64)),
            LineItem::new("Storage", seq % 10 + 1, round2(5.1 + (seq % 2) as f64)),
        ],
    )
}

/// `count` consecutive records starting at `start_seq`, all issued at `issued_at`.
pub fn billing_batch(start_seq: u32, count: u32, issued_at: DateTime<Utc>) -> Vec<Record> {
    (start_seq..start_seq.saturating_add(count))
        .map(|seq| billing_record(seq, issued_at))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_billing_record_shape() {
        let issued = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        let record = billing_record(7, issued);

        assert_eq!(record.id.as_str(), "BILL-00007");
        assert_eq!(record.customer_id, "CUST-008");
        assert_eq!(record.amount, 108.61);
        assert_eq!(record.description, "Service usage for period ending 2024-03-31");
        assert_eq!(record.line_items.len(), 2);
        assert_eq!(record.line_items[0].quantity, 3);
        assert_eq!(record.line_items[1].unit_price, 6.1);
        record.validate().unwrap();
    }

    #[test]
    fn test_batch_is_consecutive() {
        let batch = billing_batch(10, 3, Utc::now());
        let ids: Vec<_> = batch.iter().map(|r| r.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["BILL-00010", "BILL-00011", "BILL-00012"]);
    }
}
