//! Integration tests for retrieval and rehydration

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;
use tierhouse_core::{CompressionLevel, LineItem, Priority, Record, RecordId, TierLocation};
use tierhouse_storage::{codec, Error, TierEngine, TieringConfig};
use tokio::time::Instant;

const EXPEDITED: Duration = Duration::from_secs(5);
const STANDARD: Duration = Duration::from_secs(15);

fn record(seq: u32, days_ago: i64) -> Record {
    Record::new(
        RecordId::billing(seq),
        format!("CUST-{:03}", seq),
        Utc::now() - ChronoDuration::days(days_ago),
        seq as f64 * 1.23 + 100.0,
        "USD",
        "Cloud services usage",
        vec![
            LineItem::new("Compute", 1, 80.0),
            LineItem::new("Storage", 2, 10.0),
        ],
    )
}

fn config(dir: &TempDir) -> TieringConfig {
    TieringConfig {
        expedited_latency: EXPEDITED,
        standard_latency: STANDARD,
        ..TieringConfig::with_data_dir(dir.path())
    }
}

/// Engine holding one Archive-only record.
async fn archived(config: TieringConfig, seq: u32) -> (TierEngine, Record) {
    let engine = TierEngine::open(config).await.unwrap();
    let rec = record(seq, 400);
    engine.ingest(rec.clone()).await.unwrap();
    engine.run_transition_pass().await;
    assert_eq!(engine.locate(&rec.id).await, vec![TierLocation::Archive]);
    (engine, rec)
}

#[tokio::test]
async fn test_hot_record_served_directly() {
    let dir = TempDir::new().unwrap();
    let engine = TierEngine::open(config(&dir)).await.unwrap();
    let rec = record(1, 1);
    engine.ingest(rec.clone()).await.unwrap();

    let retrieved = engine.fetch(&rec.id, Priority::Standard, None).await.unwrap();
    assert_eq!(retrieved.served_from, TierLocation::Hot);
    assert_eq!(retrieved.record, rec);
}

#[tokio::test]
async fn test_hot_preferred_over_cool() {
    let dir = TempDir::new().unwrap();
    let engine = TierEngine::open(config(&dir)).await.unwrap();
    let rec = record(1, 100);
    engine.ingest(rec.clone()).await.unwrap();
    engine.run_transition_pass().await;

    // Plant a second, different copy in Hot behind the engine's back
    let mut newer = rec.clone();
    newer.description = "Hot copy".to_string();
    let bytes = codec::encode(&newer, None).unwrap();
    std::fs::write(dir.path().join("hot").join("BILL-00001.json"), &bytes).unwrap();
    drop(engine);

    let engine = TierEngine::open(config(&dir)).await.unwrap();
    let retrieved = engine.fetch(&rec.id, Priority::Standard, None).await.unwrap();
    assert_eq!(retrieved.served_from, TierLocation::Hot);
    assert_eq!(retrieved.record.description, "Hot copy");
}

#[tokio::test]
async fn test_cool_record_decompressed() {
    let dir = TempDir::new().unwrap();
    let engine = TierEngine::open(config(&dir)).await.unwrap();
    let rec = record(2, 100);
    engine.ingest(rec.clone()).await.unwrap();
    engine.run_transition_pass().await;

    let retrieved = engine.fetch(&rec.id, Priority::Standard, None).await.unwrap();
    assert_eq!(retrieved.served_from, TierLocation::Cool);
    assert_eq!(retrieved.record, rec);
}

// Scenario C
#[tokio::test]
async fn test_unknown_identifier_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = TierEngine::open(config(&dir)).await.unwrap();

    let id = RecordId::parse_billing("bill-99999").unwrap();
    let result = engine.retrieve(&id, Priority::Expedited).await;
    assert!(matches!(result, Err(Error::NotFound(ref missing)) if *missing == id));
}

#[tokio::test(start_paused = true)]
async fn test_rehydration_preserves_content_and_priority_order() {
    let dir = TempDir::new().unwrap();
    let no_copies = TieringConfig {
        serve_rehydrated_copies: false,
        ..config(&dir)
    };
    let (engine, rec) = archived(no_copies, 3).await;

    let started = Instant::now();
    let expedited = engine.retrieve(&rec.id, Priority::Expedited).await.unwrap();
    let expedited_elapsed = started.elapsed();

    let started = Instant::now();
    let standard = engine.retrieve(&rec.id, Priority::Standard).await.unwrap();
    let standard_elapsed = started.elapsed();

    assert_eq!(expedited, rec);
    assert_eq!(standard, rec);
    assert!(expedited_elapsed >= EXPEDITED);
    assert!(standard_elapsed >= STANDARD);
    assert!(expedited_elapsed < standard_elapsed);

    // The authoritative copy never leaves Archive
    assert_eq!(engine.locate(&rec.id).await, vec![TierLocation::Archive]);
}

// Scenario D
#[tokio::test(start_paused = true)]
async fn test_concurrent_expedited_retrievals_share_one_delay() {
    let dir = TempDir::new().unwrap();
    let (engine, rec) = archived(config(&dir), 4).await;
    let engine = Arc::new(engine);

    let started = Instant::now();
    let a = tokio::spawn({
        let engine = engine.clone();
        let id = rec.id.clone();
        async move { engine.retrieve(&id, Priority::Expedited).await }
    });
    let b = tokio::spawn({
        let engine = engine.clone();
        let id = rec.id.clone();
        async move { engine.retrieve(&id, Priority::Expedited).await }
    });

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    let elapsed = started.elapsed();

    assert_eq!(a, b);
    assert_eq!(a, rec);
    assert!(elapsed >= EXPEDITED);
    assert!(elapsed < EXPEDITED * 2);
    assert_eq!(engine.rehydrations_in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rehydrated_copy_served_without_delay() {
    let dir = TempDir::new().unwrap();
    let (engine, rec) = archived(config(&dir), 5).await;

    let first = engine.fetch(&rec.id, Priority::Standard, None).await.unwrap();
    assert_eq!(first.served_from, TierLocation::Archive);

    let started = Instant::now();
    let second = engine.fetch(&rec.id, Priority::Standard, None).await.unwrap();
    assert_eq!(second.served_from, TierLocation::RehydratedCache);
    assert_eq!(second.record, rec);
    assert!(started.elapsed() < EXPEDITED);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_leaves_rehydration_running() {
    let dir = TempDir::new().unwrap();
    let (engine, rec) = archived(config(&dir), 6).await;

    let result = engine
        .retrieve_with_timeout(&rec.id, Priority::Standard, Duration::from_secs(1))
        .await;
    assert!(matches!(result, Err(Error::Timeout { .. })));

    tokio::time::sleep(STANDARD).await;
    while engine.rehydrations_in_flight() > 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let contents = engine.tier_contents().await;
    assert_eq!(contents[&TierLocation::RehydratedCache].len(), 1);

    let retrieved = engine.fetch(&rec.id, Priority::Standard, None).await.unwrap();
    assert_eq!(retrieved.served_from, TierLocation::RehydratedCache);
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_archive_payload_is_rehydration_error() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("archive")).unwrap();
    std::fs::write(
        dir.path().join("archive").join("BILL-00007.9.json.gz"),
        b"\x1f\x8b\x08 truncated",
    )
    .unwrap();
    let engine = TierEngine::open(config(&dir)).await.unwrap();

    let result = engine
        .retrieve(&RecordId::billing(7), Priority::Expedited)
        .await;
    assert!(matches!(result, Err(Error::Rehydration { .. })));
    assert!(engine.tier_contents().await[&TierLocation::RehydratedCache].is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cache_eviction_keeps_archive_copy() {
    let dir = TempDir::new().unwrap();
    let one_copy = codec::encode(&record(1, 400), None).unwrap().len() as u64;
    let small_cache = TieringConfig {
        rehydrated_cache_max_bytes: one_copy + one_copy / 2,
        ..config(&dir)
    };
    let engine = TierEngine::open(small_cache).await.unwrap();
    for seq in 1..=2 {
        engine.ingest(record(seq, 400)).await.unwrap();
    }
    engine.run_transition_pass().await;

    for seq in 1..=2 {
        engine
            .retrieve(&RecordId::billing(seq), Priority::Expedited)
            .await
            .unwrap();
    }

    let contents = engine.tier_contents().await;
    let cached: Vec<_> = contents[&TierLocation::RehydratedCache]
        .iter()
        .map(|e| e.id.clone())
        .collect();
    assert_eq!(cached, vec![RecordId::billing(2)]);
    assert_eq!(contents[&TierLocation::Archive].len(), 2);
    assert!(contents[&TierLocation::Archive]
        .iter()
        .all(|e| e.compression == Some(CompressionLevel::BEST)));

    // Evicted copies are simply restored again
    let evicted = engine
        .fetch(&RecordId::billing(1), Priority::Expedited, None)
        .await
        .unwrap();
    assert_eq!(evicted.served_from, TierLocation::Archive);
}
