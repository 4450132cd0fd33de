//! Transition Scheduler
//!
//! Background loop that runs a transition pass on every tick until told to
//! shut down. Ticks missed while a pass is still running are skipped, not
//! queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::engine::TierEngine;
use crate::executor::TransitionReport;

pub struct TransitionScheduler {
    engine: Arc<TierEngine>,
    interval: Duration,
}

impl TransitionScheduler {
    pub fn new(engine: Arc<TierEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Scheduler using the engine's configured `schedule_interval`.
    pub fn from_engine(engine: Arc<TierEngine>) -> Self {
        let interval = engine.config().schedule_interval;
        Self::new(engine, interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the background task. The first pass runs immediately.
    pub fn start(self: Arc<Self>, shutdown_rx: oneshot::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut shutdown_rx = shutdown_rx;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.tick().await;
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Transition scheduler shutting down");
                        break;
                    }
                }
            }
        })
    }

    async fn tick(&self) -> TransitionReport {
        let report = self.engine.run_transition_pass().await;

        if report.failed() > 0 {
            tracing::error!(
                failed = report.failed(),
                moved = report.total_moved(),
                "Scheduled transition pass had failures"
            );
        } else {
            tracing::info!(
                moved = report.total_moved(),
                examined = report.examined,
                "Scheduled transition pass complete"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TieringConfig;
    use chrono::{Duration as ChronoDuration, Utc};
    use tierhouse_core::{Record, RecordId, TierLocation};

    #[tokio::test]
    async fn test_from_engine_uses_configured_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TieringConfig::with_data_dir(dir.path());
        config.schedule_interval = Duration::from_secs(90);
        let engine = Arc::new(TierEngine::open(config).await.unwrap());

        let scheduler = TransitionScheduler::from_engine(engine);
        assert_eq!(scheduler.interval(), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn test_scheduler_moves_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(
            TierEngine::open(TieringConfig::with_data_dir(dir.path()))
                .await
                .unwrap(),
        );
        let record = Record::new(
            RecordId::billing(1),
            "CUST-001",
            Utc::now() - ChronoDuration::days(100),
            101.23,
            "USD",
            "Cloud services",
            vec![],
        );
        engine.ingest(record).await.unwrap();

        let scheduler = Arc::new(TransitionScheduler::new(
            engine.clone(),
            Duration::from_millis(20),
        ));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = scheduler.start(shutdown_rx);

        let mut moved = false;
        for _ in 0..100 {
            if engine.locate(&RecordId::billing(1)).await == vec![TierLocation::Cool] {
                moved = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(moved);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
