//! Tierhouse CLI (tierctl)
//!
//! Operator tool for a local Tierhouse data directory.
//!
//! ## Overview
//!
//! `tierctl` drives the record lifecycle engine directly, no server involved:
//! - **ingest**: generate synthetic billing records into the Hot tier
//! - **manage**: run one transition pass (Hot → Cool → Archive)
//! - **retrieve**: fetch a record, rehydrating it from Archive if needed
//! - **show**: list every tier's contents
//! - **schedule**: run transition passes on an interval until Ctrl-C
//! - **cleanup**: remove the data directory
//!
//! ## Quick Start
//!
//! ```bash
//! # Records dated 100 days ago
//! tierctl ingest --count 5 --days-ago 100
//!
//! # Move them to Cool
//! tierctl manage
//!
//! # Look one up
//! tierctl retrieve BILL-00001 --expedited
//! ```
//!
//! ## Configuration
//!
//! - `--config`: TOML file with [`TieringConfig`] fields (default: `./tierhouse.toml` if present)
//! - `TIERHOUSE_DATA_DIR` / `--data-dir`: overrides `data_dir`
//! - `RUST_LOG`: log filter (default: `info`)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tierhouse_core::{Priority, Record, RecordId, TierLocation};
use tierhouse_storage::{TierEngine, TieringConfig, TransitionScheduler};
use tokio::sync::oneshot;

mod config;
mod format;
mod generate;

use format::{Formatter, OutputFormat};

#[derive(Parser)]
#[command(name = "tierctl")]
#[command(about = "Tierhouse record lifecycle tool", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "TIERHOUSE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory, overriding the configuration file
    #[arg(short, long, env = "TIERHOUSE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic billing records into the Hot tier
    Ingest {
        /// Number of records
        #[arg(short = 'n', long, default_value = "10")]
        count: u32,
        /// Issue the records this many days in the past
        #[arg(long, default_value = "0")]
        days_ago: u32,
        /// First record number
        #[arg(long, default_value = "1")]
        start_seq: u32,
    },
    /// Run one transition pass
    Manage,
    /// Retrieve a record by identifier
    Retrieve {
        /// Record identifier, e.g. BILL-00001
        id: String,
        /// Use expedited rehydration for archived records
        #[arg(short, long)]
        expedited: bool,
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Show the contents of every tier
    Show,
    /// Run transition passes on an interval until Ctrl-C
    Schedule {
        /// Interval between passes in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Remove the data directory
    Cleanup {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Print Prometheus metrics
    Metrics,
    /// Print the effective configuration
    Config {
        /// Also write it to this file
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::load(cli.config.as_deref(), cli.data_dir.clone())?;
    let formatter = Formatter::new(cli.format, !cli.no_color);

    match cli.command {
        Commands::Ingest {
            count,
            days_ago,
            start_seq,
        } => handle_ingest(config, &formatter, count, days_ago, start_seq).await?,
        Commands::Manage => {
            let engine = open_engine(config, &formatter).await?;
            let report = engine.run_transition_pass().await;
            formatter.print_transition_report(&report)?;
        }
        Commands::Retrieve {
            id,
            expedited,
            timeout_ms,
        } => handle_retrieve(config, &formatter, &id, expedited, timeout_ms).await?,
        Commands::Show => {
            let engine = open_engine(config, &formatter).await?;
            formatter.print_contents(&engine.tier_contents().await)?;
        }
        Commands::Schedule { interval_ms } => {
            handle_schedule(config, &formatter, interval_ms).await?
        }
        Commands::Cleanup { yes } => handle_cleanup(&config, &formatter, yes).await?,
        Commands::Metrics => {
            let _engine = open_engine(config, &formatter).await?;
            let text = tierhouse_observability::gather_text()
                .context("Failed to render metrics")?;
            print!("{}", text);
        }
        Commands::Config { write } => {
            print!("{}", config::to_toml(&config)?);
            if let Some(path) = write {
                config::save(&config, &path)?;
                formatter.print_success(&format!("Configuration written to {}", path.display()));
            }
        }
    }

    Ok(())
}

async fn open_engine(config: TieringConfig, formatter: &Formatter) -> Result<TierEngine> {
    let data_dir = config.data_dir.clone();
    let engine = TierEngine::open(config)
        .await
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;
    formatter.print_recovery(engine.recovery_report());
    Ok(engine)
}

async fn handle_ingest(
    config: TieringConfig,
    formatter: &Formatter,
    count: u32,
    days_ago: u32,
    start_seq: u32,
) -> Result<()> {
    let engine = open_engine(config, formatter).await?;
    let issued_at = Utc::now() - chrono::Duration::days(days_ago as i64);

    let mut ingested = 0usize;
    let mut skipped = 0usize;
    for record in generate::billing_batch(start_seq, count, issued_at) {
        let id = record.id.clone();
        match engine.ingest(record).await {
            Ok(()) => ingested += 1,
            Err(tierhouse_storage::Error::InvalidInput(reason)) => {
                tracing::warn!(record_id = %id, reason = %reason, "Skipping record");
                skipped += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to ingest {}", id)),
        }
    }

    formatter.print_success(&format!(
        "Ingested {} records into {} dated {}",
        ingested,
        TierLocation::Hot,
        issued_at.format("%Y-%m-%d")
    ));
    if skipped > 0 {
        formatter.print_info(&format!("{} records already existed and were skipped", skipped));
    }
    Ok(())
}

#[derive(Serialize)]
struct RetrieveOutput<'a> {
    served_from: TierLocation,
    record: &'a Record,
}

async fn handle_retrieve(
    config: TieringConfig,
    formatter: &Formatter,
    id: &str,
    expedited: bool,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let id = RecordId::parse_billing(id)
        .context("Invalid record ID format. Please use BILL-XXXXX (e.g., BILL-00001)")?;
    let priority = if expedited {
        Priority::Expedited
    } else {
        Priority::Standard
    };

    let engine = open_engine(config, formatter).await?;
    let latency = engine.config().latency_for(priority);
    let retrieved = engine
        .fetch(&id, priority, timeout_ms.map(Duration::from_millis))
        .await;

    let retrieved = match retrieved {
        Ok(retrieved) => retrieved,
        Err(tierhouse_storage::Error::Timeout { after, .. }) => {
            anyhow::bail!(
                "{} not restored within {:?}; the {} rehydration (~{:?}) was abandoned on exit, retry with a longer --timeout-ms",
                id,
                after,
                priority,
                latency
            );
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to retrieve {}", id)),
    };

    match formatter.format() {
        OutputFormat::Json => formatter.print_json(&RetrieveOutput {
            served_from: retrieved.served_from,
            record: &retrieved.record,
        })?,
        OutputFormat::Table => {
            formatter.print_success(&format!("{} served from {}", id, retrieved.served_from));
            formatter.print_json(&retrieved.record)?;
        }
    }
    Ok(())
}

async fn handle_schedule(
    config: TieringConfig,
    formatter: &Formatter,
    interval_ms: Option<u64>,
) -> Result<()> {
    let engine = Arc::new(open_engine(config, formatter).await?);
    let scheduler = match interval_ms {
        Some(ms) => TransitionScheduler::new(engine, Duration::from_millis(ms)),
        None => TransitionScheduler::from_engine(engine),
    };
    let interval = scheduler.interval();
    let scheduler = Arc::new(scheduler);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = scheduler.start(shutdown_rx);

    formatter.print_info(&format!(
        "Running transition passes every {:?}, Ctrl-C to stop",
        interval
    ));
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    let _ = shutdown_tx.send(());
    handle.await.context("Scheduler task failed")?;
    formatter.print_success("Scheduler stopped");
    Ok(())
}

async fn handle_cleanup(config: &TieringConfig, formatter: &Formatter, yes: bool) -> Result<()> {
    let data_dir = config.data_dir();
    if !yes {
        formatter.print_info(&format!(
            "This removes {} and every tier in it. Re-run with --yes to confirm.",
            data_dir.display()
        ));
        return Ok(());
    }

    if !tokio::fs::try_exists(data_dir).await.unwrap_or(false) {
        formatter.print_info(&format!("Nothing to clean up at {}", data_dir.display()));
        return Ok(());
    }

    tokio::fs::remove_dir_all(data_dir)
        .await
        .with_context(|| format!("Failed to remove {}", data_dir.display()))?;
    formatter.print_success(&format!("Removed {}", data_dir.display()));
    Ok(())
}
