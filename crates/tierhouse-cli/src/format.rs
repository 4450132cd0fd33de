//! Output formatting utilities for tierctl
//!
//! Supports two output formats:
//! - Table: ASCII tables with borders (default)
//! - JSON: Machine-readable JSON

use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tierhouse_core::TierLocation;
use tierhouse_storage::{RecoveryReport, TierContents, TransitionReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// One row of the `show` listing.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct TierRow {
    #[tabled(rename = "Tier")]
    pub tier: String,
    #[tabled(rename = "Record")]
    pub id: String,
    #[tabled(rename = "Storage")]
    pub storage: String,
    #[tabled(rename = "Bytes")]
    pub size_bytes: u64,
}

/// One row of a transition report.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct MoveRow {
    #[tabled(rename = "From")]
    pub from: String,
    #[tabled(rename = "To")]
    pub to: String,
    #[tabled(rename = "Moved")]
    pub moved: usize,
}

fn describe_storage(tier: TierLocation, compression: Option<u32>) -> String {
    match (tier, compression) {
        (TierLocation::RehydratedCache, _) => "Decompressed from Archive".to_string(),
        (_, Some(level)) => format!("Gzip Compressed, Level {}", level),
        (_, None) => "Uncompressed".to_string(),
    }
}

pub fn tier_rows(contents: &TierContents) -> Vec<TierRow> {
    contents
        .iter()
        .flat_map(|(tier, entries)| {
            entries.iter().map(move |entry| TierRow {
                tier: tier.to_string(),
                id: entry.id.to_string(),
                storage: describe_storage(*tier, entry.compression.map(|c| c.get())),
                size_bytes: entry.size_bytes,
            })
        })
        .collect()
}

/// Format and print output based on configured format
pub struct Formatter {
    format: OutputFormat,
    colored: bool,
}

impl Formatter {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self { format, colored }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print tier contents, one section per location
    pub fn print_contents(&self, contents: &TierContents) -> Result<()> {
        if self.format == OutputFormat::Json {
            let by_tier: std::collections::BTreeMap<String, _> = contents
                .iter()
                .map(|(tier, entries)| (tier.to_string(), entries))
                .collect();
            return self.print_json(&by_tier);
        }

        for (tier, entries) in contents {
            let heading = format!("{} ({} records)", tier, entries.len());
            if self.colored {
                println!("{}", heading.bold());
            } else {
                println!("{}", heading);
            }
        }
        self.print_table(tier_rows(contents))
    }

    pub fn print_transition_report(&self, report: &TransitionReport) -> Result<()> {
        if self.format == OutputFormat::Json {
            #[derive(Serialize)]
            struct Summary<'a> {
                evaluated_at: String,
                moved: Vec<MoveRow>,
                examined: usize,
                not_eligible: usize,
                vanished: usize,
                failures: Vec<Failure<'a>>,
            }
            #[derive(Serialize)]
            struct Failure<'a> {
                id: &'a str,
                tier: String,
                kind: &'static str,
                reason: &'a str,
            }

            let summary = Summary {
                evaluated_at: report.evaluated_at.to_rfc3339(),
                moved: move_rows(report),
                examined: report.examined,
                not_eligible: report.not_eligible,
                vanished: report.vanished,
                failures: report
                    .failures
                    .iter()
                    .map(|f| Failure {
                        id: f.id.as_str(),
                        tier: f.tier.to_string(),
                        kind: f.kind.as_str(),
                        reason: &f.reason,
                    })
                    .collect(),
            };
            return self.print_json(&summary);
        }

        self.print_info(&format!(
            "Transition pass at {}: examined {}, moved {}, not yet eligible {}",
            report.evaluated_at.format("%Y-%m-%d %H:%M:%S"),
            report.examined,
            report.total_moved(),
            report.not_eligible,
        ));
        if report.total_moved() > 0 {
            self.print_table(move_rows(report))?;
        }
        for failure in &report.failures {
            self.print_error(&format!(
                "{} in {}: {} ({})",
                failure.id, failure.tier, failure.reason, failure.kind
            ));
        }
        Ok(())
    }

    pub fn print_recovery(&self, report: &RecoveryReport) {
        if report.is_clean() {
            return;
        }
        self.print_info(&format!(
            "Recovered interrupted moves: {} completed, {} rolled back, {} deferred",
            report.completed, report.rolled_back, report.deferred
        ));
    }

    /// Print a success message
    pub fn print_success(&self, message: &str) {
        if self.colored {
            println!("{} {}", "✅".green(), message);
        } else {
            println!("✅ {}", message);
        }
    }

    /// Print an error message
    pub fn print_error(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", "❌".red(), message);
        } else {
            eprintln!("❌ {}", message);
        }
    }

    /// Print an info message
    pub fn print_info(&self, message: &str) {
        if self.colored {
            println!("{} {}", "ℹ️".blue(), message);
        } else {
            println!("ℹ️  {}", message);
        }
    }

    /// Print table format
    fn print_table<T: Tabled>(&self, items: Vec<T>) -> Result<()> {
        if items.is_empty() {
            println!("No items found");
            return Ok(());
        }

        let mut table = Table::new(items);
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        println!("{}", table);
        Ok(())
    }

    /// Print JSON format
    pub fn print_json<T: Serialize + ?Sized>(&self, item: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(item)?;
        println!("{}", json);
        Ok(())
    }
}

fn move_rows(report: &TransitionReport) -> Vec<MoveRow> {
    report
        .moved
        .iter()
        .map(|((from, to), moved)| MoveRow {
            from: from.to_string(),
            to: to.to_string(),
            moved: *moved,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tierhouse_core::{CompressionLevel, RecordId};
    use tierhouse_storage::TierEntry;

    #[test]
    fn test_tier_rows_describe_storage() {
        let mut contents: TierContents = BTreeMap::new();
        contents.insert(
            TierLocation::Hot,
            vec![TierEntry {
                id: RecordId::billing(1),
                compression: None,
                size_bytes: 320,
            }],
        );
        contents.insert(
            TierLocation::Archive,
            vec![TierEntry {
                id: RecordId::billing(2),
                compression: Some(CompressionLevel::BEST),
                size_bytes: 210,
            }],
        );
        contents.insert(
            TierLocation::RehydratedCache,
            vec![TierEntry {
                id: RecordId::billing(2),
                compression: None,
                size_bytes: 320,
            }],
        );

        let rows = tier_rows(&contents);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].tier, "hot");
        assert_eq!(rows[0].storage, "Uncompressed");
        assert_eq!(rows[1].storage, "Gzip Compressed, Level 9");
        assert_eq!(rows[2].tier, "rehydrated");
        assert_eq!(rows[2].storage, "Decompressed from Archive");
    }
}
