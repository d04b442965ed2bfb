//! History command - List recorded graphs.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use envforge_graph::{GraphHistory, GraphRecord};

use crate::settings::Settings;

#[derive(Args)]
pub struct HistoryArgs {
    /// Environment to list
    #[arg(short, long)]
    env: String,

    /// Show at most this many records
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

/// One line of history output.
#[derive(Debug, Serialize)]
struct HistoryEntry {
    id: String,
    recorded_at: String,
    namespaces: usize,
    services: usize,
    credential_sets: usize,
}

impl From<&GraphRecord> for HistoryEntry {
    fn from(record: &GraphRecord) -> Self {
        Self {
            id: record.id.to_string(),
            recorded_at: record.recorded_at.to_rfc3339(),
            namespaces: record.document.namespaces.len(),
            services: record.document.services.len(),
            credential_sets: record.document.credentials.len(),
        }
    }
}

pub async fn execute(args: HistoryArgs, settings: Settings) -> Result<()> {
    let records = GraphHistory::new(&settings.paths.state_dir)
        .list(&args.env)
        .with_context(|| format!("Failed to read history for '{}'", args.env))?;

    let entries: Vec<HistoryEntry> = records
        .iter()
        .take(args.limit.unwrap_or(usize::MAX))
        .map(HistoryEntry::from)
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No recorded graphs for {}", args.env);
        return Ok(());
    }

    println!("🗂️  Recorded graphs for {} (newest first):", args.env);
    for (index, entry) in entries.iter().enumerate() {
        println!(
            "   {}  {}  {} services, {} credential sets{}",
            entry.id,
            entry.recorded_at,
            entry.services,
            entry.credential_sets,
            if index == 0 { "  (current)" } else { "" }
        );
    }

    Ok(())
}
