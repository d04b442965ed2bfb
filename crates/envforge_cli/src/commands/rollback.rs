//! Rollback command - Re-apply a recorded graph.
//!
//! Rolling back is a forward apply of an earlier document; nothing applied
//! since is deleted.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use envforge_cluster::KubectlHandle;
use envforge_graph::{GraphBuilder, GraphHistory};
use envforge_spec::ProcessEnv;

use super::run_apply;
use crate::settings::{DryRun, Settings};

#[derive(Args)]
pub struct RollbackArgs {
    /// Graph id to roll back to (see `envforge history`)
    graph_id: String,

    /// Environment the graph was recorded for
    #[arg(short, long)]
    env: String,

    /// Override the kubectl dry-run mode
    #[arg(long, value_enum)]
    dry_run: Option<DryRun>,
}

pub async fn execute(args: RollbackArgs, mut settings: Settings) -> Result<()> {
    if let Some(mode) = args.dry_run {
        settings.kubectl.dry_run = mode;
    }

    let history = GraphHistory::new(&settings.paths.state_dir);
    let record = history
        .load(&args.env, &args.graph_id)
        .with_context(|| format!("Failed to load graph {}", args.graph_id))?;
    let graph = record
        .rebuild(&GraphBuilder::new(), &ProcessEnv)
        .with_context(|| format!("Failed to rebuild graph {}", record.id))?;

    info!("Rolling back {} to graph {}", args.env, record.id);
    println!(
        "⏪ Rolling back {} to graph {} (recorded {})",
        args.env,
        record.id,
        record.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let handle = Arc::new(KubectlHandle::new(settings.kubectl_options()));
    run_apply(handle, settings.apply_options(), &graph).await?;

    if settings.kubectl.dry_run == DryRun::Off {
        let current = history
            .record(&args.env, &record.base_dir, &record.document)
            .context("Failed to record applied graph")?;
        println!("🗂️  Recorded graph {}", current.id);
    }

    Ok(())
}
