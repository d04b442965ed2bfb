//! Apply command - Apply an environment and record its graph.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use envforge_cluster::KubectlHandle;
use envforge_graph::GraphHistory;

use super::{load_environment, run_apply};
use crate::settings::{DryRun, Settings};

#[derive(Args)]
pub struct ApplyArgs {
    /// Environment to apply
    #[arg(short, long)]
    env: String,

    /// Override the kubectl dry-run mode
    #[arg(long, value_enum)]
    dry_run: Option<DryRun>,
}

pub async fn execute(args: ApplyArgs, mut settings: Settings) -> Result<()> {
    if let Some(mode) = args.dry_run {
        settings.kubectl.dry_run = mode;
    }
    info!("Applying environment: {}", args.env);

    let loaded = load_environment(&settings, &args.env)?;
    println!(
        "🚀 Applying {} resources to {}",
        loaded.graph.len(),
        args.env
    );

    let handle = Arc::new(KubectlHandle::new(settings.kubectl_options()));
    run_apply(handle, settings.apply_options(), &loaded.graph).await?;

    if settings.kubectl.dry_run != DryRun::Off {
        println!("ℹ️  Dry run, graph not recorded");
        return Ok(());
    }

    let record = GraphHistory::new(&settings.paths.state_dir)
        .record(&args.env, &loaded.base_dir, &loaded.document)
        .context("Failed to record applied graph")?;
    println!("🗂️  Recorded graph {}", record.id);

    Ok(())
}
