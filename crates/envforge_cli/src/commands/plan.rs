//! Plan command - Render an environment without applying it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use envforge_manifest::{ChartScaffold, ManifestRenderer, ManifestWriter};

use super::load_environment;
use crate::settings::Settings;

#[derive(Args)]
pub struct PlanArgs {
    /// Environment to plan
    #[arg(short, long)]
    env: String,

    /// Output directory (defaults to <output_dir>/<env>)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Also scaffold a Helm chart for the environment
    #[arg(long)]
    chart: bool,
}

pub async fn execute(args: PlanArgs, settings: Settings) -> Result<()> {
    info!("Planning environment: {}", args.env);

    let loaded = load_environment(&settings, &args.env)?;
    let manifests = ManifestRenderer::new()
        .render_all(loaded.graph.descriptors())
        .with_context(|| format!("Failed to render environment '{}'", args.env))?;

    println!("📋 Plan for {} ({} resources):", args.env, loaded.graph.len());
    for (index, node) in loaded.graph.iter().enumerate() {
        println!("   {:>2}. {} [{}]", index + 1, node.id(), node.tier());
    }

    let out = args
        .out
        .unwrap_or_else(|| settings.paths.output_dir.join(&args.env));
    let written = ManifestWriter::new(&out)
        .write_all(&manifests)
        .with_context(|| format!("Failed to write manifests to {}", out.display()))?;
    println!();
    println!("📝 Wrote {} files to {}", written.len(), out.display());

    if args.chart {
        let chart_dir = ChartScaffold::new()
            .generate(&out.join("chart"), &loaded.spec)
            .context("Failed to scaffold chart")?;
        println!("📦 Chart scaffolded at {}", chart_dir.display());
    }

    Ok(())
}
