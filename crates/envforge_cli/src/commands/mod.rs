//! CLI command definitions.
//!
//! Each subcommand maps to one workflow: render a plan, apply an
//! environment, roll back to a recorded graph, or list recorded graphs.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use envforge_apply::{ApplyOptions, ApplyOrchestrator, ApplyOutcome, ApplyReport};
use envforge_cluster::ClusterHandle;
use envforge_graph::{GraphBuilder, ResourceGraph};
use envforge_spec::{EnvironmentSpec, ProcessEnv, SpecDocument, SpecReader};

use crate::settings::Settings;

pub mod apply;
pub mod history;
pub mod plan;
pub mod rollback;

/// envforge - declarative Kubernetes environment provisioning
#[derive(Parser)]
#[command(name = "envforge")]
#[command(version, about = "envforge - declarative Kubernetes environment provisioning")]
#[command(long_about = r#"
envforge turns environment spec documents into ordered Kubernetes resources
and applies them tier by tier: namespaces, then secrets and config, then
workloads, then networking, then GitOps registration.

WORKFLOWS:
  plan         → Render and write manifests without touching a cluster
  apply        → Apply an environment and record its graph
  rollback-to  → Re-apply a previously recorded graph
  history      → List recorded graphs for an environment

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Spec error
  4 - Render error
  5 - Apply failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Settings file (defaults to ./envforge.toml when present)
    #[arg(long, global = true, env = "ENVFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// kubectl context to apply to
    #[arg(long, global = true, env = "ENVFORGE_CONTEXT")]
    pub context: Option<String>,

    /// Directory holding environment spec documents
    #[arg(long, global = true, env = "ENVFORGE_ENVIRONMENTS_DIR")]
    pub environments_dir: Option<PathBuf>,

    /// Directory holding recorded graphs
    #[arg(long, global = true, env = "ENVFORGE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl GlobalArgs {
    /// Settings from the file, with command-line overrides applied.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;

        if let Some(context) = &self.context {
            settings.kubectl.context = Some(context.clone());
        }
        if let Some(dir) = &self.environments_dir {
            settings.paths.environments_dir = dir.clone();
        }
        if let Some(dir) = &self.state_dir {
            settings.paths.state_dir = dir.clone();
        }

        Ok(settings)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render an environment's manifests to disk
    Plan(plan::PlanArgs),

    /// Apply an environment to the cluster
    Apply(apply::ApplyArgs),

    /// Re-apply a recorded graph
    #[command(name = "rollback-to")]
    RollbackTo(rollback::RollbackArgs),

    /// List recorded graphs for an environment
    History(history::HistoryArgs),
}

/// An apply run that finished without applying every resource.
#[derive(Debug, Error)]
#[error("Apply of '{environment}' did not complete: {summary}")]
pub struct ApplyFailed {
    pub environment: String,
    pub summary: String,
}

/// A spec document with its resolved spec and graph.
#[derive(Debug)]
pub(crate) struct LoadedEnvironment {
    pub document: SpecDocument,
    pub base_dir: PathBuf,
    pub spec: EnvironmentSpec,
    pub graph: ResourceGraph,
}

/// Read, resolve and build an environment. Fails before anything is
/// rendered if the environment is invalid.
pub(crate) fn load_environment(settings: &Settings, environment: &str) -> Result<LoadedEnvironment> {
    let reader = SpecReader::new(&settings.paths.environments_dir);
    let document = reader
        .read_document(environment)
        .with_context(|| format!("Failed to read environment '{}'", environment))?;

    let base_dir = fs::canonicalize(reader.environments_dir())
        .unwrap_or_else(|_| reader.environments_dir().to_path_buf());
    let spec = document
        .resolve(&base_dir, &ProcessEnv)
        .with_context(|| format!("Failed to resolve environment '{}'", environment))?;

    let graph = GraphBuilder::new()
        .build(&spec)
        .with_context(|| format!("Invalid environment '{}'", environment))?;

    Ok(LoadedEnvironment {
        document,
        base_dir,
        spec,
        graph,
    })
}

/// Apply a graph and print the per-resource report. Ctrl-C cancels dispatch.
///
/// Returns [`ApplyFailed`] when any resource did not apply.
pub(crate) async fn run_apply(
    handle: Arc<dyn ClusterHandle>,
    options: ApplyOptions,
    graph: &ResourceGraph,
) -> Result<ApplyReport> {
    let orchestrator = ApplyOrchestrator::new(handle).with_options(options);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, waiting for in-flight calls");
            let _ = cancel_tx.send(true);
        }
    });

    let result = orchestrator.apply_with_cancel(graph, cancel_rx).await;
    interrupt.abort();
    let report =
        result.with_context(|| format!("Failed to apply environment '{}'", graph.environment()))?;

    print_report(&report);

    if report.success() {
        Ok(report)
    } else {
        Err(ApplyFailed {
            environment: report.environment.clone(),
            summary: report.summary(),
        }
        .into())
    }
}

fn print_report(report: &ApplyReport) {
    println!();
    for result in &report.results {
        match &result.outcome {
            ApplyOutcome::Applied => println!(
                "   ✅ {} ({} attempt{}, {} ms)",
                result.id,
                result.attempts,
                if result.attempts == 1 { "" } else { "s" },
                result.duration_ms
            ),
            ApplyOutcome::Failed(reason) => println!("   ❌ {}: {}", result.id, reason),
            ApplyOutcome::Skipped(reason) => println!("   ⏭️  {}: {}", result.id, reason),
        }
    }
    println!();
    if report.success() {
        println!("✅ {}", report.summary());
    } else {
        println!("❌ {}", report.summary());
    }
}
