//! envforge CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Spec error
//! - 4: Render error
//! - 5: Apply failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use envforge_apply::ApplyError;
use envforge_graph::{GraphError, HistoryError};
use envforge_manifest::RenderError;
use envforge_spec::SpecError;

mod commands;
mod settings;

use commands::{ApplyFailed, Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const SPEC_ERROR: u8 = 3;
    pub const RENDER_ERROR: u8 = 4;
    pub const APPLY_FAILURE: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose, cli.global.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.global.settings()?;
    match cli.command {
        Commands::Plan(args) => commands::plan::execute(args, settings).await,
        Commands::Apply(args) => commands::apply::execute(args, settings).await,
        Commands::RollbackTo(args) => commands::rollback::execute(args, settings).await,
        Commands::History(args) => commands::history::execute(args, settings).await,
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "envforge=debug" } else { "envforge=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},warn", default_level)));

    let registry = tracing_subscriber::registry().with(filter);
    let log_result = if json {
        registry
            .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Map an error to its exit code by the first recognized cause.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if cause.is::<ApplyFailed>() {
            return ExitCodes::APPLY_FAILURE;
        }
        if let Some(err) = cause.downcast_ref::<SpecError>() {
            return spec_exit_code(err);
        }
        if let Some(err) = cause.downcast_ref::<GraphError>() {
            return match err {
                GraphError::Spec(err) => spec_exit_code(err),
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if let Some(err) = cause.downcast_ref::<HistoryError>() {
            return match err {
                HistoryError::NotFound { .. } => ExitCodes::INVALID_ARGS,
                HistoryError::Spec(err) => spec_exit_code(err),
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if cause.is::<RenderError>() {
            return ExitCodes::RENDER_ERROR;
        }
        if let Some(err) = cause.downcast_ref::<ApplyError>() {
            return match err {
                ApplyError::Render(_) => ExitCodes::RENDER_ERROR,
                _ => ExitCodes::APPLY_FAILURE,
            };
        }
    }
    ExitCodes::GENERAL_ERROR
}

fn spec_exit_code(err: &SpecError) -> u8 {
    match err {
        SpecError::EnvironmentNotFound { .. } => ExitCodes::INVALID_ARGS,
        SpecError::InvalidName { field, .. } if field == "environment" => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::SPEC_ERROR,
    }
}
