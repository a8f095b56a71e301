//! ffaflow - command-line entry point.

use std::process;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use ffaflow::cli::{self, ParseOutcome};
use ffaflow::runtime::FilesystemLayout;
use ffaflow::util::{LoggingGuard, init_logging};
use ffaflow::{Coordinator, PipelineConfig, RunOptions};

#[tokio::main]
async fn main() {
    let options = match cli::parse_args(std::env::args_os()) {
        ParseOutcome::Run(options) => options,
        ParseOutcome::Exit(code) => process::exit(code),
    };

    let config = match PipelineConfig::load_or_default(options.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    let guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    let code = run(options, config).await;
    drop(guard);
    process::exit(code);
}

fn setup_logging(config: &PipelineConfig) -> anyhow::Result<LoggingGuard> {
    let layout = FilesystemLayout::new(config.state_home.clone());
    layout
        .prepare()
        .context("failed to prepare state home")?;
    init_logging(&layout.logs_dir()).context("failed to initialize logging")
}

async fn run(options: RunOptions, config: PipelineConfig) -> i32 {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        }
    });

    let result = match Coordinator::prepare(options, config, cancel) {
        Ok(coordinator) => coordinator.run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(summary) => {
            tracing::info!(
                run_id = %summary.run_id,
                observations = summary.observations.len(),
                failed = summary.failed_observations(),
                skipped_entries = summary.skipped_entries.len(),
                "ffaflow finished"
            );
            0
        }
        Err(e) => {
            tracing::error!(error = %e, exit_code = e.exit_code(), "ffaflow aborted");
            e.exit_code()
        }
    }
}
