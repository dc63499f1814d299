//! Franking Cache - refresh the ASX franking cache file
//!
//! Scheduled job that scrapes dividend tables for a list of ASX codes and
//! updates `franking_cache.json`. Exits 0 on success, whether or not the file
//! changed, and non-zero with a diagnostic on any fatal error.

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use franking_cache::cli::Cli;
use franking_cache::config::RefreshConfig;
use franking_cache::refresh::Refresher;

/// Logs go to stderr; `RUST_LOG` overrides the `--debug` switch
fn init_tracing(debug: bool) {
    let filter_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("franking_cache={filter_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = match RefreshConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    let refresher = match Refresher::new(config) {
        Ok(refresher) => refresher,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match refresher.run().await {
        Ok(report) => {
            report.log();
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("refresh failed: {e}");
            ExitCode::FAILURE
        }
    }
}
