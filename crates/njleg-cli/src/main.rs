//! NJLEG CLI - Main entry point

use clap::Parser;
use njleg_cli::{Cli, Commands};
use njleg_common::logging::{init_logging, LogConfig, LogLevel};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    // The CLI should still work if logging cannot initialize.
    let _ = init_logging(&log_config);

    let result = match cli.command {
        Commands::Run { start, stop, force } => {
            njleg_cli::commands::run::run(start, stop, force).await
        }
        Commands::Status => njleg_cli::commands::status::run(),
        Commands::Preflight => njleg_cli::commands::preflight::run().await,
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
