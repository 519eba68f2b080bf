//! NJLEG CLI - command definitions and orchestration
//!
//! The `njleg` binary drives the pipeline one year at a time through the
//! four stages, recording every transition in the run-state ledger. One
//! year's failure never blocks the other years.

use clap::{Parser, Subcommand};

pub mod commands;

/// Sync NJ Legislature database releases into the warehouse
#[derive(Parser, Debug)]
#[command(name = "njleg", version, about)]
pub struct Cli {
    /// Enable verbose (debug) logging on the console
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for the configured year range
    Run {
        /// First session year (inclusive); overrides NJLEG_START_YEAR
        #[arg(long)]
        start: Option<i32>,

        /// Last session year (inclusive); overrides NJLEG_STOP_YEAR
        #[arg(long)]
        stop: Option<i32>,

        /// Re-process years already marked completed
        #[arg(long)]
        force: bool,
    },

    /// Render the run-state ledger as a summary report
    Status,

    /// Check that external collaborators are available
    Preflight,
}
