//! NJLEG Pipeline Library
//!
//! Multi-stage, resumable ETL pipeline for the NJ Legislature's annual
//! legislative-database releases.
//!
//! # Stages
//!
//! - **sync**: download the year's archives from the publisher
//! - **extract**: unpack each archive, record content hashes
//! - **export**: dump every Access table to a portable JSON record set
//! - **load**: load record sets into the Postgres warehouse, deduplicated
//!   on content hash
//!
//! Every stage consults and updates the persisted run-state ledger via
//! [`state::RunStateStore`], so an interrupted run can be re-invoked and
//! picks up where it left off.
//!
//! # Example
//!
//! ```no_run
//! use njleg_pipeline::{config::PipelineConfig, fetch::ArchiveFetcher};
//!
//! #[tokio::main]
//! async fn main() -> njleg_common::Result<()> {
//!     let config = PipelineConfig::load()?;
//!     let fetcher = ArchiveFetcher::new(&config)?;
//!     let outcome = fetcher.fetch_year(2026, &config.downloads_dir(2026)).await?;
//!     println!("fetched {} files", outcome.fetched.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod extract;
pub mod export;
pub mod fetch;
pub mod load;
pub mod report;
pub mod state;
pub mod types;
