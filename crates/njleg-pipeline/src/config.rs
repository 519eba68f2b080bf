//! Pipeline configuration
//!
//! All configuration comes from the environment (plus `.env` via dotenvy);
//! there are no other hidden configuration sources.

use njleg_common::{NjlegError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default publisher base URL for the per-year session directories.
pub const DEFAULT_BASE_URL: &str = "https://pub.njleg.state.nj.us/leg-databases";

/// Default root directory for downloads, extracted archives, and exports.
pub const DEFAULT_DATA_ROOT: &str = "./data/njleg";

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// Default timeout for one table-reader subprocess invocation in seconds.
pub const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 300;

/// Default database connect timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 10;

/// File name of the persisted run-state ledger under the data root.
pub const STATE_FILE_NAME: &str = "pipeline_state.json";

/// File name of the rendered summary report under the data root.
pub const SUMMARY_FILE_NAME: &str = "pipeline_summary.txt";

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// First session year to process (inclusive)
    pub start_year: i32,

    /// Last session year to process (inclusive)
    pub stop_year: i32,

    /// Root directory for all per-year pipeline output
    pub data_root: PathBuf,

    /// Publisher base URL
    pub base_url: String,

    /// Postgres connection string for the warehouse
    pub database_url: String,

    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,

    /// Table-reader subprocess timeout in seconds
    pub export_timeout_secs: u64,

    /// Database connect timeout in seconds
    pub db_connect_timeout_secs: u64,
}

impl PipelineConfig {
    /// Load configuration from environment and defaults
    ///
    /// Environment variables:
    /// - `NJLEG_YEAR`: single year (sets both start and stop)
    /// - `NJLEG_START_YEAR` / `NJLEG_STOP_YEAR`: year range
    /// - `NJLEG_OUT_DIR`: data root directory
    /// - `NJLEG_BASE_URL`: publisher base URL
    /// - `DATABASE_URL`: warehouse connection string
    /// - `NJLEG_HTTP_TIMEOUT_SECS` / `NJLEG_EXPORT_TIMEOUT_SECS`
    pub fn load() -> Result<Self> {
        Self::load_with_range(None, None)
    }

    /// Load configuration, letting the caller (e.g., CLI flags) override the
    /// year range from the environment
    pub fn load_with_range(start: Option<i32>, stop: Option<i32>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let single_year: Option<i32> = std::env::var("NJLEG_YEAR")
            .ok()
            .and_then(|s| s.parse().ok());

        let start_year = start
            .or_else(|| {
                std::env::var("NJLEG_START_YEAR")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .or(single_year)
            .ok_or_else(|| {
                NjlegError::Config(
                    "a year range is required (--start or NJLEG_YEAR/NJLEG_START_YEAR)".to_string(),
                )
            })?;

        let stop_year = stop
            .or_else(|| {
                std::env::var("NJLEG_STOP_YEAR")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .or(single_year)
            .unwrap_or(start_year);

        let config = PipelineConfig {
            start_year,
            stop_year,
            data_root: std::env::var("NJLEG_OUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_ROOT)),
            base_url: std::env::var("NJLEG_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            database_url: std::env::var("DATABASE_URL").unwrap_or_default(),
            http_timeout_secs: std::env::var("NJLEG_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            export_timeout_secs: std::env::var("NJLEG_EXPORT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_EXPORT_TIMEOUT_SECS),
            db_connect_timeout_secs: std::env::var("NJLEG_DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DB_CONNECT_TIMEOUT_SECS),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(NjlegError::Config("Base URL cannot be empty".to_string()));
        }

        if self.start_year > self.stop_year {
            return Err(NjlegError::Config(format!(
                "start_year ({}) cannot be greater than stop_year ({})",
                self.start_year, self.stop_year
            )));
        }

        if self.http_timeout_secs == 0 || self.export_timeout_secs == 0 {
            return Err(NjlegError::Config(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the persisted run-state ledger
    pub fn state_path(&self) -> PathBuf {
        self.data_root.join(STATE_FILE_NAME)
    }

    /// Path of the rendered summary report
    pub fn summary_path(&self) -> PathBuf {
        self.data_root.join(SUMMARY_FILE_NAME)
    }

    /// Year-scoped download directory
    pub fn downloads_dir(&self, year: i32) -> PathBuf {
        self.data_root.join("downloads").join(year.to_string())
    }

    /// Year-scoped extraction root (one subdirectory per archive)
    pub fn extract_root(&self, year: i32) -> PathBuf {
        self.data_root.join("extracted").join(year.to_string())
    }

    /// Year-scoped export directory (record sets and manifest)
    pub fn export_root(&self, year: i32) -> PathBuf {
        self.data_root.join("exports").join(year.to_string())
    }

    /// Per-year session directory URL at the publisher
    pub fn session_url(&self, year: i32) -> String {
        format!("{}/{}data", self.base_url.trim_end_matches('/'), year)
    }
}

/// Resolve the data root directory alone
///
/// Read-side commands (status, preflight) only need to locate the ledger;
/// they must work without a configured year range.
pub fn data_root_from_env() -> PathBuf {
    dotenvy::dotenv().ok();
    std::env::var("NJLEG_OUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_ROOT))
}

/// Build a config for a fixed year range rooted at the given directory.
///
/// Used by tests and by callers that already resolved their settings.
pub fn config_for(start_year: i32, stop_year: i32, data_root: &Path) -> PipelineConfig {
    PipelineConfig {
        start_year,
        stop_year,
        data_root: data_root.to_path_buf(),
        base_url: DEFAULT_BASE_URL.to_string(),
        database_url: String::new(),
        http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        export_timeout_secs: DEFAULT_EXPORT_TIMEOUT_SECS,
        db_connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut config = config_for(2026, 2024, Path::new("/tmp/njleg"));
        assert!(config.validate().is_err());
        config.stop_year = 2026;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_base_url() {
        let mut config = config_for(2024, 2026, Path::new("/tmp/njleg"));
        config.base_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_url() {
        let config = config_for(2026, 2026, Path::new("/tmp/njleg"));
        assert_eq!(
            config.session_url(2026),
            "https://pub.njleg.state.nj.us/leg-databases/2026data"
        );
    }

    #[test]
    fn test_year_scoped_paths_are_partitioned() {
        let config = config_for(2024, 2026, Path::new("/data"));
        assert_ne!(config.downloads_dir(2024), config.downloads_dir(2026));
        assert!(config
            .extract_root(2024)
            .starts_with(config.data_root.join("extracted")));
    }
}
