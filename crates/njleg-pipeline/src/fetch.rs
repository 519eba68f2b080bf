//! Archive fetcher (sync stage)
//!
//! Downloads the expected per-year archives from the publisher. Not every
//! file exists for every year (archival gaps), so a per-file miss is logged
//! and skipped; the stage only fails when the transport itself is
//! unreachable.

use crate::config::PipelineConfig;
use crate::types::FetchOutcome;
use njleg_common::{NjlegError, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Expected archive file names for a session year
pub fn expected_files(year: i32) -> Vec<String> {
    vec![
        format!("DB{year}.zip"),
        format!("DB{year}_TEXT.zip"),
        "Readme.txt".to_string(),
    ]
}

/// HTTP client for downloading session archives
pub struct ArchiveFetcher {
    client: Client,
    base_url: String,
}

/// Outcome of one file download attempt
enum FileResult {
    Fetched(String),
    Skipped(String),
}

impl ArchiveFetcher {
    /// Create a new fetcher from the pipeline configuration
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent("njleg-pipeline/0.1")
            .build()
            .map_err(|e| NjlegError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Fetcher against an explicit base URL, used by tests
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("njleg-pipeline/0.1")
            .build()
            .map_err(|e| NjlegError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Download the year's expected archives into `dest`
    ///
    /// Files are fetched concurrently since they are independent. Returns
    /// which files landed on disk and which the publisher does not have.
    pub async fn fetch_year(&self, year: i32, dest: &Path) -> Result<FetchOutcome> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(NjlegError::Io)?;

        let session_url = format!("{}/{}data", self.base_url.trim_end_matches('/'), year);
        info!(year, url = %session_url, "fetching session archives");

        let downloads = expected_files(year).into_iter().map(|file| {
            let url = format!("{session_url}/{file}");
            let out = dest.join(&file);
            async move { self.fetch_file(&url, &out, file).await }
        });

        let mut outcome = FetchOutcome::default();
        for result in futures::future::join_all(downloads).await {
            match result? {
                FileResult::Fetched(file) => outcome.fetched.push(file),
                FileResult::Skipped(file) => outcome.skipped.push(file),
            }
        }

        info!(
            year,
            fetched = outcome.fetched.len(),
            skipped = outcome.skipped.len(),
            "sync stage complete"
        );
        Ok(outcome)
    }

    /// Download one file; a miss is skippable, an unreachable host is not
    async fn fetch_file(&self, url: &str, out: &Path, file: String) -> Result<FileResult> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                // The publisher itself is unreachable; no point trying the
                // remaining files.
                return Err(NjlegError::Http(format!("cannot reach {url}: {e}")));
            }
            Err(e) => {
                warn!(%url, error = %e, "skipping file after request error");
                return Ok(FileResult::Skipped(file));
            }
        };

        if !response.status().is_success() {
            warn!(%url, status = %response.status(), "skipping missing file");
            return Ok(FileResult::Skipped(file));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NjlegError::Http(e.to_string()))?;
        tokio::fs::write(out, &bytes).await.map_err(NjlegError::Io)?;

        info!(%url, bytes = bytes.len(), "downloaded");
        Ok(FileResult::Fetched(file))
    }
}
