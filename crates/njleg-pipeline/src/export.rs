//! Table exporter (export stage)
//!
//! Scans each extracted archive directory for an Access database file,
//! enumerates its tables through a [`TableReader`], and converts every
//! table's delimited export into a JSON record set (one field-name to
//! string-value map per row). Typed coercion is deliberately not performed
//! here; values stay strings and typing is a downstream concern.
//!
//! A failure exporting any single table aborts the whole year: the manifest
//! promises completeness to the loader, so it is only written when every
//! table exported.

use crate::types::{ExportManifest, ManifestEntry};
use async_trait::async_trait;
use njleg_common::{NjlegError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tracing::{debug, info, warn};

/// File name of the per-year export manifest under the export root.
pub const MANIFEST_FILE_NAME: &str = "exports_manifest.json";

/// Reader over a proprietary tabular database file
///
/// Seam between the exporter and the external tooling, so the stage is
/// testable without mdbtools or the filesystem layout it expects.
#[async_trait]
pub trait TableReader: Send + Sync {
    /// Enumerate all table names in the database
    async fn list_tables(&self, db: &Path) -> Result<Vec<String>>;

    /// Export one table as delimited text (first row is the header)
    async fn export_table(&self, db: &Path, table: &str) -> Result<String>;
}

/// `TableReader` backed by the mdbtools command line programs
pub struct MdbToolsReader {
    timeout: Duration,
}

impl MdbToolsReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run one subprocess with a bounded timeout, capturing stdout
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        let child = tokio::process::Command::new(program)
            .args(args)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                NjlegError::Subprocess(format!(
                    "{program} timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| NjlegError::Subprocess(format!("{program}: {e}")))?;

        if !output.status.success() {
            return Err(NjlegError::Subprocess(format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output)
    }
}

#[async_trait]
impl TableReader for MdbToolsReader {
    async fn list_tables(&self, db: &Path) -> Result<Vec<String>> {
        let db = db.to_string_lossy();
        let output = self.run("mdb-tables", &["-1", &db]).await?;
        let tables = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Ok(tables)
    }

    async fn export_table(&self, db: &Path, table: &str) -> Result<String> {
        let db = db.to_string_lossy();
        let output = self.run("mdb-export", &[&db, table]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Convert delimited text into records, first row as field names
///
/// All values remain strings. A row whose field count differs from the
/// header is a data-shape error; silently misaligned columns would corrupt
/// the warehouse load.
pub fn csv_to_records(csv_text: &str) -> Result<Vec<Map<String, Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| NjlegError::DataShape(format!("unreadable header row: {e}")))?
        .iter()
        .map(String::from)
        .collect();

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|e| NjlegError::DataShape(format!("row {}: {e}", index + 2)))?;
        if row.len() != headers.len() {
            return Err(NjlegError::DataShape(format!(
                "row {} has {} fields, header has {}",
                index + 2,
                row.len(),
                headers.len()
            )));
        }
        let mut record = Map::new();
        for (header, value) in headers.iter().zip(row.iter()) {
            record.insert(header.clone(), Value::String(value.to_string()));
        }
        records.push(record);
    }

    Ok(records)
}

/// Export every table of every extracted database for one year
///
/// Directories without a database file are skipped (text-only archives).
/// Record sets are written under `export_root/json/`; the manifest is the
/// last thing written.
pub async fn export_year<R: TableReader>(
    year: i32,
    extract_root: &Path,
    export_root: &Path,
    reader: &R,
) -> Result<ExportManifest> {
    let json_dir = export_root.join("json");
    std::fs::create_dir_all(&json_dir)?;

    let mut entries = Vec::new();

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(extract_root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        let Some(db_path) = find_database_file(&dir)? else {
            debug!(dir = %dir.display(), "no database file, skipping directory");
            continue;
        };
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let tables = reader.list_tables(&db_path).await?;
        info!(year, db = %db_path.display(), tables = tables.len(), "exporting tables");

        for table in tables {
            let csv_text = reader.export_table(&db_path, &table).await?;
            let records = csv_to_records(&csv_text).map_err(|e| {
                warn!(year, %table, error = %e, "table export rejected");
                e
            })?;

            let file_name = format!("{dir_name}_{table}.json");
            let record_set_path = json_dir.join(&file_name);
            std::fs::write(&record_set_path, serde_json::to_string_pretty(&records)?)?;

            entries.push(ManifestEntry {
                table,
                record_set_path: format!("json/{file_name}"),
                record_count: records.len(),
            });
        }
    }

    let manifest = ExportManifest::new(year, entries);
    manifest.save(export_root.join(MANIFEST_FILE_NAME))?;

    info!(year, tables = manifest.tables.len(), "export stage complete");
    Ok(manifest)
}

/// Locate the Access database file in an extracted archive directory
fn find_database_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("mdb"))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}
