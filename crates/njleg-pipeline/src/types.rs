//! Artifact types passed between pipeline stages
//!
//! Each stage produces one typed artifact that the next stage consumes:
//! the extractor writes an [`ArchiveInventory`], the exporter writes an
//! [`ExportManifest`], and the loader returns a [`LoadResult`] per table.
//! Inventories and manifests are immutable once written; downstream stages
//! only read them.

use chrono::{DateTime, Utc};
use njleg_common::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One downloaded archive with its content hash, recorded for provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// Archive file name (e.g., "DB2026.zip")
    pub file: String,

    /// SHA-256 of the archive bytes, computed before extraction
    pub sha256: String,
}

/// Per-year record of what the extractor unpacked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveInventory {
    pub year: i32,

    /// Timestamp when the inventory was written
    pub created_at: DateTime<Utc>,

    /// One entry per extracted archive
    pub archives: Vec<InventoryEntry>,
}

/// One exported table in the year's export manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Source table name as reported by the table reader
    pub table: String,

    /// Path of the JSON record set, relative to the manifest's directory
    pub record_set_path: String,

    /// Number of data rows in the record set
    pub record_count: usize,
}

/// Per-year index of exported record sets; the sole input to the loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub year: i32,

    /// Timestamp when the manifest was written
    pub created_at: DateTime<Utc>,

    /// One entry per exported table
    pub tables: Vec<ManifestEntry>,
}

/// Result of the fetch stage for one year
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Files downloaded to disk
    pub fetched: Vec<String>,

    /// Files skipped because the publisher does not have them (archival gaps)
    pub skipped: Vec<String>,
}

/// Result of loading one table into the warehouse
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// Sanitized warehouse table name
    pub table_name: String,

    /// SHA-256 of the source record set file
    pub source_sha256: String,

    /// Rows inserted (0 when deduplicated)
    pub record_count: i64,

    /// True when an ingest run record for (year, table, hash) already
    /// existed and the load was a no-op
    pub deduplicated: bool,
}

impl ArchiveInventory {
    pub fn new(year: i32, archives: Vec<InventoryEntry>) -> Self {
        Self {
            year,
            created_at: Utc::now(),
            archives,
        }
    }

    /// Load an inventory from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the inventory to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl ExportManifest {
    pub fn new(year: i32, tables: Vec<ManifestEntry>) -> Self {
        Self {
            year,
            created_at: Utc::now(),
            tables,
        }
    }

    /// Load a manifest from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the manifest to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");

        let inventory = ArchiveInventory::new(
            2026,
            vec![InventoryEntry {
                file: "DB2026.zip".to_string(),
                sha256: "abc123".to_string(),
            }],
        );
        inventory.save(&path).unwrap();

        let loaded = ArchiveInventory::load(&path).unwrap();
        assert_eq!(loaded.year, 2026);
        assert_eq!(loaded.archives, inventory.archives);
    }

    #[test]
    fn test_manifest_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports_manifest.json");

        let manifest = ExportManifest::new(
            2024,
            vec![ManifestEntry {
                table: "MAINBILL".to_string(),
                record_set_path: "json/DB2024_MAINBILL.json".to_string(),
                record_count: 412,
            }],
        );
        manifest.save(&path).unwrap();

        let loaded = ExportManifest::load(&path).unwrap();
        assert_eq!(loaded.tables.len(), 1);
        assert_eq!(loaded.tables[0].record_count, 412);
    }
}
