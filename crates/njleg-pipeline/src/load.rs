//! Warehouse loader (load stage)
//!
//! Loads each exported record set into a per-table warehouse relation of
//! fixed shape (`year int, data jsonb`) under the `njleg_raw` schema:
//! schema-on-read, no mapping of source fields to typed columns.
//!
//! Deduplication is enforced by the `ingest_runs` uniqueness constraint on
//! `(year, table_name, source_sha256)`, not by pre-checking: the guarded
//! insert of the run record and the row inserts share one transaction, so
//! re-running the loader against byte-identical exported content is a
//! no-op and a crash can never leave a table half-loaded but marked done.

use crate::config::PipelineConfig;
use crate::types::{ExportManifest, LoadResult, ManifestEntry};
use njleg_common::{checksum, NjlegError, Result};
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Warehouse schema holding all raw legislative tables.
pub const WAREHOUSE_SCHEMA: &str = "njleg_raw";

/// Maximum length of a sanitized table name, excluding the prefix.
const MAX_TABLE_NAME_LEN: usize = 60;

/// Derive a warehouse table name from a source table name
///
/// Pure and total: lowercases, replaces anything outside `[a-z0-9_]` with
/// `_`, truncates to a bounded length, and prefixes `t_` so the result can
/// never collide with reserved or system names. Distinct inputs may still
/// collide after truncation; [`check_collisions`] rejects those explicitly.
pub fn sanitize_table_name(source: &str) -> String {
    let cleaned: String = source
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .take(MAX_TABLE_NAME_LEN)
        .collect();
    format!("t_{cleaned}")
}

/// Map each manifest entry to its warehouse table name, rejecting collisions
///
/// Two distinct source tables truncating to the same warehouse name would
/// silently interleave their rows; that is an explicit error instead.
pub fn check_collisions(entries: &[ManifestEntry]) -> Result<HashMap<String, String>> {
    let mut by_sanitized: HashMap<String, &str> = HashMap::new();
    let mut mapping = HashMap::new();

    for entry in entries {
        let sanitized = sanitize_table_name(&entry.table);
        if let Some(first) = by_sanitized.get(&sanitized) {
            if *first != entry.table {
                return Err(NjlegError::TableNameCollision {
                    first: first.to_string(),
                    second: entry.table.clone(),
                    sanitized,
                });
            }
        }
        by_sanitized.insert(sanitized.clone(), &entry.table);
        mapping.insert(entry.table.clone(), sanitized);
    }

    Ok(mapping)
}

/// Postgres-backed warehouse loader
pub struct WarehouseLoader {
    pool: PgPool,
}

impl WarehouseLoader {
    /// Connect to the warehouse with a bounded connect timeout
    pub async fn connect(config: &PipelineConfig) -> Result<Self> {
        if config.database_url.is_empty() {
            return Err(NjlegError::Config("DATABASE_URL is required".to_string()));
        }

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| NjlegError::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the warehouse schema and the ingest-run ledger table
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&format!("create schema if not exists {WAREHOUSE_SCHEMA}"))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query(&format!(
            "create table if not exists {WAREHOUSE_SCHEMA}.ingest_runs (
                year int not null,
                table_name text not null,
                source_sha256 text not null,
                record_count int not null,
                loaded_at timestamptz not null default now(),
                unique (year, table_name, source_sha256)
            )"
        ))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Load every table in the year's export manifest
    ///
    /// Table loads are independent: a failure on one table is recorded and
    /// the rest still load, so a retried year only re-attempts the tables
    /// whose ingest run record is missing. The stage as a whole fails if
    /// any table failed.
    pub async fn load_year(
        &self,
        manifest: &ExportManifest,
        export_root: &Path,
    ) -> Result<Vec<LoadResult>> {
        // Reject truncation collisions before touching the warehouse.
        let names = check_collisions(&manifest.tables)?;

        self.ensure_schema().await?;

        let mut results = Vec::new();
        let mut failures = Vec::new();

        for entry in &manifest.tables {
            let table_name = &names[&entry.table];
            match self.load_table(manifest.year, entry, table_name, export_root).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(year = manifest.year, table = %entry.table, error = %e, "table load failed");
                    failures.push(format!("{}: {e}", entry.table));
                }
            }
        }

        if !failures.is_empty() {
            return Err(NjlegError::Database(format!(
                "{} of {} tables failed to load: {}",
                failures.len(),
                manifest.tables.len(),
                failures.join("; ")
            )));
        }

        info!(year = manifest.year, tables = results.len(), "load stage complete");
        Ok(results)
    }

    /// Load one record set, guarded by its ingest run record
    async fn load_table(
        &self,
        year: i32,
        entry: &ManifestEntry,
        table_name: &str,
        export_root: &Path,
    ) -> Result<LoadResult> {
        let record_set_path = export_root.join(&entry.record_set_path);
        let source_sha256 = checksum::sha256_file(&record_set_path)?;

        let content = std::fs::read_to_string(&record_set_path)?;
        let records: Vec<Map<String, Value>> = serde_json::from_str(&content)?;

        sqlx::query(&format!(
            "create table if not exists {WAREHOUSE_SCHEMA}.{table_name} (
                year int not null,
                data jsonb not null
            )"
        ))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Uniqueness-guarded insert: zero rows affected means this exact
        // content was already loaded and the row inserts must be skipped.
        let inserted = sqlx::query(&format!(
            "insert into {WAREHOUSE_SCHEMA}.ingest_runs
                 (year, table_name, source_sha256, record_count)
             values ($1, $2, $3, $4)
             on conflict do nothing"
        ))
        .bind(year)
        .bind(table_name)
        .bind(&source_sha256)
        .bind(records.len() as i32)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await.map_err(db_err)?;
            info!(year, table = %table_name, sha256 = %source_sha256, "already loaded, skipping");
            return Ok(LoadResult {
                table_name: table_name.to_string(),
                source_sha256,
                record_count: 0,
                deduplicated: true,
            });
        }

        for record in &records {
            sqlx::query(&format!(
                "insert into {WAREHOUSE_SCHEMA}.{table_name} (year, data) values ($1, $2)"
            ))
            .bind(year)
            .bind(Value::Object(record.clone()))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        info!(year, table = %table_name, rows = records.len(), "table loaded");
        Ok(LoadResult {
            table_name: table_name.to_string(),
            source_sha256,
            record_count: records.len() as i64,
            deduplicated: false,
        })
    }

    /// Row count of one warehouse table for a year, used by tests
    pub async fn table_row_count(&self, table_name: &str, year: i32) -> Result<i64> {
        let row = sqlx::query(&format!(
            "select count(*) as n from {WAREHOUSE_SCHEMA}.{table_name} where year = $1"
        ))
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.get::<i64, _>("n"))
    }
}

fn db_err(e: sqlx::Error) -> NjlegError {
    NjlegError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExportManifest;

    #[test]
    fn test_sanitize_lowercases_and_prefixes() {
        assert_eq!(sanitize_table_name("MAINBILL"), "t_mainbill");
        assert_eq!(sanitize_table_name("Bill History"), "t_bill_history");
    }

    #[test]
    fn test_sanitize_replaces_special_characters() {
        assert_eq!(sanitize_table_name("VOTES-2026!"), "t_votes_2026_");
    }

    #[test]
    fn test_sanitize_truncates_long_names() {
        let long = "X".repeat(100);
        let sanitized = sanitize_table_name(&long);
        assert_eq!(sanitized.len(), 2 + 60);
        assert!(sanitized.starts_with("t_"));
    }

    #[test]
    fn test_sanitize_is_total_on_empty_input() {
        assert_eq!(sanitize_table_name(""), "t_");
    }

    #[test]
    fn test_collision_detection() {
        let entries = vec![
            ManifestEntry {
                table: format!("{}A", "X".repeat(60)),
                record_set_path: "json/a.json".to_string(),
                record_count: 1,
            },
            ManifestEntry {
                table: format!("{}B", "X".repeat(60)),
                record_set_path: "json/b.json".to_string(),
                record_count: 1,
            },
        ];

        let err = check_collisions(&entries).unwrap_err();
        assert!(matches!(err, NjlegError::TableNameCollision { .. }));
    }

    #[test]
    fn test_distinct_names_do_not_collide() {
        let entries = vec![
            ManifestEntry {
                table: "MAINBILL".to_string(),
                record_set_path: "json/a.json".to_string(),
                record_count: 1,
            },
            ManifestEntry {
                table: "ROSTER".to_string(),
                record_set_path: "json/b.json".to_string(),
                record_count: 1,
            },
        ];

        let mapping = check_collisions(&entries).unwrap();
        assert_eq!(mapping["MAINBILL"], "t_mainbill");
        assert_eq!(mapping["ROSTER"], "t_roster");
    }

    /// Requires a live Postgres at DATABASE_URL.
    #[tokio::test]
    #[ignore]
    async fn test_loading_twice_is_idempotent() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = PgPool::connect(&url).await.unwrap();
        let loader = WarehouseLoader::from_pool(pool);

        let dir = tempfile::tempdir().unwrap();
        let json_dir = dir.path().join("json");
        std::fs::create_dir_all(&json_dir).unwrap();
        std::fs::write(
            json_dir.join("DB2026_MAINBILL.json"),
            r#"[{"BillNumber":"A100","Synopsis":"Roads"}]"#,
        )
        .unwrap();

        let manifest = ExportManifest::new(
            2026,
            vec![ManifestEntry {
                table: "MAINBILL".to_string(),
                record_set_path: "json/DB2026_MAINBILL.json".to_string(),
                record_count: 1,
            }],
        );

        let first = loader.load_year(&manifest, dir.path()).await.unwrap();
        assert!(!first[0].deduplicated);
        let count_after_first = loader.table_row_count("t_mainbill", 2026).await.unwrap();

        let second = loader.load_year(&manifest, dir.path()).await.unwrap();
        assert!(second[0].deduplicated);
        let count_after_second = loader.table_row_count("t_mainbill", 2026).await.unwrap();

        assert_eq!(count_after_first, count_after_second);
    }
}
