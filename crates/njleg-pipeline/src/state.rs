//! Persisted run-state ledger
//!
//! The ledger is the single source of truth for what happened: one document
//! per installation, one subtree per year, one record per stage attempt.
//! It is never inferred from the presence of output files.
//!
//! State machine per year: `pending -> running -> {completed | failed}`.
//! A `failed` year may be retried (back to `running`, attempts incremented);
//! `completed` is terminal unless the operator forces a re-run.
//!
//! Every transition is a single read-modify-write of the whole document,
//! persisted atomically (temp file + rename), so concurrent writers for
//! disjoint year ranges cannot corrupt each other's records.

use chrono::{DateTime, Utc};
use njleg_common::{NjlegError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Overall pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Per-year status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum YearStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Sync,
    Extract,
    Export,
    Load,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Sync, Stage::Extract, Stage::Export, Stage::Load];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Sync => "sync",
            Stage::Extract => "extract",
            Stage::Export => "export",
            Stage::Load => "load",
        }
    }

    /// The stage that must finish before this one may start
    pub fn previous(&self) -> Option<Stage> {
        match self {
            Stage::Sync => None,
            Stage::Extract => Some(Stage::Sync),
            Stage::Export => Some(Stage::Extract),
            Stage::Load => Some(Stage::Export),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamps and outcome of one stage execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Stage-specific outcome summary (e.g., "fetched 2, skipped 1")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

/// Audit record for one year; never deleted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub status: YearStatus,

    /// Execution attempts, monotonically increasing
    pub attempts: u32,

    /// Cumulative wall-clock seconds across attempts
    pub elapsed_seconds: u64,

    /// Stage records for the current attempt
    #[serde(default)]
    pub stages: BTreeMap<Stage, StageRecord>,

    /// Most recent error message, cleared on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Configured year range, immutable once a run begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub start: i32,
    pub stop: i32,
}

/// The full persisted ledger document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub status: PipelineStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<LedgerConfig>,

    #[serde(default)]
    pub years: BTreeMap<i32, YearRecord>,
}

/// Persisted run-state store over a single ledger file
pub struct RunStateStore {
    path: PathBuf,
}

impl RunStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full ledger snapshot; a missing file yields a fresh idle ledger
    pub fn read(&self) -> Result<Ledger> {
        if !self.path.exists() {
            return Ok(Ledger::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Mark the run started and pin the configured year range
    ///
    /// The range is immutable once set; a differing range is a config error.
    pub fn begin_run(&self, start: i32, stop: i32) -> Result<()> {
        self.mutate(|ledger| {
            let range = LedgerConfig { start, stop };
            match ledger.config {
                None => ledger.config = Some(range),
                Some(existing) if existing != range => {
                    return Err(NjlegError::Config(format!(
                        "ledger is pinned to year range {}..={}, refusing {}..={}",
                        existing.start, existing.stop, start, stop
                    )));
                }
                Some(_) => {}
            }
            ledger.status = PipelineStatus::Running;
            Ok(())
        })
    }

    /// Record the overall terminal status once all years have been attempted
    pub fn finish_run(&self) -> Result<PipelineStatus> {
        let mut finished = PipelineStatus::Completed;
        self.mutate(|ledger| {
            let any_failed = ledger
                .years
                .values()
                .any(|y| y.status == YearStatus::Failed);
            ledger.status = if any_failed {
                PipelineStatus::Failed
            } else {
                PipelineStatus::Completed
            };
            finished = ledger.status;
            Ok(())
        })?;
        Ok(finished)
    }

    /// Transition a year to `running` for a new attempt
    ///
    /// Creates the Year Record on first touch. Increments `attempts`, clears
    /// the previous attempt's stage records, and preserves `elapsed_seconds`
    /// and `last_error`. Returns the attempt number.
    pub fn begin_year(&self, year: i32) -> Result<u32> {
        let mut attempt = 0;
        self.mutate(|ledger| {
            let record = ledger.years.entry(year).or_default();
            if record.status == YearStatus::Completed {
                return Err(NjlegError::StageOrder {
                    year,
                    message: "year is completed; force a re-run to process it again".to_string(),
                });
            }
            record.status = YearStatus::Running;
            record.attempts += 1;
            record.stages.clear();
            attempt = record.attempts;
            Ok(())
        })?;
        debug!(year, attempt, "year transitioned to running");
        Ok(attempt)
    }

    /// Record that a stage started for the year's current attempt
    ///
    /// Enforces ordering: the preceding stage must have finished first.
    pub fn stage_started(&self, year: i32, stage: Stage) -> Result<()> {
        self.mutate(|ledger| {
            let record = running_year(ledger, year)?;
            if let Some(prev) = stage.previous() {
                let prev_done = record
                    .stages
                    .get(&prev)
                    .and_then(|s| s.finished_at)
                    .is_some();
                if !prev_done {
                    return Err(NjlegError::StageOrder {
                        year,
                        message: format!("{} cannot start before {} finishes", stage, prev),
                    });
                }
            }
            record.stages.insert(
                stage,
                StageRecord {
                    started_at: Some(Utc::now()),
                    finished_at: None,
                    outcome: None,
                },
            );
            Ok(())
        })
    }

    /// Record that a stage finished, with its outcome summary
    pub fn stage_finished(&self, year: i32, stage: Stage, outcome: &str) -> Result<()> {
        self.mutate(|ledger| {
            let record = running_year(ledger, year)?;
            let stage_record = record.stages.get_mut(&stage).ok_or_else(|| {
                NjlegError::StageOrder {
                    year,
                    message: format!("{} finished without being started", stage),
                }
            })?;
            if stage_record.started_at.is_none() {
                return Err(NjlegError::StageOrder {
                    year,
                    message: format!("{} finished without being started", stage),
                });
            }
            stage_record.finished_at = Some(Utc::now());
            stage_record.outcome = Some(outcome.to_string());
            Ok(())
        })
    }

    /// Terminal success for the year's current attempt
    ///
    /// Accumulates elapsed time and clears `last_error`.
    pub fn complete_year(&self, year: i32, elapsed_seconds: u64) -> Result<()> {
        self.mutate(|ledger| {
            let record = running_year(ledger, year)?;
            record.status = YearStatus::Completed;
            record.elapsed_seconds += elapsed_seconds;
            record.last_error = None;
            Ok(())
        })
    }

    /// Terminal failure for the year's current attempt
    ///
    /// Accumulates elapsed time and records the error; the year remains
    /// eligible for retry.
    pub fn fail_year(&self, year: i32, elapsed_seconds: u64, error: &str) -> Result<()> {
        self.mutate(|ledger| {
            let record = running_year(ledger, year)?;
            record.status = YearStatus::Failed;
            record.elapsed_seconds += elapsed_seconds;
            record.last_error = Some(error.to_string());
            Ok(())
        })
    }

    /// Operator override: return a completed year to `pending` for re-processing
    pub fn force_rerun(&self, year: i32) -> Result<()> {
        self.mutate(|ledger| {
            let record = ledger.years.entry(year).or_default();
            record.status = YearStatus::Pending;
            Ok(())
        })
    }

    /// Apply one mutation to the ledger and persist atomically
    ///
    /// The document is written to a sibling temp file and renamed over the
    /// target, so a concurrent reader never observes a partial write.
    fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Ledger) -> Result<()>,
    {
        let mut ledger = self.read()?;
        f(&mut ledger)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&ledger)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Fetch the year's record, requiring it to be in the `running` state
fn running_year(ledger: &mut Ledger, year: i32) -> Result<&mut YearRecord> {
    let record = ledger.years.get_mut(&year).ok_or(NjlegError::StageOrder {
        year,
        message: "year has no record; begin it first".to_string(),
    })?;
    if record.status != YearStatus::Running {
        return Err(NjlegError::StageOrder {
            year,
            message: format!("year is {:?}, expected running", record.status),
        });
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, RunStateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStateStore::new(dir.path().join("pipeline_state.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_reads_as_idle_ledger() {
        let (_dir, store) = store();
        let ledger = store.read().unwrap();
        assert_eq!(ledger.status, PipelineStatus::Idle);
        assert!(ledger.years.is_empty());
    }

    #[test]
    fn test_begin_year_creates_running_record() {
        let (_dir, store) = store();
        let attempt = store.begin_year(2026).unwrap();
        assert_eq!(attempt, 1);

        let ledger = store.read().unwrap();
        let record = &ledger.years[&2026];
        assert_eq!(record.status, YearStatus::Running);
        assert_eq!(record.attempts, 1);
    }

    #[test]
    fn test_stage_ordering_enforced() {
        let (_dir, store) = store();
        store.begin_year(2026).unwrap();

        // extract may not start before sync finishes
        let err = store.stage_started(2026, Stage::Extract).unwrap_err();
        assert!(matches!(err, NjlegError::StageOrder { year: 2026, .. }));

        store.stage_started(2026, Stage::Sync).unwrap();
        let err = store.stage_started(2026, Stage::Extract).unwrap_err();
        assert!(matches!(err, NjlegError::StageOrder { .. }));

        store.stage_finished(2026, Stage::Sync, "fetched 2").unwrap();
        store.stage_started(2026, Stage::Extract).unwrap();
    }

    #[test]
    fn test_finished_never_precedes_started() {
        let (_dir, store) = store();
        store.begin_year(2026).unwrap();
        store.stage_started(2026, Stage::Sync).unwrap();
        store.stage_finished(2026, Stage::Sync, "ok").unwrap();

        let ledger = store.read().unwrap();
        let sync = &ledger.years[&2026].stages[&Stage::Sync];
        assert!(sync.finished_at.unwrap() >= sync.started_at.unwrap());
    }

    #[test]
    fn test_stage_finished_requires_started() {
        let (_dir, store) = store();
        store.begin_year(2026).unwrap();
        let err = store.stage_finished(2026, Stage::Sync, "ok").unwrap_err();
        assert!(matches!(err, NjlegError::StageOrder { .. }));
    }

    #[test]
    fn test_retry_accounting() {
        let (_dir, store) = store();
        store.begin_year(2024).unwrap();
        store.fail_year(2024, 30, "mdb-export timed out").unwrap();

        let ledger = store.read().unwrap();
        assert_eq!(ledger.years[&2024].status, YearStatus::Failed);
        assert_eq!(ledger.years[&2024].elapsed_seconds, 30);
        assert_eq!(
            ledger.years[&2024].last_error.as_deref(),
            Some("mdb-export timed out")
        );

        // retry increments attempts and preserves elapsed time
        let attempt = store.begin_year(2024).unwrap();
        assert_eq!(attempt, 2);
        let ledger = store.read().unwrap();
        assert_eq!(ledger.years[&2024].elapsed_seconds, 30);

        store.complete_year(2024, 45).unwrap();
        let ledger = store.read().unwrap();
        assert_eq!(ledger.years[&2024].status, YearStatus::Completed);
        assert_eq!(ledger.years[&2024].elapsed_seconds, 75);
        assert!(ledger.years[&2024].last_error.is_none());
    }

    #[test]
    fn test_completed_year_is_terminal_without_force() {
        let (_dir, store) = store();
        store.begin_year(2022).unwrap();
        store.complete_year(2022, 10).unwrap();

        assert!(store.begin_year(2022).is_err());

        store.force_rerun(2022).unwrap();
        let attempt = store.begin_year(2022).unwrap();
        assert_eq!(attempt, 2);
    }

    #[test]
    fn test_begin_run_pins_year_range() {
        let (_dir, store) = store();
        store.begin_run(2020, 2026).unwrap();
        assert!(store.begin_run(2020, 2026).is_ok());
        assert!(store.begin_run(2019, 2026).is_err());
    }

    #[test]
    fn test_finish_run_reflects_year_outcomes() {
        let (_dir, store) = store();
        store.begin_run(2024, 2025).unwrap();

        store.begin_year(2024).unwrap();
        store.complete_year(2024, 5).unwrap();
        store.begin_year(2025).unwrap();
        store.fail_year(2025, 5, "boom").unwrap();

        assert_eq!(store.finish_run().unwrap(), PipelineStatus::Failed);

        store.begin_year(2025).unwrap();
        store.complete_year(2025, 5).unwrap();
        assert_eq!(store.finish_run().unwrap(), PipelineStatus::Completed);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let (dir, store) = store();
        store.begin_year(2026).unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_new_attempt_clears_stage_records() {
        let (_dir, store) = store();
        store.begin_year(2026).unwrap();
        store.stage_started(2026, Stage::Sync).unwrap();
        store.stage_finished(2026, Stage::Sync, "ok").unwrap();
        store.fail_year(2026, 1, "extract blew up").unwrap();

        store.begin_year(2026).unwrap();
        let ledger = store.read().unwrap();
        assert!(ledger.years[&2026].stages.is_empty());
    }
}
