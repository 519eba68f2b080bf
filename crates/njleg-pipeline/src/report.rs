//! Summary reporter
//!
//! Pure read-side rendering of the run-state ledger into a fixed-width
//! plain-text table. Derived output only; nothing here feeds back into the
//! pipeline.

use crate::state::{Ledger, Stage, YearRecord};
use chrono::Utc;
use njleg_common::Result;
use std::path::Path;

fn pad_right(value: &str, width: usize) -> String {
    if value.len() >= width {
        value[..width].to_string()
    } else {
        format!("{value:<width$}")
    }
}

/// The stage most recently touched in a year record
///
/// Ordered by `finished_at`, falling back to `started_at`, so an in-flight
/// stage shows up while it is still running.
fn last_stage(record: &YearRecord) -> Option<Stage> {
    record
        .stages
        .iter()
        .max_by_key(|(_, s)| s.finished_at.or(s.started_at))
        .map(|(stage, _)| *stage)
}

/// Render the ledger as a plain-text summary table, newest year first
pub fn render(ledger: &Ledger) -> String {
    let mut lines = Vec::new();

    lines.push("NJLEG PIPELINE SUMMARY".to_string());
    lines.push(format!("Generated: {}", Utc::now().to_rfc3339()));
    lines.push(format!(
        "Status: {}",
        format!("{:?}", ledger.status).to_lowercase()
    ));
    match ledger.config {
        Some(range) => lines.push(format!("Range: {} -> {}", range.start, range.stop)),
        None => lines.push("Range: ? -> ?".to_string()),
    }
    lines.push(String::new());

    let header = format!(
        "{}{}{}{}{}{}",
        pad_right("YEAR", 6),
        pad_right("STATUS", 12),
        pad_right("ATTEMPTS", 10),
        pad_right("ELAPSED(s)", 12),
        pad_right("LAST STAGE", 18),
        "LAST ERROR"
    );
    lines.push(header.clone());
    lines.push("-".repeat(header.len()));

    for (year, record) in ledger.years.iter().rev() {
        let stage = last_stage(record)
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();
        lines.push(format!(
            "{}{}{}{}{}{}",
            pad_right(&year.to_string(), 6),
            pad_right(&format!("{:?}", record.status).to_lowercase(), 12),
            pad_right(&record.attempts.to_string(), 10),
            pad_right(&record.elapsed_seconds.to_string(), 12),
            pad_right(&stage, 18),
            record.last_error.as_deref().unwrap_or("")
        ));
    }

    lines.join("\n")
}

/// Render the ledger and write the report to the fixed summary path
pub fn write_summary(ledger: &Ledger, path: &Path) -> Result<String> {
    let report = render(ledger);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &report)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{RunStateStore, Stage};

    #[test]
    fn test_render_lists_years_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStateStore::new(dir.path().join("pipeline_state.json"));
        store.begin_run(2024, 2026).unwrap();

        store.begin_year(2024).unwrap();
        store.complete_year(2024, 12).unwrap();
        store.begin_year(2026).unwrap();
        store.fail_year(2026, 3, "mdb-tables not found").unwrap();

        let report = render(&store.read().unwrap());

        let pos_2026 = report.find("2026").unwrap();
        let pos_2024 = report.find("2024  ").unwrap();
        assert!(pos_2026 < pos_2024);
        assert!(report.contains("mdb-tables not found"));
        assert!(report.contains("Range: 2024 -> 2026"));
    }

    #[test]
    fn test_last_stage_prefers_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStateStore::new(dir.path().join("pipeline_state.json"));

        store.begin_year(2026).unwrap();
        store.stage_started(2026, Stage::Sync).unwrap();
        store.stage_finished(2026, Stage::Sync, "ok").unwrap();
        store.stage_started(2026, Stage::Extract).unwrap();

        let ledger = store.read().unwrap();
        assert_eq!(last_stage(&ledger.years[&2026]), Some(Stage::Extract));
    }

    #[test]
    fn test_write_summary_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStateStore::new(dir.path().join("pipeline_state.json"));
        store.begin_year(2026).unwrap();
        store.complete_year(2026, 1).unwrap();

        let out = dir.path().join("pipeline_summary.txt");
        let report = write_summary(&store.read().unwrap(), &out).unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), report);
    }
}
