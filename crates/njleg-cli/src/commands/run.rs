//! `njleg run` - drive the pipeline across the configured year range

use anyhow::Context;
use njleg_pipeline::config::PipelineConfig;
use njleg_pipeline::export::{self, MdbToolsReader};
use njleg_pipeline::fetch::ArchiveFetcher;
use njleg_pipeline::load::WarehouseLoader;
use njleg_pipeline::state::{RunStateStore, Stage, YearStatus};
use njleg_pipeline::{extract, report};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub async fn run(start: Option<i32>, stop: Option<i32>, force: bool) -> anyhow::Result<()> {
    let config = PipelineConfig::load_with_range(start, stop)?;
    let store = RunStateStore::new(config.state_path());
    store.begin_run(config.start_year, config.stop_year)?;

    let fetcher = ArchiveFetcher::new(&config)?;
    let reader = MdbToolsReader::new(Duration::from_secs(config.export_timeout_secs));

    for year in config.start_year..=config.stop_year {
        let ledger = store.read()?;
        let completed = ledger
            .years
            .get(&year)
            .map(|y| y.status == YearStatus::Completed)
            .unwrap_or(false);
        if completed {
            if force {
                store.force_rerun(year)?;
            } else {
                info!(year, "already completed, skipping");
                continue;
            }
        }

        let attempt = store.begin_year(year)?;
        info!(year, attempt, "processing year");
        let started = Instant::now();

        // A failed year is recorded and retried later; it never blocks the
        // remaining years.
        match process_year(&config, &store, &fetcher, &reader, year).await {
            Ok(()) => {
                store.complete_year(year, started.elapsed().as_secs())?;
                info!(year, "year completed");
            }
            Err(e) => {
                warn!(year, error = %e, "year failed");
                store.fail_year(year, started.elapsed().as_secs(), &e.to_string())?;
            }
        }
    }

    let status = store.finish_run()?;
    let report = report::write_summary(&store.read()?, &config.summary_path())
        .context("failed to write summary report")?;
    println!("{report}");
    info!(status = ?status, "run finished");

    Ok(())
}

/// Drive one year through sync, extract, export, and load
async fn process_year(
    config: &PipelineConfig,
    store: &RunStateStore,
    fetcher: &ArchiveFetcher,
    reader: &MdbToolsReader,
    year: i32,
) -> njleg_common::Result<()> {
    store.stage_started(year, Stage::Sync)?;
    let outcome = fetcher.fetch_year(year, &config.downloads_dir(year)).await?;
    store.stage_finished(
        year,
        Stage::Sync,
        &format!("fetched {}, skipped {}", outcome.fetched.len(), outcome.skipped.len()),
    )?;

    store.stage_started(year, Stage::Extract)?;
    let inventory =
        extract::extract_year(year, &config.downloads_dir(year), &config.extract_root(year))?;
    store.stage_finished(
        year,
        Stage::Extract,
        &format!("{} archives", inventory.archives.len()),
    )?;

    store.stage_started(year, Stage::Export)?;
    let manifest = export::export_year(
        year,
        &config.extract_root(year),
        &config.export_root(year),
        reader,
    )
    .await?;
    store.stage_finished(
        year,
        Stage::Export,
        &format!("{} tables", manifest.tables.len()),
    )?;

    store.stage_started(year, Stage::Load)?;
    let loader = WarehouseLoader::connect(config).await?;
    let results = loader.load_year(&manifest, &config.export_root(year)).await?;
    let deduplicated = results.iter().filter(|r| r.deduplicated).count();
    store.stage_finished(
        year,
        Stage::Load,
        &format!(
            "{} loaded, {} deduplicated",
            results.len() - deduplicated,
            deduplicated
        ),
    )?;

    Ok(())
}
