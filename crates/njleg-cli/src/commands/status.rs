//! `njleg status` - render the ledger as a summary report

use anyhow::Context;
use njleg_pipeline::config::{self, SUMMARY_FILE_NAME, STATE_FILE_NAME};
use njleg_pipeline::report;
use njleg_pipeline::state::RunStateStore;

pub fn run() -> anyhow::Result<()> {
    let data_root = config::data_root_from_env();
    let store = RunStateStore::new(data_root.join(STATE_FILE_NAME));
    let ledger = store.read().context("failed to read run-state ledger")?;

    let summary = report::write_summary(&ledger, &data_root.join(SUMMARY_FILE_NAME))
        .context("failed to write summary report")?;
    println!("{summary}");

    Ok(())
}
