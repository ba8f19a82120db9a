use super::{discord_directory, load_config};
use crate::output::{print_json, render_report};
use chrono::Utc;
use monthgate_core::Reconciler;
use std::path::Path;

pub fn run(config_path: &Path, token: &str, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let directory = discord_directory(&config, token)?;
    let reconciler = Reconciler::new(&config, directory)?;

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(reconciler.reconcile(Utc::now()))?;

    if json {
        print_json(&report)?;
    } else {
        print!("{}", render_report(&report));
    }

    if !report.is_clean() {
        anyhow::bail!(
            "{} of {} writes failed; the next run will retry them",
            report.writes_failed,
            report.writes_attempted
        );
    }
    Ok(())
}
