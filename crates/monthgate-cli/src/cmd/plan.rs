use super::load_config;
use crate::output::{print_json, render_plan};
use chrono::{NaiveDate, Utc};
use monthgate_core::WindowTable;
use std::path::Path;

pub fn run(
    config_path: &Path,
    at: Option<NaiveDate>,
    tier: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let table = WindowTable::from_config(&config)?;

    let now = match at {
        Some(date) => date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
        None => Utc::now(),
    };

    let mut plan = table.plan(now);
    if let Some(name) = tier {
        table.window_of(name)?;
        plan.tiers.retain(|t| t.name == name);
    }

    if json {
        return print_json(&plan);
    }

    print!("{}", render_plan(&plan));
    Ok(())
}
