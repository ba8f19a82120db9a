use crate::runner::run_once;
use crate::state::{AppState, Trigger};
use chrono::{DateTime, Utc};
use monthgate_core::config::ScheduleConfig;
use monthgate_core::PeriodKey;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Longest single sleep; the wall clock is re-read after each one.
const MAX_SLEEP: Duration = Duration::from_secs(3600);

/// First instant of the UTC month after the one containing `now`.
pub fn next_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    PeriodKey::of(now).succ().first_instant()
}

/// How long to sleep before re-checking for `target`.
pub fn sleep_step(now: DateTime<Utc>, target: DateTime<Utc>) -> Option<Duration> {
    if now >= target {
        return None;
    }
    let remaining = (target - now).to_std().unwrap_or(Duration::ZERO);
    Some(remaining.min(MAX_SLEEP))
}

async fn wait_until(target: DateTime<Utc>) {
    while let Some(step) = sleep_step(Utc::now(), target) {
        tokio::time::sleep(step).await;
    }
}

/// Start the month-boundary loop, or return `None` if scheduling is off.
pub fn spawn(state: AppState, schedule: &ScheduleConfig) -> Option<JoinHandle<()>> {
    if !schedule.enabled {
        info!("scheduler disabled; reconciliation runs only on demand");
        return None;
    }
    let run_on_start = schedule.run_on_start;
    Some(tokio::spawn(async move {
        if run_on_start {
            // Outcome is logged and recorded by run_once.
            let _ = run_once(&state, Trigger::Startup).await;
        }
        loop {
            let target = next_boundary(Utc::now());
            info!(next_run = %target.to_rfc3339(), "waiting for next month boundary");
            wait_until(target).await;
            let _ = run_once(&state, Trigger::Scheduled).await;
        }
    }))
}
