use crate::state::{AppState, RunRecord, Trigger};
use chrono::Utc;
use monthgate_core::{GateError, ReconciliationReport};
use tracing::{error, info, warn};

/// Run one reconciliation at wall-clock time, refusing to overlap with a run
/// already in progress. The outcome is stored as the last run either way.
pub async fn run_once(state: &AppState, trigger: Trigger) -> Result<ReconciliationReport, GateError> {
    let Some(_permit) = state.guard.try_acquire() else {
        warn!(%trigger, "reconciliation already running; skipping");
        return Err(GateError::AlreadyRunning);
    };

    info!(%trigger, "reconciliation triggered");
    let result = state.reconciler.reconcile(Utc::now()).await;

    let record = match &result {
        Ok(report) => {
            if report.is_clean() {
                info!(%trigger, summary = %report.summary(), "run complete");
            } else {
                warn!(%trigger, summary = %report.summary(), "run complete with failures");
            }
            RunRecord {
                trigger,
                finished_at: report.finished_at,
                status: "completed".to_string(),
                report: Some(report.clone()),
                error: None,
            }
        }
        Err(e) => {
            error!(%trigger, error = %e, "run aborted");
            RunRecord {
                trigger,
                finished_at: Utc::now(),
                status: "aborted".to_string(),
                report: None,
                error: Some(e.to_string()),
            }
        }
    };
    *state.last_run.write().await = Some(record);

    result
}
