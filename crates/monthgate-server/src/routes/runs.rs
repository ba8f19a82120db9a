use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use monthgate_core::ReconciliationReport;
use tracing::info;

use crate::{
    error::AppError,
    runner::run_once,
    state::{AppState, Trigger},
};

/// POST /api/sync: manual trigger. Replies with the run's report; per-write
/// failures are inside the report, not an error status.
///
/// The run is detached from the request: a client that disconnects stops
/// waiting for the report but never cuts a run short.
pub async fn trigger_sync(
    State(app): State<AppState>,
) -> Result<Json<ReconciliationReport>, AppError> {
    info!("manual sync requested");
    let handle = tokio::spawn(async move { run_once(&app, Trigger::Manual).await });
    let report = handle.await??;
    Ok(Json(report))
}

/// GET /api/runs/last: the most recent finished run, if any.
pub async fn last_run(State(app): State<AppState>) -> Response {
    match app.last_run.read().await.clone() {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no runs yet" })),
        )
            .into_response(),
    }
}
