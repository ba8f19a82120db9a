use axum::{extract::State, Json};

use crate::state::AppState;

/// GET /health: liveness plus a short view of the last run.
pub async fn health(State(app): State<AppState>) -> Json<serde_json::Value> {
    let last = app.last_run.read().await;
    let last_run = last.as_ref().map(|r| {
        serde_json::json!({
            "trigger": r.trigger,
            "status": r.status,
            "finished_at": r.finished_at,
            "summary": r.report.as_ref().map(|rep| rep.summary()),
            "error": r.error,
        })
    });
    Json(serde_json::json!({
        "status": "ok",
        "running": app.guard.is_running(),
        "category_id": app.reconciler.category_id(),
        "last_run": last_run,
    }))
}
