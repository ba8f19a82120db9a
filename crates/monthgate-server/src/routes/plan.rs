use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use monthgate_core::AccessPlan;
use serde::Deserialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    /// Evaluate at this date (`YYYY-MM-DD`, UTC) instead of now.
    pub at: Option<String>,
}

/// GET /api/plan: buckets each tier may see. Pure; no directory calls.
pub async fn get_plan(
    State(app): State<AppState>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<AccessPlan>, AppError> {
    let now = match query.at.as_deref() {
        None => Utc::now(),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| AppError::bad_request(format!("invalid date '{raw}': expected YYYY-MM-DD")))?,
    };
    Ok(Json(app.reconciler.plan(now)))
}
