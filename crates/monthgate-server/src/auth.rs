use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Axum middleware that gates `/api/*` behind a bearer token.
///
/// Auth flow (evaluated in order):
/// 1. Path outside `/api/` → passthrough (health check is always public)
/// 2. No token configured → 401 (manual triggers stay closed)
/// 3. `Authorization: Bearer TOKEN` matches → passthrough
/// 4. Otherwise → 401
pub async fn auth_middleware(
    State(token): State<Arc<Option<String>>>,
    req: Request,
    next: Next,
) -> Response {
    if !req.uri().path().starts_with("/api/") {
        return next.run(req).await;
    }

    let Some(token) = token.as_deref() else {
        return unauthorized("api disabled: MONTHGATE_API_TOKEN is not set");
    };

    let presented = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    if presented == Some(token) {
        return next.run(req).await;
    }

    unauthorized("unauthorized")
}

fn unauthorized(message: &str) -> Response {
    let body = serde_json::json!({ "error": message }).to_string();
    Response::builder()
        .status(401)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .expect("infallible: all header values are valid ASCII")
}
