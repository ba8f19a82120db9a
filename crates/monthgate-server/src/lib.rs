pub mod auth;
pub mod error;
pub mod routes;
pub mod runner;
pub mod scheduler;
pub mod state;

use axum::routing::{get, post};
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use state::{AppState, RunRecord, Trigger};

/// Build the axum Router with all routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let token = Arc::new(app_state.api_token.clone());

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/plan", get(routes::plan::get_plan))
        .route("/api/sync", post(routes::runs::trigger_sync))
        .route("/api/runs/last", get(routes::runs::last_run))
        .layer(middleware::from_fn_with_state(token, auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the HTTP trigger on a pre-bound listener until the future is
/// dropped or the server fails.
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("monthgate listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
