use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use monthgate_core::GateError;

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequest(msg.into()).into())
    }
}

/// Sentinel carried through the `anyhow::Error` chain for explicit 400s.
#[derive(Debug)]
struct BadRequest(String);

impl std::fmt::Display for BadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BadRequest {}

fn status_for(err: &GateError) -> StatusCode {
    match err {
        GateError::AlreadyRunning => StatusCode::CONFLICT,
        GateError::CategoryNotFound(_) => StatusCode::NOT_FOUND,
        GateError::Resolution { .. } | GateError::CreateBucket { .. } => StatusCode::BAD_GATEWAY,
        GateError::UnknownTier(_) => StatusCode::NOT_FOUND,
        GateError::InvalidPeriod(_) => StatusCode::BAD_REQUEST,
        GateError::InvalidConfig(_)
        | GateError::ConfigNotFound(_)
        | GateError::Io(_)
        | GateError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<BadRequest>().is_some() {
            StatusCode::BAD_REQUEST
        } else if let Some(e) = self.0.downcast_ref::<GateError>() {
            status_for(e)
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
