//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{ConflictKind, DomainError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request the engines never saw.
    BadRequest(String),
    /// Error raised by an engine.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": message }),
            ),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, serde_json::Value) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if err.is_internal() {
        tracing::error!(error = %err, "internal server error");
        return (status, serde_json::json!({ "error": "internal error" }));
    }

    let body = match &err {
        DomainError::Conflict(ConflictKind::Overlap { start, end, .. }) => serde_json::json!({
            "error": err.to_string(),
            "conflict": { "start": start, "end": end },
        }),
        _ => serde_json::json!({ "error": err.to_string() }),
    };
    (status, body)
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
