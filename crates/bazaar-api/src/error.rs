use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use bazaar_db::QueryError;

/// Caller-facing error taxonomy. Store failures are logged and collapsed
/// into an opaque 500; everything else names the offending field or
/// entity in the response body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Invalid credentials.")]
    Unauthorized,
    #[error("Invalid credentials")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(err) => {
                error!("internal error: {err:#}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Server error occurred." })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Flattens a `spawn_blocking` join result; a panicked worker surfaces as
/// an internal error.
pub(crate) fn join_blocking<T>(
    joined: Result<anyhow::Result<T>, tokio::task::JoinError>,
) -> Result<T, ApiError> {
    match joined {
        Ok(inner) => inner.map_err(ApiError::from),
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            Err(ApiError::Internal(anyhow::anyhow!("worker join error")))
        }
    }
}
