//! Error types for the query API.
//!
//! [`QueryError`] converts into an Axum response with a
//! `{"error": ..., "status": ...}` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leaderboard_core::{CoreError, RankingError};

/// Errors returned by query handlers.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The requested entity is not ranked.
    #[error("not found: {0}")]
    NotFound(String),

    /// A path or query parameter is invalid.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The store could not be read in time, or the server is draining.
    /// Retryable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for QueryError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::StoreBusy { .. } => Self::Unavailable(e.to_string()),
            CoreError::Ranking(RankingError::NotFound(id)) => Self::NotFound(format!("entity {id}")),
            CoreError::Ranking(other) => Self::Internal(other.to_string()),
        }
    }
}

impl From<RankingError> for QueryError {
    fn from(e: RankingError) -> Self {
        CoreError::from(e).into()
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::InvalidQuery(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
