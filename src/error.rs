//! Error type shared by storage and HTTP handlers.
//!
//! Every variant maps to one HTTP status. Internal failures are logged here
//! and answered with a generic body so that database details never reach
//! the client. Failures of the language model never become an [`AppError`];
//! the AI gateway absorbs them.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;
use validator::ValidationErrors;

/// Result alias used across the crate.
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Field-level validation failure of a request body.
    #[error("validation failed")]
    Validation(#[from] ValidationErrors),

    /// A request that is malformed in a way not tied to one field.
    #[error("{0}")]
    BadRequest(String),

    /// No authenticated user accompanied the request.
    #[error("authentication required")]
    Unauthorized,

    /// Unknown id, or an id owned by another user.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("a record with these values already exists".to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::BadRequest("a referenced record does not exist".to_string())
            }
            _ => AppError::Internal(e.into()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Validation(errors) => json!({
                "error": self.to_string(),
                "fields": errors,
            }),
            AppError::Internal(e) => {
                error!(error = %e, "Internal error");
                json!({ "error": "internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
