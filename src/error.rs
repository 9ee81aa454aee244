use std::time::Duration;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error type shared by the repository and the HTTP layer.
///
/// Handlers return `Result<T, AppError>`; the response only ever carries a
/// short public message, the detail goes to the log.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("storage operation timed out after {0:?}")]
    StorageTimeout(Duration),

    // No per-user lookup exists yet.
    #[allow(dead_code)]
    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::StorageUnavailable(_) | AppError::StorageTimeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => AppError::StorageUnavailable("pool timed out".into()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => AppError::StorageUnavailable(e.to_string()),
            other => AppError::Internal(anyhow::Error::new(other).context("database query")),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        // Content type, syntax and shape problems all collapse into a 400.
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Validation(msg) => {
                tracing::warn!(error = %msg, "rejected request");
                msg.clone()
            }
            AppError::PayloadTooLarge => {
                tracing::warn!("request body over limit");
                "request body too large".to_string()
            }
            AppError::StorageUnavailable(detail) => {
                tracing::error!(error = %detail, "storage unavailable");
                "storage unavailable".to_string()
            }
            AppError::StorageTimeout(after) => {
                tracing::error!(timeout = ?after, "storage timed out");
                "storage timed out".to_string()
            }
            AppError::NotFound(what) => {
                tracing::debug!(%what, "not found");
                "not found".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                "internal server error".to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
