//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Anything that
//! converts into `AppError` (including the orchestrator's `TaskError`) renders
//! with a consistent status, body and log level.

use crate::services::TaskError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use filetask_core::{AppError, ErrorMetadata, LogLevel};
use filetask_storage::StorageError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client (e.g., "Upload a smaller file")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from filetask-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<TaskError> for AppError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::PayloadTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            TaskError::UploadFailed {
                source: StorageError::StreamRead(_),
                ..
            } => AppError::BadRequest(format!("Could not read the uploaded file: {}", err)),
            TaskError::UploadFailed { .. } => AppError::Storage(err.to_string()),
            TaskError::PersistFailed { .. } | TaskError::StoreUnavailable(_) => {
                AppError::TaskStore(err.to_string())
            }
            TaskError::PublishFailed { .. } => AppError::Queue(err.to_string()),
            TaskError::NotFound(_) => AppError::NotFound("task not found".to_string()),
        }
    }
}

impl From<TaskError> for HttpAppError {
    fn from(err: TaskError) -> Self {
        HttpAppError(err.into())
    }
}

pub(crate) fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.eq_ignore_ascii_case("production") || env.eq_ignore_ascii_case("prod"))
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Details only leave the process outside production and for non-sensitive errors.
        let expose = !is_production_env() && !app_error.is_sensitive();
        let body = ErrorResponse {
            error: app_error.client_message(),
            details: expose.then(|| app_error.detailed_message()),
            error_type: expose.then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetask_core::TaskId;

    #[test]
    fn test_task_error_mapping() {
        let too_large: AppError = TaskError::PayloadTooLarge { size: 10, limit: 5 }.into();
        assert_eq!(too_large.http_status_code(), 413);

        let upload: AppError = TaskError::UploadFailed {
            task_id: TaskId::from_u128(1),
            source: StorageError::QuotaExceeded("bucket full".to_string()),
        }
        .into();
        assert_eq!(upload.http_status_code(), 502);
        assert_eq!(upload.error_code(), "STORAGE_ERROR");

        let not_found: AppError = TaskError::NotFound("x".to_string()).into();
        assert_eq!(not_found.http_status_code(), 404);
        assert_eq!(not_found.client_message(), "task not found");
    }

    #[test]
    fn test_stream_read_is_client_error() {
        let err: AppError = TaskError::UploadFailed {
            task_id: TaskId::from_u128(1),
            source: StorageError::StreamRead(std::io::Error::other("connection reset")),
        }
        .into();
        assert_eq!(err.http_status_code(), 400);
    }
}
