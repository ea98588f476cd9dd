use std::io;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header::CONTENT_LENGTH, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use filetask_core::{AppError, Task, TaskStatus};
use filetask_storage::StoredObject;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, HttpAppError};
use crate::services::{Submission, TaskError};
use crate::state::AppState;

/// Multipart field carrying the file
pub const FILE_FIELD: &str = "file";

const PERSIST_WARNING: &str =
    "File stored but the task record could not be saved; status lookups will not find it";
const PUBLISH_WARNING: &str =
    "File stored and task recorded but not enqueued; it stays pending until resubmitted";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    pub message: String,
    /// Object key in storage
    pub key: String,
    pub location: String,
    pub url: String,
    /// Bytes stored
    pub size: u64,
    pub task_id: String,
    pub task_status: TaskStatus,
    /// True when the file was stored but a later stage failed
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SubmitResponse {
    fn new(task: &Task, object: &StoredObject, message: &str, warning: Option<&str>) -> Self {
        Self {
            message: message.to_string(),
            key: object.key.clone(),
            location: object.location.clone(),
            url: object.location.clone(),
            size: object.size,
            task_id: task.id.to_string(),
            task_status: task.status,
            degraded: warning.is_some(),
            warning: warning.map(String::from),
        }
    }
}

/// Body errors while reading the file part. Hitting the request body limit
/// surfaces as `FileTooLarge` so storage reports it as an oversized upload.
fn field_read_error(err: MultipartError) -> io::Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        io::Error::new(io::ErrorKind::FileTooLarge, err)
    } else {
        io::Error::other(err)
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("Request body too large: {}", err))
    } else {
        AppError::BadRequest(format!("Invalid multipart body: {}", err))
    }
}

fn submit_response(result: Result<Submission, TaskError>) -> Result<Response, HttpAppError> {
    let (task, object, warning) = match result {
        Ok(Submission { task, object }) => (task, object, None),
        Err(TaskError::PersistFailed { task, object, .. }) => (*task, object, Some(PERSIST_WARNING)),
        Err(TaskError::PublishFailed { task, object, .. }) => (*task, object, Some(PUBLISH_WARNING)),
        Err(err) => {
            tracing::warn!(stage = err.stage(), error = %err, "File upload rejected");
            return Err(err.into());
        }
    };

    let (status, message) = match warning {
        None => (StatusCode::OK, "File uploaded successfully"),
        Some(_) => (StatusCode::ACCEPTED, "File uploaded with errors"),
    };

    tracing::info!(
        key = %object.key,
        task_id = %task.id,
        degraded = warning.is_some(),
        "File upload finished"
    );

    Ok((
        status,
        Json(SubmitResponse::new(&task, &object, message, warning)),
    )
        .into_response())
}

/// Streaming file upload
///
/// Streams the `file` part of a multipart form straight into object storage,
/// records a pending task and enqueues it for processing. A part-level
/// `Content-Length` is treated as the declared size.
///
/// # Errors
/// - 400 when the `file` field is missing or the body cannot be read
/// - 413 when the file exceeds the configured ceiling
/// - 502 when object storage rejects the upload
#[utoipa::path(
    post,
    path = "/api/file/streaming",
    tag = "files",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded and task enqueued", body = SubmitResponse),
        (status = 202, description = "File uploaded but the task record or queue message failed", body = SubmitResponse),
        (status = 400, description = "Missing file field or unreadable body", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 502, description = "Object storage failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_file_streaming"))]
pub async fn upload_file_streaming(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, HttpAppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let declared_size = field
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);

        tracing::info!(
            file = %file_name,
            size = declared_size,
            ct = %content_type,
            "Starting file upload"
        );

        let mut reader = StreamReader::new(Box::pin(field.map_err(field_read_error)));
        let result = state
            .orchestrator
            .submit(&mut reader, declared_size, &file_name, &content_type)
            .await;
        return submit_response(result);
    }

    tracing::warn!("Missing file parameter in upload request");
    Err(AppError::BadRequest("file parameter is required".to_string()).into())
}
