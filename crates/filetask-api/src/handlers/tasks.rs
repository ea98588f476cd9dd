use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::Json,
};
use filetask_core::Task;
use std::sync::Arc;

/// Get the current state of a task
#[utoipa::path(
    get,
    path = "/api/tasks/{task_id}/status",
    tag = "tasks",
    params(
        ("task_id" = String, Path, description = "Task identifier returned by the upload")
    ),
    responses(
        (status = 200, description = "Task found", body = Task),
        (status = 404, description = "Task not found or expired", body = ErrorResponse),
        (status = 503, description = "Task store unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, HttpAppError> {
    tracing::debug!(task_id = %task_id, "Getting task status");

    let task = state.orchestrator.status(&task_id).await?;
    Ok(Json(task))
}
