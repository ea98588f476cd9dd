//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers;
use filetask_core::{Task, TaskStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "filetask API",
        version = "0.1.0",
        description = "Streams uploaded files into object storage, records a task per file and enqueues it for asynchronous processing."
    ),
    paths(
        handlers::files::upload_file_streaming,
        handlers::tasks::get_task_status,
        handlers::health::liveness_check,
    ),
    components(schemas(
        Task,
        TaskStatus,
        ErrorResponse,
        handlers::files::SubmitResponse,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "files", description = "File uploads"),
        (name = "tasks", description = "Task status"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;
