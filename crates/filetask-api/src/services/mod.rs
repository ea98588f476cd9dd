pub mod task_orchestrator;

pub use task_orchestrator::{Submission, TaskError, TaskOrchestrator};
