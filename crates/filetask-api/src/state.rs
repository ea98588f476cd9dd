//! Application state shared by all handlers.

use crate::services::TaskOrchestrator;
use filetask_core::Config;
use filetask_queue::TaskPublisher;
use filetask_store::TaskStore;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub orchestrator: TaskOrchestrator,
    /// Kept alongside the orchestrator so shutdown can release connections.
    pub store: Arc<dyn TaskStore>,
    pub publisher: Arc<dyn TaskPublisher>,
}

impl AppState {
    /// Release the queue channel and the store connections.
    ///
    /// Both are attempted even when the first one fails.
    pub async fn close(&self) {
        if let Err(e) = self.publisher.close().await {
            tracing::warn!(error = %e, "Failed to close task publisher");
        }
        if let Err(e) = self.store.close().await {
            tracing::warn!(error = %e, "Failed to close task store");
        }
        tracing::info!("Backend connections closed");
    }
}
