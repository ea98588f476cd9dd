//! Component construction
//!
//! Leaf components are built first and passed into the orchestrator.

use crate::services::TaskOrchestrator;
use crate::state::AppState;
use anyhow::{Context, Result};
use filetask_core::{Config, IdGenerator};
use filetask_queue::create_publisher;
use filetask_storage::{create_storage, ObjectStoreGateway};
use filetask_store::create_task_store;
use std::sync::Arc;

pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let storage = create_storage(&config.storage)
        .await
        .context("Failed to initialize object storage")?;
    let gateway = ObjectStoreGateway::from_config(storage, &config.storage);
    gateway
        .ensure_bucket()
        .await
        .with_context(|| format!("Failed to provision bucket {}", config.storage.bucket))?;
    tracing::info!(
        backend = %config.storage.backend,
        bucket = %config.storage.bucket,
        max_upload_size = config.storage.max_upload_size,
        "Object storage ready"
    );

    let store = create_task_store(&config.store)
        .await
        .context("Failed to connect to task store")?;
    tracing::info!(backend = %config.store.backend, "Task store ready");

    let publisher = match create_publisher(&config.queue).await {
        Ok(publisher) => publisher,
        Err(e) => {
            // the store is already connected
            let _ = store.close().await;
            return Err(e).context("Failed to connect to work queue");
        }
    };
    tracing::info!(
        backend = %config.queue.backend,
        queue = %publisher.queue_name(),
        "Work queue ready"
    );

    let orchestrator = TaskOrchestrator::new(
        Arc::new(IdGenerator::new()),
        gateway,
        store.clone(),
        publisher.clone(),
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        orchestrator,
        store,
        publisher,
    }))
}
