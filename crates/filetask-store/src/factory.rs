#[cfg(feature = "store-redis")]
use crate::RedisTaskStore;
use crate::{MemoryTaskStore, StoreResult, TaskStore};
#[cfg(not(feature = "store-redis"))]
use crate::StoreError;
use filetask_core::{StoreBackend, StoreConfig};
use std::sync::Arc;

/// Create a task store based on configuration
pub async fn create_task_store(config: &StoreConfig) -> StoreResult<Arc<dyn TaskStore>> {
    match config.backend {
        #[cfg(feature = "store-redis")]
        StoreBackend::Redis => {
            let store = RedisTaskStore::connect(config).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "store-redis"))]
        StoreBackend::Redis => Err(StoreError::Connection(
            "Redis task store not available (store-redis feature not enabled)".to_string(),
        )),

        StoreBackend::Memory => Ok(Arc::new(MemoryTaskStore::new(config.task_ttl))),
    }
}
