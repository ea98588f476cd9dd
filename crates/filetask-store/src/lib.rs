//! filetask Task Store Library
//!
//! Durable, expiring task records keyed by `task:{id}`. Values are the JSON
//! form of [`filetask_core::Task`] and every write resets the expiry.

pub mod factory;
pub mod keys;
pub mod memory;
#[cfg(feature = "store-redis")]
pub mod redis;
pub mod traits;

pub use factory::create_task_store;
pub use memory::MemoryTaskStore;
#[cfg(feature = "store-redis")]
pub use self::redis::RedisTaskStore;
pub use traits::{StoreError, StoreResult, TaskStore};
