#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum::Router;
use axum_test::TestServer;
use filetask_api::services::TaskOrchestrator;
use filetask_api::setup::routes::setup_routes;
use filetask_api::state::AppState;
use filetask_core::{Config, IdGenerator, QueueBackend, StorageBackend, StoreBackend};
use filetask_queue::MemoryPublisher;
use filetask_storage::{MemoryStorage, ObjectStoreGateway};
use filetask_store::MemoryTaskStore;
use std::sync::Arc;

pub const UPLOAD_PATH: &str = "/api/file/streaming";

/// Server wired to in-memory backends that tests can inspect and break.
pub struct TestApp {
    pub server: TestServer,
    /// The same routes, for requests `TestServer` cannot express (streamed bodies)
    pub router: Router,
    pub storage: MemoryStorage,
    pub store: MemoryTaskStore,
    pub publisher: MemoryPublisher,
}

pub fn test_config(max_upload_size: u64) -> Config {
    let mut config = Config::default();
    config.storage.backend = StorageBackend::Memory;
    config.storage.max_upload_size = max_upload_size;
    config.store.backend = StoreBackend::Memory;
    config.queue.backend = QueueBackend::Memory;
    config
}

pub fn test_app(max_upload_size: u64) -> TestApp {
    let config = test_config(max_upload_size);

    let storage = MemoryStorage::new();
    let store = MemoryTaskStore::new(config.store.task_ttl);
    let publisher = MemoryPublisher::new(config.queue.queue_name.clone());

    let gateway = ObjectStoreGateway::from_config(Arc::new(storage.clone()), &config.storage);
    let orchestrator = TaskOrchestrator::new(
        Arc::new(IdGenerator::new()),
        gateway,
        Arc::new(store.clone()),
        Arc::new(publisher.clone()),
    );
    let state = Arc::new(AppState {
        config: config.clone(),
        orchestrator,
        store: Arc::new(store.clone()),
        publisher: Arc::new(publisher.clone()),
    });

    let router = setup_routes(&config, state).unwrap();
    let server = TestServer::new(router.clone().into_make_service())
        .expect("Failed to create test server");

    TestApp {
        server,
        router,
        storage,
        store,
        publisher,
    }
}

pub fn file_form(file_name: &str, content_type: &str, data: &[u8]) -> MultipartForm {
    let part = Part::bytes(data.to_vec())
        .file_name(file_name.to_string())
        .mime_type(content_type.to_string());
    MultipartForm::new().add_part("file", part)
}
