//! filetask HTTP service
//!
//! Accepts streamed file uploads, stores them in object storage, records a
//! pending task per file and publishes it to a durable work queue.

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;
