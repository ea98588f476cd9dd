//! Router assembly

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use filetask_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub const API_PREFIX: &str = "/api";

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

const DEFAULT_HTTP_CONCURRENCY_LIMIT: usize = 10_000;

fn setup_cors(config: &Config) -> Result<CorsLayer> {
    let origins = &config.instance.cors_origins;
    let cors = if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Request body ceiling: the file ceiling plus slack for the multipart
/// framing. The slack is never smaller than one upload chunk, so a storage
/// backend reading whole chunks sees the file ceiling before the body limit.
fn body_limit(config: &Config) -> usize {
    let slack = MULTIPART_OVERHEAD_BYTES.max(config.storage.chunk_upload_size as u64);
    let limit = config.storage.max_upload_size.saturating_add(slack);
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// Build the application router with all middleware applied.
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router> {
    let cors = setup_cors(config)?;

    // Server-level concurrency limit to protect against resource exhaustion under extreme load
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_HTTP_CONCURRENCY_LIMIT)
        .max(1);

    let body_limit = body_limit(config);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        body_limit_bytes = body_limit,
        "HTTP limits configured"
    );

    let api_routes = Router::new()
        .route(
            &format!("{}/file/streaming", API_PREFIX),
            post(handlers::files::upload_file_streaming),
        )
        .route(
            &format!("{}/tasks/{{task_id}}/status", API_PREFIX),
            get(handlers::tasks::get_task_status),
        )
        .with_state(state);

    let app = api_routes
        .route("/health", get(handlers::health::liveness_check))
        .route(
            &format!("{}/openapi.json", API_PREFIX),
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        // multipart bodies are bounded by RequestBodyLimitLayer instead of axum's 2 MB default
        .layer(DefaultBodyLimit::disable())
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware));

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit_adds_multipart_overhead() {
        let mut config = Config::default();
        config.storage.max_upload_size = 10;
        config.storage.chunk_upload_size = 64 * 1024;
        assert_eq!(body_limit(&config), 10 + 1024 * 1024);
    }

    #[test]
    fn test_body_limit_covers_a_whole_chunk() {
        let mut config = Config::default();
        config.storage.max_upload_size = 100 * 1024 * 1024;
        config.storage.chunk_upload_size = 5 * 1024 * 1024;
        assert_eq!(body_limit(&config), 105 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_cors_origin_rejected() {
        let mut config = Config::default();
        config.instance.cors_origins = vec!["bad\norigin".to_string()];
        assert!(setup_cors(&config).is_err());
    }
}
