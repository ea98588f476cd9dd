mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use common::{file_form, test_app, test_config, UPLOAD_PATH};
use filetask_api::handlers::files::SubmitResponse;
use filetask_core::{Task, TaskStatus};
use std::future::IntoFuture;
use tower::ServiceExt;

#[tokio::test]
async fn test_upload_end_to_end() {
    let app = test_app(1024);

    let response = app
        .server
        .post(UPLOAD_PATH)
        .multipart(file_form("a.png", "image/png", b"0123456789"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: SubmitResponse = response.json();
    assert_eq!(body.task_status, TaskStatus::Pending);
    assert_eq!(body.size, 10);
    assert!(!body.degraded);
    assert!(body.warning.is_none());
    assert_eq!(body.key, format!("uploads/{}.png", body.task_id));

    let blob = app.storage.object(&body.key).unwrap();
    assert_eq!(blob.data, b"0123456789");
    assert_eq!(blob.content_type, "image/png");

    let messages = app.publisher.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id.to_string(), body.task_id);
    assert_eq!(messages[0].file_name, "a.png");

    let status = app
        .server
        .get(&format!("/api/tasks/{}/status", body.task_id))
        .await;
    assert_eq!(status.status_code(), StatusCode::OK);
    let task: Task = status.json();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.file_name, "a.png");
    assert_eq!(task.file_size, 10);
    assert_eq!(task.content_type, "image/png");
    assert_eq!(task.object_key, body.key);
}

#[tokio::test]
async fn test_oversized_upload_rejected_without_side_effects() {
    let app = test_app(5);

    let response = app
        .server
        .post(UPLOAD_PATH)
        .multipart(file_form("a.png", "image/png", b"0123456789"))
        .await;

    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    assert!(app.storage.is_empty());
    assert!(app.store.is_empty());
    assert!(app.publisher.bodies().is_empty());
}

#[tokio::test]
async fn test_missing_file_field_is_bad_request() {
    let app = test_app(1024);
    let form = MultipartForm::new().add_part("other", Part::text("hello"));

    let response = app.server.post(UPLOAD_PATH).multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "file parameter is required");
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_bad_gateway() {
    let app = test_app(1024);
    app.storage.set_unavailable(true);

    let response = app
        .server
        .post(UPLOAD_PATH)
        .multipart(file_form("a.txt", "text/plain", b"abc"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "STORAGE_ERROR");
    assert!(app.store.is_empty());
    assert!(app.publisher.bodies().is_empty());
}

#[tokio::test]
async fn test_publish_failure_is_degraded_and_task_stays_pending() {
    let app = test_app(1024);
    app.publisher.set_reject(true);

    let response = app
        .server
        .post(UPLOAD_PATH)
        .multipart(file_form("a.png", "image/png", b"0123456789"))
        .await;

    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let body: SubmitResponse = response.json();
    assert!(body.degraded);
    assert!(body.warning.is_some());
    assert!(app.storage.object(&body.key).is_some());

    let status = app
        .server
        .get(&format!("/api/tasks/{}/status", body.task_id))
        .await;
    assert_eq!(status.status_code(), StatusCode::OK);
    let task: Task = status.json();
    assert_eq!(task.status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_store_failure_is_degraded_without_message() {
    let app = test_app(1024);
    app.store.set_unavailable(true);

    let response = app
        .server
        .post(UPLOAD_PATH)
        .multipart(file_form("a.png", "image/png", b"0123456789"))
        .await;

    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let body: SubmitResponse = response.json();
    assert!(body.degraded);
    assert!(app.storage.object(&body.key).is_some());
    assert!(app.publisher.bodies().is_empty());
}

#[tokio::test]
async fn test_missing_content_type_defaults_to_octet_stream() {
    let app = test_app(1024);
    let form =
        MultipartForm::new().add_part("file", Part::bytes(b"abc".to_vec()).file_name("blob"));

    let response = app.server.post(UPLOAD_PATH).multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: SubmitResponse = response.json();
    assert_eq!(body.key, format!("uploads/{}", body.task_id));
    assert_eq!(
        app.storage.object(&body.key).unwrap().content_type,
        "application/octet-stream"
    );
}

#[tokio::test]
async fn test_concurrent_uploads_get_distinct_ids() {
    let app = test_app(1024);

    let requests = (0..8).map(|i| {
        app.server
            .post(UPLOAD_PATH)
            .multipart(file_form(&format!("f{}.txt", i), "text/plain", b"abc"))
            .into_future()
    });
    let responses = futures::future::join_all(requests).await;

    let mut ids: Vec<String> = responses
        .into_iter()
        .map(|r| r.json::<SubmitResponse>().task_id)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(app.storage.len(), 8);
    assert_eq!(app.publisher.bodies().len(), 8);
}

const BOUNDARY: &str = "filetask-boundary";

/// Multipart body with a filler field ahead of the file part
fn padded_multipart(padding: usize, file: usize) -> Vec<u8> {
    let mut body = Vec::with_capacity(padding + file + 512);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"padding\"\r\n\r\n"
        )
        .as_bytes(),
    );
    body.resize(body.len() + padding, b'p');
    body.extend_from_slice(
        format!(
            "\r\n--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.resize(body.len() + file, b'f');
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Send `body` without a Content-Length so the body limit trips mid-stream
async fn post_streamed(app: &common::TestApp, body: Vec<u8>) -> (StatusCode, serde_json::Value) {
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
        body.chunks(16 * 1024).map(|c| Ok(c.to_vec())).collect();
    let request = Request::builder()
        .method("POST")
        .uri(UPLOAD_PATH)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from_stream(futures::stream::iter(chunks)))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_body_limit_hit_inside_file_part_is_payload_too_large() {
    let max = 256 * 1024;
    let app = test_app(max);
    let config = test_config(max);
    let slack = (config.storage.chunk_upload_size as u64).max(1024 * 1024) as usize;

    // The file alone fits the ceiling, but the padding pushes the body past
    // the limit about 64 KiB into the file part.
    let body = padded_multipart(slack + 192 * 1024, 128 * 1024);
    let (status, json) = post_streamed(&app, body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
    assert!(app.storage.is_empty());
    assert!(app.store.is_empty());
    assert!(app.publisher.bodies().is_empty());
}

#[tokio::test]
async fn test_body_limit_hit_before_file_part_is_payload_too_large() {
    let max = 256 * 1024;
    let app = test_app(max);
    let config = test_config(max);
    let slack = (config.storage.chunk_upload_size as u64).max(1024 * 1024) as usize;

    let body = padded_multipart(slack + max as usize + 1024, 16);
    let (status, json) = post_streamed(&app, body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
    assert!(app.storage.is_empty());
}
