//! Router tests driven through `tower::ServiceExt::oneshot`.
//!
//! None of these reach ffmpeg or the network.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{docx_bytes, FailingSynth};
use docx_slideshow::server::routes::PROCESSING_ERROR;
use docx_slideshow::{router, AppState, SlideshowConfig};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "XyZtestBoundary";

fn app(workspace_root: &Path, max_upload_bytes: usize) -> Router {
    let config = SlideshowConfig::builder()
        .synthesizer(Arc::new(FailingSynth))
        .workspace_root(workspace_root)
        .build()
        .unwrap();
    router(AppState::new(config), max_upload_bytes)
}

fn multipart_request(field: &str, filename: &str, payload: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(payload);
    body.extend(format!("\r\n--{BOUNDARY}--\r\n").into_bytes());

    Request::post("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn get_index_serves_upload_form() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), 1 << 20)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<form"));
    assert!(html.contains("name=\"file\""));
    assert!(html.contains("multipart/form-data"));
}

#[tokio::test]
async fn health_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), 1 << 20)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn non_docx_upload_gets_the_form_back() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), 1 << 20)
        .oneshot(multipart_request("file", "notes.txt", b"hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<form"));
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn suffix_check_is_case_sensitive() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), 1 << 20)
        .oneshot(multipart_request("file", "REPORT.DOCX", &docx_bytes(&["x"], &[(2, 2)])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<form"));
}

#[tokio::test]
async fn missing_file_field_gets_the_form_back() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), 1 << 20)
        .oneshot(multipart_request("attachment", "deck.docx", b"ignored"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<form"));
}

#[tokio::test]
async fn synthesis_failure_is_a_generic_500_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let docx = docx_bytes(&["Hello", "world"], &[(8, 8)]);
    let response = app(dir.path(), 1 << 20)
        .oneshot(multipart_request("file", "deck.docx", &docx))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_text(response).await;
    assert_eq!(text, PROCESSING_ERROR);
    assert!(!text.contains("network"));
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn corrupt_docx_is_a_generic_500_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), 1 << 20)
        .oneshot(multipart_request("file", "broken.docx", b"not a zip archive"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, PROCESSING_ERROR);
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn traversal_in_filename_stays_inside_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ws");
    std::fs::create_dir(&root).unwrap();
    let docx = docx_bytes(&["x"], &[(2, 2)]);

    let response = app(&root, 1 << 20)
        .oneshot(multipart_request("file", "../../escape.docx", &docx))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!dir.path().join("escape.docx").exists());
    assert_eq!(entries(&root), 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let payload = vec![b'a'; 16 * 1024];
    let response = app(dir.path(), 1024)
        .oneshot(multipart_request("file", "big.docx", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(entries(dir.path()), 0);
}
