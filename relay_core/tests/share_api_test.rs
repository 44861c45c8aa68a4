use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use percent_encoding::percent_decode_str;
use relay_core::{create_app, AppConfig, AppState};
use std::collections::HashSet;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "relay-test-boundary";

fn setup_with(max_upload_bytes: u64, retention_seconds: u64) -> (Router, AppState, TempDir) {
    let temp_dir = TempDir::new().unwrap();

    let mut config = AppConfig::default();
    config.storage.upload_dir = temp_dir.path().to_path_buf();
    config.storage.max_upload_bytes = max_upload_bytes;
    config.sweep.retention_seconds = retention_seconds;

    let state = AppState::from_config(&config);
    let app = create_app(state.clone(), &config);
    (app, state, temp_dir)
}

fn setup() -> (Router, AppState, TempDir) {
    setup_with(1024 * 1024, 3600)
}

fn file_part(field: &str, filename: &str, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut part = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
        BOUNDARY, field, filename
    );
    if let Some(content_type) = content_type {
        part.push_str(&format!("Content-Type: {}\r\n", content_type));
    }
    part.push_str("\r\n");

    let mut bytes = part.into_bytes();
    bytes.extend_from_slice(data);
    bytes.extend_from_slice(b"\r\n");
    bytes
}

fn text_part(field: &str, value: &str) -> Vec<u8> {
    format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
        BOUNDARY, field, value
    )
    .into_bytes()
}

fn multipart_request(parts: Vec<Vec<u8>>) -> Request<Body> {
    let mut body: Vec<u8> = parts.concat();
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/files/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn upload(app: &Router, filename: &str, data: &[u8]) -> String {
    let request = multipart_request(vec![file_part("file", filename, Some("text/plain"), data)]);
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    body["code"].as_str().unwrap().to_string()
}

fn stored_files(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_share_round_trip_with_unicode_name() {
    let (app, _state, _temp_dir) = setup();

    let request = multipart_request(vec![file_part(
        "file",
        "données.txt",
        Some("text/plain"),
        b"0123456789",
    )]);
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let code = body["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
    assert!(body["message"].is_string());
    assert_eq!(body["size"], 10);

    let response = send(&app, get(&format!("/api/files/check/{}", code))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["filename"], "données.txt");
    assert_eq!(body["size"], 10);
    assert!(body["expires_at"].is_string());

    let response = send(&app, get(&format!("/api/files/download/{}", code))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");

    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment;"));
    let encoded = disposition.split("filename*=UTF-8''").nth(1).unwrap();
    assert_eq!(percent_decode_str(encoded).decode_utf8().unwrap(), "données.txt");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"0123456789");

    let response = send(&app, get(&format!("/api/files/download/{}", code))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(json_body(response).await["message"].is_string());

    let response = send(&app, get(&format!("/api/files/check/{}", code))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_completed_download_removes_file() {
    let (app, _state, temp_dir) = setup();
    let code = upload(&app, "notes.txt", b"some notes").await;
    assert_eq!(stored_files(&temp_dir).len(), 1);

    let response = send(&app, get(&format!("/api/files/download/{}", code))).await;
    to_bytes(response.into_body(), usize::MAX).await.unwrap();

    for _ in 0..50 {
        if stored_files(&temp_dir).is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("downloaded file was not deleted");
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let (app, _state, temp_dir) = setup();

    let response = send(&app, multipart_request(vec![text_part("note", "hello")])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["message"], "No file found in request");
    assert!(stored_files(&temp_dir).is_empty());
}

#[tokio::test]
async fn test_upload_skips_other_fields() {
    let (app, state, _temp_dir) = setup();

    let request = multipart_request(vec![
        text_part("note", "for you"),
        file_part("file", "photo.png", None, b"not really a png"),
    ]);
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let code = json_body(response).await["code"].as_str().unwrap().to_string();
    let entry = state.transfers.check(&code).unwrap();
    assert_eq!(entry.original_name, "photo.png");
    assert_eq!(entry.content_type, "image/png");
}

#[tokio::test]
async fn test_upload_requires_multipart() {
    let (app, _state, _temp_dir) = setup();

    let request = Request::builder()
        .method("POST")
        .uri("/api/files/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["message"].is_string());
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let (app, state, temp_dir) = setup_with(16, 3600);

    let request = multipart_request(vec![file_part("file", "big.bin", None, &[1u8; 64])]);
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    assert!(state.transfers.registry().is_empty());
    assert!(stored_files(&temp_dir).is_empty());
}

#[tokio::test]
async fn test_unknown_code_is_not_found_without_side_effects() {
    let (app, _state, temp_dir) = setup();
    let code = upload(&app, "keep.txt", b"keep me").await;
    let before = stored_files(&temp_dir);

    let unknown = if code == "000000" { "000001" } else { "000000" };
    for uri in [
        format!("/api/files/download/{}", unknown),
        format!("/api/files/check/{}", unknown),
        "/api/files/download/..%2F..%2Fetc".to_string(),
    ] {
        let response = send(&app, get(&uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }

    assert_eq!(stored_files(&temp_dir), before);
    let response = send(&app, get(&format!("/api/files/check/{}", code))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_second_download_while_streaming_conflicts() {
    let (app, _state, _temp_dir) = setup();
    let code = upload(&app, "busy.txt", b"busy").await;

    let first = send(&app, get(&format!("/api/files/download/{}", code))).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = send(&app, get(&format!("/api/files/download/{}", code))).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    drop(first);
    let retry = send(&app, get(&format!("/api/files/download/{}", code))).await;
    assert_eq!(retry.status(), StatusCode::OK);
    let bytes = to_bytes(retry.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"busy");
}

#[tokio::test]
async fn test_concurrent_uploads_get_distinct_codes() {
    let (app, state, _temp_dir) = setup();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move { upload(&app, &format!("file-{}.txt", i), b"payload").await })
        })
        .collect();

    let mut codes = HashSet::new();
    for task in tasks {
        assert!(codes.insert(task.await.unwrap()));
    }
    assert_eq!(codes.len(), 20);
    assert_eq!(state.transfers.registry().len(), 20);
}

#[tokio::test]
async fn test_sweep_expires_unclaimed_share() {
    let (app, state, temp_dir) = setup_with(1024, 0);
    let code = upload(&app, "stale.txt", b"stale").await;

    let report = state.transfers.sweep_expired().await.unwrap();
    assert_eq!(report.expired_entries, 1);
    assert_eq!(report.files_removed, 1);

    let response = send(&app, get(&format!("/api/files/check/{}", code))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(stored_files(&temp_dir).is_empty());
}

#[tokio::test]
async fn test_health_reports_active_shares() {
    let (app, _state, _temp_dir) = setup();
    upload(&app, "a.txt", b"a").await;
    upload(&app, "b.txt", b"b").await;

    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_shares"], 2);
}

#[tokio::test]
async fn test_cors_exposes_download_headers() {
    let (app, _state, _temp_dir) = setup();

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(exposed.contains("content-disposition"));
}
