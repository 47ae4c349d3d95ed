//! HTTP API tests through the router, without a listening socket

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use labscribe::api::{self, AppState};
use labscribe::application::jobs::{Capabilities, EngineSettings, JobManager};
use labscribe::application::ports::CapabilityError;
use labscribe::domain::job::CONFIDENTIALITY_NOTICE;
use labscribe::domain::units::ByteSize;
use labscribe::infrastructure::{
    InMemoryBlobStore, InMemoryJournal, ScriptedExtractor, ScriptedTranscriber,
};

fn app_with(settings: EngineSettings, transcriber: ScriptedTranscriber, extractor: ScriptedExtractor) -> Router {
    let manager = JobManager::new(
        settings,
        Capabilities {
            blobs: Arc::new(InMemoryBlobStore::new()),
            transcriber: Arc::new(transcriber),
            extractor: Arc::new(extractor),
            journal: Arc::new(InMemoryJournal::new()),
        },
    );
    api::router(AppState::new(manager))
}

fn app() -> Router {
    app_with(
        EngineSettings::default(),
        ScriptedTranscriber::default(),
        ScriptedExtractor::default(),
    )
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn text_body(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).to_string()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn upload(uri: &str, content_type: &str, data: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(data))
        .unwrap()
}

async fn submit(app: &Router) -> String {
    let response = send(app, upload("/jobs?kind=audio", "audio/mpeg", vec![3u8; 4096])).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    json_body(response).await["jobId"].as_str().unwrap().to_string()
}

/// Drain the event stream, which ends after the terminal snapshot
async fn events(app: &Router, job_id: &str) -> String {
    let response = send(app, get(&format!("/jobs/{}/events", job_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::timeout(StdDuration::from_secs(5), text_body(response))
        .await
        .expect("event stream did not end")
}

#[tokio::test]
async fn health_reports_ok() {
    let response = send(&app(), get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn submitted_job_streams_progress_and_returns_procedure() {
    let app = app();
    let job_id = submit(&app).await;

    let stream = events(&app, &job_id).await;
    assert!(stream.contains("event: progress"));
    assert!(stream.contains("\"state\":\"completed\""));
    assert!(stream.contains("\"percent\":100"));

    let status = json_body(send(&app, get(&format!("/jobs/{}/status", job_id))).await).await;
    assert_eq!(status["state"], "completed");
    assert_eq!(status["percent"], 100);
    assert_eq!(status["attempt"], 1);
    assert!(status.get("error").is_none());

    let response = send(&app, get(&format!("/jobs/{}/result", job_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let result = json_body(response).await;
    assert_eq!(result["jobId"], job_id.as_str());
    assert_eq!(result["steps"].as_array().unwrap().len(), 3);
    assert_eq!(result["timings"].as_array().unwrap().len(), 3);
    assert_eq!(result["timings"][1]["start"], 4.0);
    assert_eq!(result["metadata"]["confidentiality"], CONFIDENTIALITY_NOTICE);
    assert!(result["metadata"]["generatedAt"].is_string());
}

#[tokio::test]
async fn kind_is_inferred_from_content_type() {
    let app = app();
    let response = send(&app, upload("/jobs", "video/mp4", vec![1u8; 64])).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn missing_kind_is_bad_request() {
    let response = send(&app(), upload("/jobs", "application/octet-stream", vec![1u8; 64])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Invalid input");
    assert!(json["details"].as_str().unwrap().contains("kind"));
}

#[tokio::test]
async fn empty_upload_is_bad_request() {
    let response = send(&app(), upload("/jobs?kind=audio", "audio/wav", Vec::new())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let settings = EngineSettings {
        max_upload: ByteSize::from_bytes(1024),
        ..Default::default()
    };
    let app = app_with(settings, ScriptedTranscriber::default(), ScriptedExtractor::default());

    let response = send(&app, upload("/jobs?kind=audio", "audio/wav", vec![0u8; 4096])).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let app = app();
    let unknown = format!("/jobs/{}/status", uuid::Uuid::new_v4());
    assert_eq!(send(&app, get(&unknown)).await.status(), StatusCode::NOT_FOUND);

    let response = send(&app, get("/jobs/not-a-job/result")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "Job not found");
}

#[tokio::test]
async fn result_of_running_job_is_conflict() {
    let app = app_with(
        EngineSettings::default(),
        ScriptedTranscriber::default().with_delay(StdDuration::from_millis(300)),
        ScriptedExtractor::default(),
    );
    let job_id = submit(&app).await;

    let response = send(&app, get(&format!("/jobs/{}/result", job_id))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "Result not ready");
}

#[tokio::test]
async fn delete_cancels_running_job_once() {
    let app = app_with(
        EngineSettings::default(),
        ScriptedTranscriber::default(),
        ScriptedExtractor::hanging(),
    );
    let job_id = submit(&app).await;
    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri(format!("/jobs/{}", job_id))
            .body(Body::empty())
            .unwrap()
    };

    let first = send(&app, delete()).await;
    assert_eq!(first.status(), StatusCode::NO_CONTENT);

    let status = json_body(send(&app, get(&format!("/jobs/{}/status", job_id))).await).await;
    assert_eq!(status["state"], "cancelled");

    let second = send(&app, delete()).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn failed_job_can_be_retried() {
    let app = app_with(
        EngineSettings::default(),
        ScriptedTranscriber::failing(CapabilityError::Unavailable("offline".to_string())),
        ScriptedExtractor::default(),
    );
    let job_id = submit(&app).await;
    events(&app, &job_id).await;

    let status = json_body(send(&app, get(&format!("/jobs/{}/status", job_id))).await).await;
    assert_eq!(status["state"], "failed");
    assert_eq!(status["error"]["kind"], "capability_error");
    assert_eq!(status["error"]["stage"], "transcribing");

    let response = send(
        &app,
        upload(&format!("/jobs/{}/retry?kind=audio", job_id), "audio/mpeg", vec![5u8; 128]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let retry_id = json_body(response).await["jobId"].as_str().unwrap().to_string();

    let retry = json_body(send(&app, get(&format!("/jobs/{}/status", retry_id))).await).await;
    assert_eq!(retry["attempt"], 2);
    assert_eq!(retry["retryOf"], job_id.as_str());
}

#[tokio::test]
async fn client_id_header_is_echoed_in_status() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/jobs?kind=audio")
        .header("x-client-id", "bench-7")
        .body(Body::from(vec![1u8; 32]))
        .unwrap();
    let response = send(&app, request).await;
    let job_id = json_body(response).await["jobId"].as_str().unwrap().to_string();

    let status = json_body(send(&app, get(&format!("/jobs/{}/status", job_id))).await).await;
    assert_eq!(status["clientRef"], "bench-7");
}
