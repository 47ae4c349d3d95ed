//! Gemini adapter tests against a mock server

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use labscribe::application::ports::{CapabilityError, Extractor, ProgressCallback, Transcriber};
use labscribe::domain::job::{Transcript, TranscriptSegment};
use labscribe::domain::media::{MediaFormat, MediaPayload};
use labscribe::infrastructure::{GeminiClient, GeminiExtractor, GeminiTranscriber};

const MODEL: &str = "gemini-2.0-flash";

fn answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
}

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new("test-key").with_base_url(server.uri())
}

fn media() -> MediaPayload {
    MediaPayload::new(vec![1u8, 2, 3, 4], MediaFormat::Wav)
}

fn endpoint() -> String {
    format!("/{}:generateContent", MODEL)
}

#[tokio::test]
async fn transcriber_parses_segments_and_reports_progress() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint()))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "inlineData": { "mimeType": "audio/wav" } }] }]
        })))
        .respond_with(answer(
            r#"{"segments": [
                {"text": "Pipette 50 microlitres into the well", "start": 0, "end": 4.5},
                {"text": "Incubate for five minutes", "start": "00:05", "end": "00:09"}
            ]}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Arc::new(move |f| sink.lock().unwrap().push(f));

    let transcript = GeminiTranscriber::new(client(&server))
        .transcribe(&media(), Some(callback), CancellationToken::new())
        .await
        .unwrap();

    let segments = transcript.segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].end, Some(4.5));
    assert_eq!(segments[1].start, Some(5.0));
    assert_eq!(*seen.lock().unwrap(), vec![1.0]);
}

#[tokio::test]
async fn transcriber_keeps_plain_text_answers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(answer("Add the buffer and mix gently."))
        .mount(&server)
        .await;

    let transcript = GeminiTranscriber::new(client(&server))
        .transcribe(&media(), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(transcript.segments().len(), 1);
    assert_eq!(transcript.segments()[0].text, "Add the buffer and mix gently.");
}

#[tokio::test]
async fn invalid_api_key_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = GeminiTranscriber::new(client(&server))
        .transcribe(&media(), None, CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, CapabilityError::Unavailable("invalid API key".to_string()));
}

#[tokio::test]
async fn rate_limit_and_gateway_timeout_are_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(504))
        .mount(&server)
        .await;

    let transcriber = GeminiTranscriber::new(client(&server));
    let first = transcriber
        .transcribe(&media(), None, CancellationToken::new())
        .await
        .unwrap_err();
    let second = transcriber
        .transcribe(&media(), None, CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(first, CapabilityError::Unavailable("rate limit exceeded".to_string()));
    assert_eq!(second, CapabilityError::Timeout);
}

#[tokio::test]
async fn empty_candidates_are_bad_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = GeminiTranscriber::new(client(&server))
        .transcribe(&media(), None, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CapabilityError::BadOutput(_)));
}

#[tokio::test]
async fn cancellation_aborts_a_slow_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(answer("late").set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        GeminiTranscriber::new(client(&server)).transcribe(&media(), None, token),
    )
    .await
    .expect("cancellation should end the call")
    .unwrap_err();

    assert_eq!(err, CapabilityError::Cancelled);
}

#[tokio::test]
async fn extractor_parses_fenced_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint()))
        .respond_with(answer(
            "```json\n{\"summary\": \"Plasmid miniprep\", \"steps\": [\
             {\"step\": \"Resuspend the pellet in 250 uL P1\", \"start_time\": 0, \"end_time\": 6},\
             {\"step\": \"Add 250 uL P2 and invert\"}]}\n```",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let transcript = Transcript::new(vec![TranscriptSegment::timed(
        "Resuspend the pellet in P1, then add P2",
        0.0,
        10.0,
    )]);
    let extraction = GeminiExtractor::new(client(&server))
        .extract(&transcript, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(extraction.summary.as_deref(), Some("Plasmid miniprep"));
    assert_eq!(extraction.steps.len(), 2);
    assert_eq!(extraction.steps[0].end_time, Some(6.0));
    assert_eq!(extraction.steps[1].start_time, None);
}

#[tokio::test]
async fn extractor_rejects_non_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(answer("I could not find any steps."))
        .mount(&server)
        .await;

    let err = GeminiExtractor::new(client(&server))
        .extract(&Transcript::from_text("hello"), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CapabilityError::BadOutput(_)));
}
