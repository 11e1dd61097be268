use std::time::Duration;

use qibot_core::{BackendErrorKind, GenerativeBackend};
use qibot_providers::{GeminiBackend, GeminiSettings};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer, timeout: Duration) -> GeminiBackend {
    GeminiBackend::new(GeminiSettings {
        api_key: "test-api-key".to_string(),
        base_url: server.uri(),
        model: "gemini-1.5-flash".to_string(),
        max_output_tokens: None,
        timeout,
    })
    .unwrap()
}

#[tokio::test]
async fn test_generate_returns_candidate_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-api-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Sem internet" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Reinicie o modem." }] },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let text = backend(&mock_server, Duration::from_secs(5))
        .generate("Sem internet")
        .await
        .unwrap();
    assert_eq!(text, "Reinicie o modem.");
}

#[tokio::test]
async fn test_http_error_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "Resource has been exhausted" }
        })))
        .mount(&mock_server)
        .await;

    let err = backend(&mock_server, Duration::from_secs(5))
        .generate("x")
        .await
        .unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::HttpStatus);
    assert!(err.message.contains("Resource has been exhausted"));
}

#[tokio::test]
async fn test_empty_candidates_are_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&mock_server)
        .await;

    let err = backend(&mock_server, Duration::from_secs(5))
        .generate("x")
        .await
        .unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::EmptyResponse);
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({ "candidates": [] })),
        )
        .mount(&mock_server)
        .await;

    let err = backend(&mock_server, Duration::from_millis(200))
        .generate("x")
        .await
        .unwrap_err();
    assert_eq!(err.kind, BackendErrorKind::Timeout);
}
