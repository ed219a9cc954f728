use std::time::Duration;

use ae_core::error::PREVIEW_CHARS;
use ae_core::{Error, ProviderClient};
use ae_inference::models::{DeepSeekModel, GeminiModel};
use ae_inference::{call_with_fallback, InferenceConfig, ProviderKind};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANSWER: &str = r#"{"enhancedContent": "Better", "analytics": {"keywords": []}}"#;

fn gemini(server: &MockServer) -> GeminiModel {
    let config = InferenceConfig::new(ProviderKind::Gemini)
        .with_api_key("test-key")
        .with_api_base_url(server.uri())
        .with_provider_timeout(Duration::from_secs(5));
    GeminiModel::new(&config).expect("client creation")
}

fn deepseek(server: &MockServer) -> DeepSeekModel {
    let config = InferenceConfig::new(ProviderKind::DeepSeek)
        .with_api_key("test-key")
        .with_api_base_url(server.uri())
        .with_provider_timeout(Duration::from_secs(5));
    DeepSeekModel::new(&config).expect("client creation")
}

fn gemini_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [
            {
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }
        ]
    })
}

fn chat_response(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ]
    })
}

#[tokio::test]
async fn test_gemini_returns_candidate_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(serde_json::json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_response(ANSWER)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let text = gemini(&mock_server).call("gemini-test", "prompt").await.unwrap();
    assert_eq!(text, ANSWER);
}

#[tokio::test]
async fn test_gemini_api_error_message_is_used() {
    let mock_server = MockServer::start().await;

    let error_resp = serde_json::json!({
        "error": { "code": 429, "message": "Quota exceeded for model", "status": "RESOURCE_EXHAUSTED" }
    });
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(&error_resp))
        .mount(&mock_server)
        .await;

    let err = gemini(&mock_server).call("gemini-test", "prompt").await.unwrap_err();
    assert_eq!(err.model, "gemini-test");
    assert_eq!(err.message, "HTTP 429: Quota exceeded for model");
}

#[tokio::test]
async fn test_gemini_empty_candidates_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })))
        .mount(&mock_server)
        .await;

    let err = gemini(&mock_server).call("gemini-test", "prompt").await.unwrap_err();
    assert_eq!(err.message, "empty response");
}

#[tokio::test]
async fn test_gemini_slow_answer_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_response(ANSWER))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let config = InferenceConfig::new(ProviderKind::Gemini)
        .with_api_key("test-key")
        .with_api_base_url(mock_server.uri())
        .with_provider_timeout(Duration::from_millis(200));
    let client = GeminiModel::new(&config).expect("client creation");

    let err = client.call("gemini-test", "prompt").await.unwrap_err();
    assert_eq!(err.message, "request timed out");
}

#[tokio::test]
async fn test_deepseek_returns_first_choice() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "deepseek-chat",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(ANSWER)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let text = deepseek(&mock_server).call("deepseek-chat", "prompt").await.unwrap();
    assert_eq!(text, ANSWER);
}

#[tokio::test]
async fn test_deepseek_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({ "model": "deepseek-chat" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({ "model": "deepseek-reasoner" })))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&mock_server)
        .await;

    let client = deepseek(&mock_server);
    let err = client.call("deepseek-chat", "prompt").await.unwrap_err();
    assert_eq!(err.message, "empty response");

    let err = client.call("deepseek-reasoner", "prompt").await.unwrap_err();
    assert_eq!(err.message, "HTTP 500: internal error");
}

#[tokio::test]
async fn test_fallback_over_http_moves_to_next_model() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/m1:generateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/m2:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_response(ANSWER)))
        .mount(&mock_server)
        .await;

    let models = vec!["m1".to_string(), "m2".to_string()];
    let success = call_with_fallback(
        &gemini(&mock_server),
        "prompt",
        &models,
        Duration::from_secs(5),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(success.model, "m2");
    assert_eq!(success.text, ANSWER);
}

#[tokio::test]
async fn test_large_error_page_is_bounded_in_final_error() {
    let mock_server = MockServer::start().await;

    let page = format!("<html><body>{}</body></html>", "<p>Bad gateway</p>".repeat(1200));
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string(page.clone()))
        .mount(&mock_server)
        .await;

    let models = vec!["gemini-test".to_string()];
    let err = call_with_fallback(
        &gemini(&mock_server),
        "prompt",
        &models,
        Duration::from_secs(5),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match &err {
        Error::AllModelsFailed { attempts, last } => {
            assert_eq!(*attempts, 1);
            assert!(last.message.starts_with("HTTP 502: <html>"));
            assert!(last.message.chars().count() <= "HTTP 502: ".len() + PREVIEW_CHARS);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().len() < page.len() / 10);
}
