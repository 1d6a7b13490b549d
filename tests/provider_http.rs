//! Integration tests for the remote HTTP adapter in `src/provider.rs`
//!
//! Covers every wire format against mocked endpoints:
//! - flat single and batch calls, label mapping and confidence clamping
//! - label-score lists, nested and flat, top label selection
//! - chat completions with a JSON emotion object in the message content
//! - non-2xx, malformed bodies and timeouts mapped onto the error taxonomy
//! - bearer credentials

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tokio_emotion_orchestrator::{
    ClassifierError, Emotion, EmotionProvider, ProviderRole, RemoteProvider, WireFormat,
};

// ============================================================================
// Helpers
// ============================================================================

fn flat(server: &MockServer) -> RemoteProvider {
    RemoteProvider::new(
        "primary",
        format!("{}/api/detect-emotion", server.uri()),
        ProviderRole::Primary,
    )
    .with_batch_url(format!("{}/api/batch-detect-emotion", server.uri()))
    .with_timeout(Duration::from_secs(2))
}

fn label_scores(server: &MockServer) -> RemoteProvider {
    RemoteProvider::new(
        "hosted",
        format!("{}/models/emotion", server.uri()),
        ProviderRole::Secondary,
    )
    .with_format(WireFormat::LabelScores)
    .with_timeout(Duration::from_secs(2))
}

fn chat(server: &MockServer) -> RemoteProvider {
    RemoteProvider::new(
        "openrouter",
        format!("{}/api/v1/chat/completions", server.uri()),
        ProviderRole::Secondary,
    )
    .with_format(WireFormat::ChatCompletion)
    .with_model("test/emotion-model")
    .with_timeout(Duration::from_secs(2))
}

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "id": "gen-1",
        "model": "test/emotion-model",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

// ============================================================================
// Flat format
// ============================================================================

#[tokio::test]
async fn test_flat_classify_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/detect-emotion"))
        .and(body_json(json!({"text": "I am so happy today!"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"emotion": "joy", "confidence": 0.82, "model_used": "distilroberta"}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let result = flat(&server)
        .classify("I am so happy today!")
        .await
        .expect("mocked 200 must succeed");
    assert_eq!(result.emotion(), Emotion::Joy);
    assert_eq!(result.confidence(), 0.82);
    assert_eq!(result.intensity(), 8);
    assert_eq!(result.provider_used(), "primary");
}

#[tokio::test]
async fn test_flat_classify_maps_foreign_label_and_clamps() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/detect-emotion"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"emotion": "Nervousness", "confidence": 1.7})),
        )
        .mount(&server)
        .await;

    let result = flat(&server).classify("hmm").await.expect("must succeed");
    assert_eq!(result.emotion(), Emotion::Fear);
    assert_eq!(result.confidence(), 1.0);
    assert_eq!(result.intensity(), 10);
}

#[tokio::test]
async fn test_flat_classify_http_500_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/detect-emotion"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;

    let err = flat(&server).classify("x").await.unwrap_err();
    match err {
        ClassifierError::ProviderError { provider, message } => {
            assert_eq!(provider, "primary");
            assert!(message.contains("500"), "message: {message}");
            assert!(message.contains("model crashed"), "message: {message}");
        }
        other => panic!("expected ProviderError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_flat_classify_malformed_body_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/detect-emotion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"label": "joy"})))
        .mount(&server)
        .await;

    let err = flat(&server).classify("x").await.unwrap_err();
    assert!(matches!(err, ClassifierError::ProviderError { .. }), "{err:?}");
}

#[tokio::test]
async fn test_flat_classify_timeout_is_provider_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/detect-emotion"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"emotion": "joy", "confidence": 0.9}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let provider = flat(&server).with_timeout(Duration::from_millis(50));
    let err = provider.classify("slow").await.unwrap_err();
    assert_eq!(
        err,
        ClassifierError::ProviderTimeout {
            provider: "primary".into(),
            timeout_ms: 50,
        }
    );
}

#[tokio::test]
async fn test_flat_batch_success_preserves_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/batch-detect-emotion"))
        .and(body_json(json!({"texts": ["good day", "awful day"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"emotion": "joy", "confidence": 0.9, "model_used": "m"},
                {"emotion": "sadness", "confidence": 0.7, "model_used": "m"}
            ],
            "total_time": 0.12
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = flat(&server);
    assert!(provider.supports_batch());
    let results = provider
        .classify_batch(&["good day".to_string(), "awful day".to_string()])
        .await
        .expect("batch must succeed");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].emotion(), Emotion::Joy);
    assert_eq!(results[1].emotion(), Emotion::Sadness);
}

#[tokio::test]
async fn test_flat_batch_count_mismatch_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/batch-detect-emotion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"emotion": "joy", "confidence": 0.9}],
            "total_time": 0.1
        })))
        .mount(&server)
        .await;

    let err = flat(&server)
        .classify_batch(&["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ClassifierError::ProviderError { .. }));
}

#[tokio::test]
async fn test_flat_without_batch_url_reports_unsupported() {
    let provider = RemoteProvider::new("primary", "http://127.0.0.1:9/x", ProviderRole::Primary);
    assert!(!provider.supports_batch());
    let err = provider.classify_batch(&["a".to_string()]).await.unwrap_err();
    assert!(matches!(err, ClassifierError::ProviderError { .. }));
}

#[tokio::test]
async fn test_connection_refused_is_provider_error() {
    // Port 9 (discard) is not listening in test environments.
    let provider = RemoteProvider::new("primary", "http://127.0.0.1:9/x", ProviderRole::Primary)
        .with_timeout(Duration::from_secs(2));
    let err = provider.classify("x").await.unwrap_err();
    assert!(err.is_backend_failure(), "{err:?}");
}

// ============================================================================
// Label-score format
// ============================================================================

#[tokio::test]
async fn test_label_scores_nested_picks_top_label() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/emotion"))
        .and(body_json(json!({"inputs": "what a surprise"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[
            {"label": "joy", "score": 0.2},
            {"label": "surprise", "score": 0.75},
            {"label": "fear", "score": 0.05}
        ]])))
        .mount(&server)
        .await;

    let result = label_scores(&server)
        .classify("what a surprise")
        .await
        .expect("must succeed");
    assert_eq!(result.emotion(), Emotion::Surprise);
    assert_eq!(result.confidence(), 0.75);
    assert_eq!(result.provider_used(), "hosted");
}

#[tokio::test]
async fn test_label_scores_flat_list_and_numbered_labels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/emotion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"label": "LABEL_3", "score": 0.66},
            {"label": "LABEL_1", "score": 0.34}
        ])))
        .mount(&server)
        .await;

    let result = label_scores(&server).classify("grr").await.expect("must succeed");
    assert_eq!(result.emotion(), Emotion::Anger);
}

#[tokio::test]
async fn test_label_scores_empty_list_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/emotion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[]])))
        .mount(&server)
        .await;

    let err = label_scores(&server).classify("x").await.unwrap_err();
    assert!(matches!(err, ClassifierError::ProviderError { .. }));
}

#[tokio::test]
async fn test_label_scores_batch_uses_main_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/emotion"))
        .and(body_json(json!({"inputs": ["one", "two"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [{"label": "love", "score": 0.8}, {"label": "joy", "score": 0.2}],
            [{"label": "sadness", "score": 0.6}, {"label": "joy", "score": 0.4}]
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = label_scores(&server);
    assert!(provider.supports_batch());
    let results = provider
        .classify_batch(&["one".to_string(), "two".to_string()])
        .await
        .expect("batch must succeed");
    assert_eq!(results[0].emotion(), Emotion::Love);
    assert_eq!(results[1].emotion(), Emotion::Sadness);
}

#[tokio::test]
async fn test_label_scores_http_503_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/emotion"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"error": "Model is loading"})),
        )
        .mount(&server)
        .await;

    let err = label_scores(&server).classify("x").await.unwrap_err();
    assert!(err.is_backend_failure());
}

// ============================================================================
// Chat completion format
// ============================================================================

#[tokio::test]
async fn test_chat_completion_requests_json_object_and_maps_label() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("Authorization", "Bearer or-test-key"))
        .and(body_partial_json(json!({
            "model": "test/emotion-model",
            "response_format": {"type": "json_object"},
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_reply(r#"{"emotion": "Scared", "confidence": 0.74}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = chat(&server)
        .with_api_key("or-test-key")
        .classify("there is someone outside my window")
        .await
        .expect("chat call must succeed");
    assert_eq!(result.emotion(), Emotion::Fear);
    assert_eq!(result.confidence(), 0.74);
    assert_eq!(result.provider_used(), "openrouter");
}

#[tokio::test]
async fn test_chat_completion_sends_system_and_user_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system"},
                {"role": "user", "content": "I miss her so much"},
            ],
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_reply("```json\n{\"emotion\": \"sad\", \"confidence\": 0.8}\n```")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = chat(&server)
        .classify("I miss her so much")
        .await
        .expect("chat call must succeed");
    assert_eq!(result.emotion(), Emotion::Sadness);
}

#[tokio::test]
async fn test_chat_completion_empty_choices_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = chat(&server).classify("x").await.unwrap_err();
    assert!(matches!(err, ClassifierError::ProviderError { .. }), "{err:?}");
}

#[tokio::test]
async fn test_chat_completion_prose_content_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_reply("The user seems happy.")),
        )
        .mount(&server)
        .await;

    let err = chat(&server).classify("x").await.unwrap_err();
    match err {
        ClassifierError::ProviderError { provider, message } => {
            assert_eq!(provider, "openrouter");
            assert!(message.contains("not an emotion object"), "message: {message}");
        }
        other => panic!("expected ProviderError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_completion_has_no_batch_call() {
    let server = MockServer::start().await;
    let provider = chat(&server);
    assert!(!provider.supports_batch());
    let err = provider
        .classify_batch(&["a".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ClassifierError::ProviderError { .. }), "{err:?}");
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

// ============================================================================
// Credentials
// ============================================================================

#[tokio::test]
async fn test_api_key_sent_as_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/emotion"))
        .and(header("Authorization", "Bearer hf-test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([[{"label": "joy", "score": 0.9}]])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = label_scores(&server)
        .with_api_key("hf-test-token")
        .classify("yay")
        .await
        .expect("authorized call must succeed");
    assert_eq!(result.emotion(), Emotion::Joy);
}

#[tokio::test]
async fn test_sequential_requests_reuse_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/detect-emotion"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"emotion": "love", "confidence": 0.7})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let provider = flat(&server);
    for text in ["a", "b", "c"] {
        let result = provider.classify(text).await.expect("must succeed");
        assert_eq!(result.emotion(), Emotion::Love);
    }
}
