use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use careagents::config::LlmConfig;
use careagents::llm::{AnthropicClient, CompletionRequest, LanguageModel, LlmError};
use careagents::models::chat::ChatMessage;

fn client(server: &MockServer) -> AnthropicClient {
    AnthropicClient::new(&LlmConfig {
        base_url: server.uri(),
        api_key: "test-key".into(),
        model: "test-model".into(),
        ..LlmConfig::default()
    })
    .unwrap()
}

fn request() -> CompletionRequest {
    CompletionRequest {
        system: "You are a helpful assistant.".into(),
        messages: vec![ChatMessage::user("What is a normal resting heart rate?")],
        temperature: 0.7,
        max_tokens: 256,
    }
}

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|e| format!("event: {}\ndata: {}\n\n", e["type"].as_str().unwrap(), e))
        .collect()
}

fn delta(text: &str) -> serde_json::Value {
    json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": text}})
}

#[tokio::test]
async fn complete_joins_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(body_partial_json(json!({"model": "test-model", "stream": false, "max_tokens": 256})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Between 60 and "},
                {"type": "text", "text": "100 beats per minute."}
            ],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server).complete(request()).await.unwrap();
    assert_eq!(text, "Between 60 and 100 beats per minute.");
}

#[tokio::test]
async fn complete_reports_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    match client(&server).complete(request()).await {
        Err(LlmError::Api { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid x-api-key");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn complete_rejects_blank_answers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "  "}]
        })))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).complete(request()).await,
        Err(LlmError::EmptyResponse)
    ));
}

#[tokio::test]
async fn stream_yields_deltas_in_order() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"type": "message_start", "message": {"id": "msg_1"}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        delta("Between "),
        json!({"type": "ping"}),
        delta("60 and 100"),
        delta(" bpm."),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "message_stop"}),
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let fragments: Vec<String> = client(&server)
        .stream(request())
        .await
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["Between ", "60 and 100", " bpm."]);
}

#[tokio::test]
async fn stream_without_stop_event_ends_in_error() {
    let server = MockServer::start().await;
    let body = sse(&[delta("Between "), delta("60")]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let items: Vec<Result<String, LlmError>> =
        client(&server).stream(request()).await.unwrap().collect().await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[1].as_deref().ok(), Some("60"));
    assert!(matches!(items[2], Err(LlmError::Malformed(_))));
}

#[tokio::test]
async fn stream_error_event_stops_the_stream() {
    let server = MockServer::start().await;
    let body = sse(&[
        delta("Partial"),
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        delta("never delivered"),
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let items: Vec<Result<String, LlmError>> =
        client(&server).stream(request()).await.unwrap().collect().await;

    assert_eq!(items.len(), 2);
    match &items[1] {
        Err(LlmError::Api { message, .. }) => assert_eq!(message, "Overloaded"),
        other => panic!("expected stream error, got {:?}", other),
    }
}

#[tokio::test]
async fn stream_rejection_is_returned_before_any_fragment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    match client(&server).stream(request()).await {
        Err(LlmError::Api { status, message }) => {
            assert_eq!(status, 529);
            assert_eq!(message, "overloaded");
        }
        Err(other) => panic!("expected API error, got {:?}", other),
        Ok(_) => panic!("expected the request to be rejected"),
    }
}
