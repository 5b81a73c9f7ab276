//! HTTP contract tests for the Gemini client
//!
//! Each test mounts the expected request shape on a mock server; a request
//! that does not match gets a 404 and fails the call.

use chatter::llm::client::ChatRequest;
use chatter::llm::{GeminiClient, GenerationService, ModelTier, ServiceConfig};
use chatter::messages::InlineData;
use chatter::ChatterError;
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str = "/v1beta/models/gemini-flash-lite-latest:streamGenerateContent";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(ServiceConfig::new("test-key").with_base_url(server.uri())).unwrap()
}

fn chat_request(search: bool, image: Option<InlineData>) -> ChatRequest {
    ChatRequest {
        text: "Who won?".into(),
        image,
        system_instruction: "You are helpful.".into(),
        model_tier: ModelTier::Lite,
        search_enabled: search,
    }
}

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {}\r\n\r\n", event))
        .collect()
}

#[tokio::test]
async fn test_stream_chat_over_sse() {
    let server = MockServer::start().await;

    let body = sse(&[
        json!({"candidates": [{"content": {"parts": [{"text": "The "}]}}]}),
        json!({"candidates": [{
            "content": {"parts": [{"text": "home team."}]},
            "groundingMetadata": {"groundingChunks": [
                {"web": {"uri": "https://news.example", "title": "News"}}
            ]}
        }]}),
    ]);

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Who won?"}]}],
            "systemInstruction": {"parts": [{"text": "You are helpful."}]},
            "tools": [{"googleSearch": {}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let chunks: Vec<_> = client(&server)
        .stream_chat(&chat_request(true, None))
        .await
        .unwrap()
        .collect()
        .await;

    let texts: Vec<String> = chunks
        .iter()
        .filter_map(|c| c.as_ref().unwrap().text.clone())
        .collect();
    assert_eq!(texts, vec!["The ", "home team."]);

    let sources: Vec<_> = chunks
        .iter()
        .flat_map(|c| c.as_ref().unwrap().grounding.clone())
        .filter_map(|g| g.to_source())
        .collect();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].title, "News");
    assert_eq!(sources[0].uri, "https://news.example");
}

#[tokio::test]
async fn test_chat_request_sends_image_first_and_safety_settings() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(json!({
            "contents": [{"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}},
                {"text": "Who won?"}
            ]}],
            "safetySettings": [
                {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE"},
                {"category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_MEDIUM_AND_ABOVE"},
                {"category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_MEDIUM_AND_ABOVE"},
                {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[json!({"candidates": [{"content": {"parts": [{"text": "A chart."}]}}]})]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let image = InlineData {
        mime_type: "image/png".into(),
        data: "iVBORw0KGgo=".into(),
    };
    let chunks: Vec<_> = client(&server)
        .stream_chat(&chat_request(false, Some(image)))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].as_ref().unwrap().text.as_deref(), Some("A chart."));

    // no search tool unless enabled
    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(sent.get("tools").is_none());
}

#[tokio::test]
async fn test_error_status_is_upstream_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .stream_chat(&chat_request(false, None))
        .await;

    match result {
        Err(ChatterError::UpstreamError(detail)) => assert!(detail.contains("429")),
        Err(e) => panic!("Expected UpstreamError, got {}", e),
        Ok(_) => panic!("Expected UpstreamError, got a stream"),
    }
}

#[tokio::test]
async fn test_generate_image_reads_inline_data() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{"parts": [{"text": "draw a fox"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [
                {"text": "Here"},
                {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
            ]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server).generate_image("draw a fox").await.unwrap();

    let image = reply.image.unwrap();
    assert_eq!(image.as_str(), "data:image/png;base64,iVBORw0KGgo=");
}

#[tokio::test]
async fn test_synthesize_speech_returns_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash-preview-tts:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{"parts": [{"text": "Hello"}]}],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Kore"}}
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "audio/L16;rate=24000", "data": "AAAA"}}
            ]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = client(&server).synthesize_speech("Hello").await.unwrap();
    assert_eq!(payload.as_deref(), Some("AAAA"));
}

#[tokio::test]
async fn test_speech_without_audio_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash-preview-tts:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client(&server).synthesize_speech("Hello").await.unwrap(), None);
}
