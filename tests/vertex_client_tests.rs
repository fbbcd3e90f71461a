//! `VertexClient` against a mock Vertex AI server.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vertex_gateway::config::Config;
use vertex_gateway::server::openai_api::{build_router, AppState};
use vertex_gateway::vertex::auth::TokenSource;
use vertex_gateway::vertex::client::VertexClient;
use vertex_gateway::vertex::types::{Content, GenerateContentRequest, Part};
use vertex_gateway::vertex::{GenerativeBackend, VertexError};

const MODEL_PATH: &str = "/v1/projects/test-proj/locations/us-central1/publishers/google/models";

fn client(server: &MockServer) -> VertexClient {
    VertexClient::new(
        reqwest::Client::new(),
        server.uri(),
        "test-proj".to_string(),
        "us-central1".to_string(),
        TokenSource::Static(SecretString::from("test-token")),
    )
}

fn hello_request() -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::new("user", vec![Part::text("Hello")])],
        ..Default::default()
    }
}

fn reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 1, "candidatesTokenCount": 2, "totalTokenCount": 3}
    })
}

#[tokio::test]
async fn test_generate_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{MODEL_PATH}/gemini-2.5-pro:generateContent")))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Hello"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Hi!")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .generate("gemini-2.5-pro", &hello_request())
        .await
        .unwrap();

    assert_eq!(response.candidates.len(), 1);
    assert_eq!(response.candidates[0].parts()[0].text.as_deref(), Some("Hi!"));
    assert_eq!(response.usage_metadata.unwrap().total_token_count, 3);
}

#[tokio::test]
async fn test_stream_generate_content() {
    let server = MockServer::start().await;

    let sse = format!(
        "data: {}\r\n\r\ndata: {}\r\n\r\n",
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}]}}]}),
        reply("lo")
    );

    Mock::given(method("POST"))
        .and(path(format!("{MODEL_PATH}/gemini-2.5-flash:streamGenerateContent")))
        .and(query_param("alt", "sse"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let stream = client(&server)
        .stream_generate("gemini-2.5-flash", &hello_request())
        .await
        .unwrap();
    let events: Vec<_> = stream.collect().await;

    assert_eq!(events.len(), 2);
    let texts: Vec<String> = events
        .into_iter()
        .map(|e| e.unwrap().candidates[0].parts()[0].text.clone().unwrap())
        .collect();
    assert_eq!(texts, vec!["Hel", "lo"]);
}

#[tokio::test]
async fn test_stream_with_bad_event_yields_error_item() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{MODEL_PATH}/gemini-2.5-flash:streamGenerateContent")))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("data: {not json}\n\n", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let mut stream = client(&server)
        .stream_generate("gemini-2.5-flash", &hello_request())
        .await
        .unwrap();

    let first = stream.next().await.unwrap();
    assert!(matches!(first, Err(VertexError::Decode(_))));
}

#[tokio::test]
async fn test_status_error_keeps_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{MODEL_PATH}/gemini-2.5-pro:generateContent")))
        .respond_with(ResponseTemplate::new(429).set_body_string("Resource exhausted: quota"))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate("gemini-2.5-pro", &hello_request())
        .await
        .unwrap_err();

    match err {
        VertexError::Status { status, body } => {
            assert_eq!(status, 429);
            assert!(body.contains("quota"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_stream_open_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{MODEL_PATH}/gemini-2.5-pro:streamGenerateContent")))
        .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
        .mount(&server)
        .await;

    let result = client(&server)
        .stream_generate("gemini-2.5-pro", &hello_request())
        .await;
    assert!(matches!(result, Err(VertexError::Status { status: 403, .. })));
}

#[tokio::test]
async fn test_embed_predict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{MODEL_PATH}/text-embedding-004:predict")))
        .and(body_partial_json(json!({
            "instances": [{"content": "a"}, {"content": "b"}],
            "parameters": {"outputDimensionality": 3}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [
                {"embeddings": {"values": [0.1, 0.2, 0.3], "statistics": {"token_count": 1, "truncated": false}}},
                {"embeddings": {"values": [0.4, 0.5, 0.6], "statistics": {"token_count": 2, "truncated": false}}}
            ]
        })))
        .mount(&server)
        .await;

    let vectors = client(&server)
        .embed("text-embedding-004", &["a".to_string(), "b".to_string()], Some(3))
        .await
        .unwrap();

    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[1].values, vec![0.4, 0.5, 0.6]);
    assert_eq!(vectors[1].statistics.unwrap().token_count, 2.0);
}

#[tokio::test]
async fn test_embed_prediction_count_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{MODEL_PATH}/text-embedding-004:predict")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
        .mount(&server)
        .await;

    let err = client(&server)
        .embed("text-embedding-004", &["a".to_string()], None)
        .await
        .unwrap_err();
    assert!(matches!(err, VertexError::Unexpected(_)));
}

#[tokio::test]
async fn test_gateway_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{MODEL_PATH}/gemini-2.5-flash:generateContent")))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "Answer in French."}]},
            "generationConfig": {"temperature": 0.2, "maxOutputTokens": 64}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Bonjour")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = Arc::new(client(&server));
    let state = AppState::new(backend, Arc::new(Config::default())).unwrap();
    let app = build_router(Arc::new(state));

    let body = json!({
        "model": "gpt-4o",
        "temperature": 0.2,
        "max_tokens": 64,
        "messages": [
            {"role": "system", "content": "Answer in French."},
            {"role": "user", "content": "Hello"}
        ]
    });
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["choices"][0]["message"]["content"], "Bonjour");
    assert_eq!(body["usage"]["total_tokens"], 3);
}
