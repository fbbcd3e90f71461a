//! OpenAI-compatible HTTP API.
//!
//! - POST /v1/chat/completions
//! - POST /v1/embeddings
//! - GET /v1/models
//! - GET /health
//! - GET /metrics

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::SecretString;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::models::ModelCatalog;
use crate::openai::{
    ChatCompletionRequest, Embedding, EmbeddingInput, EmbeddingRequest, EmbeddingResponse,
    EmbeddingUsage, EmbeddingVector, ModelList,
};
use crate::server::auth::require_api_key;
use crate::server::error::ApiError;
use crate::server::metrics::Metrics;
use crate::server::streaming::chat_completion_stream;
use crate::translate::request::build_generate_request;
use crate::translate::response::to_chat_completion;
use crate::translate::stream::{ChunkTranslator, SentenceBuffer};
use crate::translate::{completion_id, unix_now};
use crate::vertex::types::EmbeddingValues;
use crate::vertex::GenerativeBackend;

/// Application state shared across handlers.
pub struct AppState {
    pub backend: Arc<dyn GenerativeBackend>,
    pub config: Arc<Config>,
    pub catalog: ModelCatalog,
    pub api_key: Option<SecretString>,
    pub metrics: Metrics,
    pub start_time: Instant,
    /// Creation timestamp reported for every listed model.
    pub created: u64,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        config: Arc<Config>,
    ) -> prometheus::Result<Self> {
        Ok(Self {
            backend,
            catalog: ModelCatalog::new(&config.models),
            api_key: config
                .server
                .api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .map(|k| SecretString::from(k.to_string())),
            metrics: Metrics::new()?,
            start_time: Instant::now(),
            created: unix_now(),
            config,
        })
    }

    fn sentence_buffer(&self) -> SentenceBuffer {
        let streaming = &self.config.streaming;
        if streaming.sentence_buffering {
            SentenceBuffer::new(streaming.max_buffer_chars)
        } else {
            SentenceBuffer::passthrough()
        }
    }

    /// Count and log failures that came from Vertex AI.
    fn upstream_failure(&self, endpoint: &str, request_id: &str, err: impl Into<ApiError>) -> ApiError {
        let err = err.into();
        if err.is_upstream() {
            self.metrics.record_upstream_error(endpoint);
            error!(request_id = %request_id, endpoint, error = %err, "Upstream request failed");
        }
        err
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/models", get(list_models))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(api)
        .layer(TraceLayer::new_for_http());

    if state.config.server.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

// ─── Response Types ────────────────────────────────────────────────────────

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub project: String,
    pub location: String,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    state.metrics.record_request("chat_completions");
    let Json(req) = payload?;
    let request_id = Uuid::new_v4().to_string();
    let vertex_model = state.catalog.resolve_chat(&req.model);

    info!(
        request_id = %request_id,
        model = %req.model,
        vertex_model = %vertex_model,
        messages = req.messages.len(),
        stream = req.stream,
        "Chat completion request"
    );

    if req.messages.is_empty() {
        return Err(ApiError::BadRequest("'messages' must not be empty".to_string()));
    }

    let body = build_generate_request(&req, &state.config.generation)?;

    if req.stream {
        let upstream = state
            .backend
            .stream_generate(&vertex_model, &body)
            .await
            .map_err(|e| state.upstream_failure("chat_completions", &request_id, e))?;

        let translator = ChunkTranslator::new(
            req.model.clone(),
            state.sentence_buffer(),
            req.include_stream_usage(),
        );
        let stream = chat_completion_stream(state.clone(), upstream, translator, request_id);
        return Ok(Sse::new(stream).keep_alive(KeepAlive::default()).into_response());
    }

    let response = state
        .backend
        .generate(&vertex_model, &body)
        .await
        .map_err(|e| state.upstream_failure("chat_completions", &request_id, e))?;

    let completion = to_chat_completion(response, &req.model, completion_id())
        .map_err(|e| state.upstream_failure("chat_completions", &request_id, e))?;

    info!(
        request_id = %request_id,
        finish_reason = %completion.choices[0].finish_reason,
        total_tokens = completion.usage.total_tokens,
        "Chat completion done"
    );

    Ok(Json(completion).into_response())
}

async fn embeddings(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    state.metrics.record_request("embeddings");
    let Json(req) = payload?;
    let request_id = Uuid::new_v4().to_string();
    let vertex_model = state.catalog.resolve_embedding(&req.model);

    let texts = match req.input {
        EmbeddingInput::Single(text) => vec![text],
        EmbeddingInput::Many(texts) => texts,
        EmbeddingInput::Tokens(_) | EmbeddingInput::TokenBatches(_) => {
            return Err(ApiError::BadRequest(
                "Token-array input is not supported; send text instead".to_string(),
            ));
        }
    };
    if texts.is_empty() || texts.iter().any(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("'input' must not be empty".to_string()));
    }

    let base64 = match req.encoding_format.as_deref() {
        None | Some("float") => false,
        Some("base64") => true,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Unsupported encoding_format '{other}'; use 'float' or 'base64'"
            )));
        }
    };

    info!(
        request_id = %request_id,
        model = %req.model,
        vertex_model = %vertex_model,
        inputs = texts.len(),
        "Embeddings request"
    );

    let vectors = state
        .backend
        .embed(&vertex_model, &texts, req.dimensions)
        .await
        .map_err(|e| state.upstream_failure("embeddings", &request_id, e))?;

    Ok(Json(embedding_response(vectors, req.model, base64)))
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    state.metrics.record_request("models");
    Json(state.catalog.list(state.created))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        project: state.config.vertex.project_id.clone(),
        location: state.config.vertex.location.clone(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ─── Embedding Helpers ─────────────────────────────────────────────────────

/// OpenAI embeddings list for Vertex vectors, in input order.
pub fn embedding_response(
    vectors: Vec<EmbeddingValues>,
    model: String,
    base64: bool,
) -> EmbeddingResponse {
    let prompt_tokens: u32 = vectors
        .iter()
        .filter_map(|v| v.statistics.as_ref())
        .map(|s| s.token_count.round() as u32)
        .sum();

    let data = vectors
        .into_iter()
        .enumerate()
        .map(|(index, v)| Embedding {
            object: "embedding".to_string(),
            index: index as u32,
            embedding: if base64 {
                EmbeddingVector::Base64(encode_f32_base64(&v.values))
            } else {
                EmbeddingVector::Float(v.values)
            },
        })
        .collect();

    EmbeddingResponse {
        object: "list".to_string(),
        data,
        model,
        usage: EmbeddingUsage {
            prompt_tokens,
            total_tokens: prompt_tokens,
        },
    }
}

/// Base64 of the vector's little-endian `f32` bytes.
pub fn encode_f32_base64(values: &[f32]) -> String {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::types::EmbeddingStatistics;

    fn values(values: Vec<f32>, tokens: f64) -> EmbeddingValues {
        EmbeddingValues {
            values,
            statistics: Some(EmbeddingStatistics {
                token_count: tokens,
                truncated: false,
            }),
        }
    }

    #[test]
    fn test_embedding_response_usage_and_order() {
        let resp = embedding_response(
            vec![values(vec![0.1, 0.2], 3.0), values(vec![0.3], 5.0)],
            "text-embedding-3-small".to_string(),
            false,
        );
        assert_eq!(resp.object, "list");
        assert_eq!(resp.usage.prompt_tokens, 8);
        assert_eq!(resp.usage.total_tokens, 8);
        assert_eq!(resp.data[1].index, 1);
        assert!(matches!(&resp.data[1].embedding, EmbeddingVector::Float(v) if v == &[0.3]));
    }

    #[test]
    fn test_base64_encoding_is_little_endian_f32() {
        let encoded = encode_f32_base64(&[1.0, -2.5]);
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(f32::from_le_bytes(bytes[0..4].try_into().unwrap()), 1.0);
        assert_eq!(f32::from_le_bytes(bytes[4..8].try_into().unwrap()), -2.5);
    }

    #[test]
    fn test_missing_statistics_count_as_zero() {
        let resp = embedding_response(
            vec![EmbeddingValues {
                values: vec![0.5],
                statistics: None,
            }],
            "m".to_string(),
            true,
        );
        assert_eq!(resp.usage.prompt_tokens, 0);
        assert!(matches!(resp.data[0].embedding, EmbeddingVector::Base64(_)));
    }
}
