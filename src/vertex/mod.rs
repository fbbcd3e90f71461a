//! Upstream access to Vertex AI.
//!
//! - [`types`]: REST request/response payloads
//! - [`auth`]: OAuth2 access-token sources
//! - [`client`]: HTTP client implementing [`GenerativeBackend`]

pub mod auth;
pub mod client;
pub mod types;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use types::{EmbeddingValues, GenerateContentRequest, GenerateContentResponse};

#[derive(Error, Debug)]
pub enum VertexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vertex AI returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode Vertex AI response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Access token unavailable: {0}")]
    Token(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Unexpected Vertex AI response: {0}")]
    Unexpected(String),
}

/// Stream of partial responses from `streamGenerateContent`.
pub type ResponseStream = BoxStream<'static, Result<GenerateContentResponse, VertexError>>;

/// The operations the HTTP layer needs from a model provider.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// One-shot generation.
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, VertexError>;

    /// Streaming generation. Errors opening the stream are returned
    /// directly; errors after that arrive as stream items.
    async fn stream_generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<ResponseStream, VertexError>;

    /// Embed each text, preserving order.
    async fn embed(
        &self,
        model: &str,
        texts: &[String],
        dimensions: Option<u32>,
    ) -> Result<Vec<EmbeddingValues>, VertexError>;
}
