//! vertex-gateway: OpenAI-compatible HTTP gateway for Vertex AI Gemini.
//!
//! Accepts OpenAI `/v1/chat/completions`, `/v1/models` and `/v1/embeddings`
//! requests, translates them into Vertex AI REST calls and converts the
//! results back, including streamed chat completions over SSE.

pub mod config;
pub mod models;
pub mod openai;
pub mod server;
pub mod translate;
pub mod vertex;
