//! HTTP server providing an OpenAI-compatible API.
//!
//! - [`openai_api`]: Application state, router and route handlers
//! - [`streaming`]: SSE streaming for chat completions
//! - [`auth`]: Bearer API-key middleware
//! - [`error`]: OpenAI-shaped error responses
//! - [`metrics`]: Prometheus counters

pub mod auth;
pub mod error;
pub mod metrics;
pub mod openai_api;
pub mod streaming;
