//! Translation between the OpenAI and Vertex AI schemas.
//!
//! - [`request`]: OpenAI chat request → `GenerateContentRequest`
//! - [`response`]: `GenerateContentResponse` → OpenAI chat completion
//! - [`stream`]: Vertex stream events → OpenAI chunks, sentence re-buffering

pub mod request;
pub mod response;
pub mod stream;

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Invalid image URL: {0}")]
    InvalidImageUrl(String),

    #[error("Invalid base64 image data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Invalid arguments for tool call '{name}': {reason}")]
    InvalidToolArguments { name: String, reason: String },

    #[error("Tool message has no name and tool_call_id '{0}' matches no earlier tool call")]
    UnknownToolCall(String),

    #[error("Invalid response from Vertex AI: no candidates{}", blocked_suffix(.block_reason))]
    NoCandidates { block_reason: Option<String> },
}

impl TranslateError {
    /// True for errors caused by the client's request rather than the upstream.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, TranslateError::NoCandidates { .. })
    }
}

fn blocked_suffix(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map(|r| format!(" (prompt blocked: {r})"))
        .unwrap_or_default()
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// `chatcmpl-<hex>` completion ID.
pub fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}

/// `call_<hex>` tool-call ID.
pub fn tool_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Map a Vertex `finishReason` to an OpenAI `finish_reason`.
pub fn map_finish_reason(reason: Option<&str>) -> &'static str {
    match reason {
        Some("MAX_TOKENS") => "length",
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") => {
            "content_filter"
        }
        _ => "stop",
    }
}
