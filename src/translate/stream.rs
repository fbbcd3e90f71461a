//! Vertex stream events → OpenAI `chat.completion.chunk` values.
//!
//! [`ChunkTranslator`] keeps the per-stream state: one completion ID shared by
//! every chunk, whether the assistant role has been announced, the running
//! tool-call index, remembered usage and the eventual finish reason.
//! Streamed text is passed through a [`SentenceBuffer`] so clients receive
//! whole sentences instead of arbitrary token fragments.

use std::mem;

use crate::openai::{ChatCompletionChunk, ChunkChoice, ChunkDelta, ChunkToolCall, FunctionCall, Usage};
use crate::translate::response::{arguments_json, usage_from};
use crate::translate::{completion_id, map_finish_reason, tool_call_id, unix_now};
use crate::vertex::types::GenerateContentResponse;

/// Characters that end a sentence.
const TERMINATORS: &[char] = &['.', '!', '?', ';', '\n', '。', '！', '？', '；'];

/// Re-chunks streamed text at sentence boundaries.
///
/// Everything pushed is eventually emitted exactly once and in order;
/// emitted segments are never empty.
#[derive(Debug, Clone)]
pub struct SentenceBuffer {
    buf: String,
    max_chars: usize,
    enabled: bool,
}

impl SentenceBuffer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            buf: String::new(),
            max_chars,
            enabled: true,
        }
    }

    /// A buffer that emits every push unchanged.
    pub fn passthrough() -> Self {
        Self {
            buf: String::new(),
            max_chars: 0,
            enabled: false,
        }
    }

    /// Append `text` and return the segments that are ready.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if !self.enabled {
            return vec![text.to_string()];
        }

        self.buf.push_str(text);
        let mut ready = Vec::new();

        if let Some((idx, ch)) = self
            .buf
            .char_indices()
            .rev()
            .find(|(_, c)| TERMINATORS.contains(c))
        {
            let rest = self.buf.split_off(idx + ch.len_utf8());
            ready.push(mem::replace(&mut self.buf, rest));
        }

        if !self.buf.is_empty() && self.buf.chars().count() >= self.max_chars {
            ready.push(mem::take(&mut self.buf));
        }

        ready
    }

    /// Whatever is still buffered.
    pub fn flush(&mut self) -> Option<String> {
        (!self.buf.is_empty()).then(|| mem::take(&mut self.buf))
    }
}

/// Converts one Vertex stream into OpenAI chunks.
pub struct ChunkTranslator {
    id: String,
    model: String,
    created: u64,
    role_sent: bool,
    next_tool_index: u32,
    buffer: SentenceBuffer,
    usage: Option<Usage>,
    finish_reason: Option<&'static str>,
    include_usage: bool,
}

impl ChunkTranslator {
    pub fn new(model: impl Into<String>, buffer: SentenceBuffer, include_usage: bool) -> Self {
        Self {
            id: completion_id(),
            model: model.into(),
            created: unix_now(),
            role_sent: false,
            next_tool_index: 0,
            buffer,
            usage: None,
            finish_reason: None,
            include_usage,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Chunks for one Vertex stream event.
    pub fn on_response(&mut self, response: GenerateContentResponse) -> Vec<ChatCompletionChunk> {
        if response.usage_metadata.is_some() {
            self.usage = Some(usage_from(response.usage_metadata));
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return Vec::new();
        };

        let mut chunks = Vec::new();
        let mut calls = Vec::new();

        for part in candidate.parts() {
            if let Some(call) = &part.function_call {
                // Text before the first call of a run goes out first.
                if calls.is_empty() {
                    if let Some(text) = self.buffer.flush() {
                        chunks.push(self.content_chunk(text));
                    }
                }
                calls.push(ChunkToolCall {
                    index: self.next_tool_index,
                    id: tool_call_id(),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: call.name.clone(),
                        arguments: arguments_json(&call.args),
                    },
                });
                self.next_tool_index += 1;
            } else if let Some(text) = part.answer_text() {
                if !calls.is_empty() {
                    let run = mem::take(&mut calls);
                    chunks.push(self.tool_call_chunk(run));
                }
                for segment in self.buffer.push(text) {
                    chunks.push(self.content_chunk(segment));
                }
            }
        }

        if !calls.is_empty() {
            chunks.push(self.tool_call_chunk(calls));
        }

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if self.finish_reason != Some("tool_calls") {
                self.finish_reason = Some(map_finish_reason(Some(reason)));
            }
        }

        chunks
    }

    /// Remaining text, the finishing chunk, and the usage chunk if requested.
    pub fn finish(&mut self) -> Vec<ChatCompletionChunk> {
        let mut chunks = Vec::new();
        if let Some(text) = self.buffer.flush() {
            chunks.push(self.content_chunk(text));
        }

        let reason = self.finish_reason.unwrap_or("stop");
        let mut last = self.delta_chunk(ChunkDelta::default());
        last.choices[0].finish_reason = Some(reason.to_string());
        chunks.push(last);

        if self.include_usage {
            chunks.push(ChatCompletionChunk {
                id: self.id.clone(),
                object: "chat.completion.chunk".to_string(),
                created: self.created,
                model: self.model.clone(),
                choices: Vec::new(),
                usage: Some(self.usage.unwrap_or_default()),
            });
        }

        chunks
    }

    /// Remaining text followed by an error chunk.
    pub fn error(&mut self, message: &str) -> Vec<ChatCompletionChunk> {
        let mut chunks = Vec::new();
        if let Some(text) = self.buffer.flush() {
            chunks.push(self.content_chunk(text));
        }

        let mut chunk = self.content_chunk(format!("Error: {message}"));
        chunk.choices[0].finish_reason = Some("error".to_string());
        chunks.push(chunk);
        chunks
    }

    fn tool_call_chunk(&mut self, calls: Vec<ChunkToolCall>) -> ChatCompletionChunk {
        self.finish_reason = Some("tool_calls");
        self.delta_chunk(ChunkDelta {
            tool_calls: Some(calls),
            ..Default::default()
        })
    }

    fn content_chunk(&mut self, text: String) -> ChatCompletionChunk {
        self.delta_chunk(ChunkDelta {
            content: Some(text),
            ..Default::default()
        })
    }

    fn delta_chunk(&mut self, mut delta: ChunkDelta) -> ChatCompletionChunk {
        // First chunk includes the role.
        if !self.role_sent {
            delta.role = Some("assistant".to_string());
            self.role_sent = true;
        }

        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: None,
            }],
            usage: None,
        }
    }
}
