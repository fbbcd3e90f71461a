//! Vertex `GenerateContentResponse` → OpenAI `chat.completion`.

use crate::openai::{
    ChatChoice, ChatCompletionResponse, FunctionCall, ResponseMessage, ToolCall, Usage,
};
use crate::translate::{map_finish_reason, tool_call_id, unix_now, TranslateError};
use crate::vertex::types::{GenerateContentResponse, Part, UsageMetadata};

/// Convert a complete Vertex response, reporting `model` as the client's alias.
pub fn to_chat_completion(
    response: GenerateContentResponse,
    model: &str,
    id: String,
) -> Result<ChatCompletionResponse, TranslateError> {
    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| TranslateError::NoCandidates {
            block_reason: response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone()),
        })?;

    let parts = candidate.parts();
    let text = collect_text(parts);
    let tool_calls = collect_tool_calls(parts);

    let (message, finish_reason) = if tool_calls.is_empty() {
        (
            ResponseMessage {
                role: "assistant".to_string(),
                content: Some(text),
                tool_calls: None,
            },
            map_finish_reason(candidate.finish_reason.as_deref()),
        )
    } else {
        (
            ResponseMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(text),
                tool_calls: Some(tool_calls),
            },
            "tool_calls",
        )
    };

    Ok(ChatCompletionResponse {
        id,
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message,
            finish_reason: finish_reason.to_string(),
        }],
        usage: usage_from(response.usage_metadata),
    })
}

/// Concatenated answer text of all parts.
pub fn collect_text(parts: &[Part]) -> String {
    parts.iter().filter_map(Part::answer_text).collect()
}

/// OpenAI tool calls for every function-call part, with fresh IDs.
pub fn collect_tool_calls(parts: &[Part]) -> Vec<ToolCall> {
    parts
        .iter()
        .filter_map(|p| p.function_call.as_ref())
        .map(|call| ToolCall {
            id: tool_call_id(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: call.name.clone(),
                arguments: arguments_json(&call.args),
            },
        })
        .collect()
}

/// Compact JSON for function-call arguments; absent args become `{}`.
pub fn arguments_json(args: &serde_json::Value) -> String {
    if args.is_null() {
        return "{}".to_string();
    }
    args.to_string()
}

pub fn usage_from(metadata: Option<UsageMetadata>) -> Usage {
    let Some(m) = metadata else {
        return Usage::default();
    };
    let total = if m.total_token_count > 0 {
        m.total_token_count
    } else {
        m.prompt_token_count + m.candidates_token_count
    };
    Usage {
        prompt_tokens: m.prompt_token_count,
        completion_tokens: m.candidates_token_count,
        total_tokens: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vertex(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_response() {
        let resp = vertex(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "world"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        }));
        let out = to_chat_completion(resp, "gpt-4o", "chatcmpl-1".to_string()).unwrap();

        assert_eq!(out.object, "chat.completion");
        assert_eq!(out.model, "gpt-4o");
        assert_eq!(out.choices[0].message.content.as_deref(), Some("Hello, world"));
        assert_eq!(out.choices[0].finish_reason, "stop");
        assert_eq!(out.usage.total_tokens, 6);
    }

    #[test]
    fn test_thoughts_are_hidden() {
        let resp = vertex(json!({
            "candidates": [{"content": {"parts": [
                {"text": "let me think", "thought": true},
                {"text": "42"}
            ]}}]
        }));
        let out = to_chat_completion(resp, "gpt-4", "id".to_string()).unwrap();
        assert_eq!(out.choices[0].message.content.as_deref(), Some("42"));
    }

    #[test]
    fn test_function_call_response() {
        let resp = vertex(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "search", "args": {"q": "rust"}}},
                    {"functionCall": {"name": "noop"}}
                ]},
                "finishReason": "STOP"
            }]
        }));
        let out = to_chat_completion(resp, "gpt-4", "id".to_string()).unwrap();
        let choice = &out.choices[0];

        assert_eq!(choice.finish_reason, "tool_calls");
        assert!(choice.message.content.is_none());
        let calls = choice.message.tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].id.starts_with("call_"));
        assert_ne!(calls[0].id, calls[1].id);
        assert_eq!(calls[0].function.arguments, r#"{"q":"rust"}"#);
        assert_eq!(calls[1].function.arguments, "{}");
        assert_eq!(out.usage, Usage::default());
    }

    #[test]
    fn test_max_tokens_maps_to_length() {
        let resp = vertex(json!({
            "candidates": [{"content": {"parts": [{"text": "trunc"}]}, "finishReason": "MAX_TOKENS"}]
        }));
        let out = to_chat_completion(resp, "gpt-4", "id".to_string()).unwrap();
        assert_eq!(out.choices[0].finish_reason, "length");
    }

    #[test]
    fn test_no_candidates_is_an_error() {
        let resp = vertex(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        let err = to_chat_completion(resp, "gpt-4", "id".to_string()).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::NoCandidates { block_reason: Some(ref r) } if r == "SAFETY"
        ));
    }

    #[test]
    fn test_candidate_without_content_yields_empty_text() {
        let resp = vertex(json!({"candidates": [{"finishReason": "SAFETY"}]}));
        let out = to_chat_completion(resp, "gpt-4", "id".to_string()).unwrap();
        assert_eq!(out.choices[0].message.content.as_deref(), Some(""));
        assert_eq!(out.choices[0].finish_reason, "content_filter");
    }

    #[test]
    fn test_usage_total_is_derived_when_missing() {
        let usage = usage_from(Some(UsageMetadata {
            prompt_token_count: 3,
            candidates_token_count: 4,
            total_token_count: 0,
        }));
        assert_eq!(usage.total_tokens, 7);
    }
}
