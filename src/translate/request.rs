//! OpenAI chat request → Vertex `GenerateContentRequest`.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value};

use crate::config::GenerationDefaults;
use crate::openai::{
    ChatCompletionRequest, ChatMessage, ContentPart, FunctionCall as OpenAiFunctionCall,
    MessageContent, Tool as OpenAiTool, ToolChoice,
};
use crate::translate::TranslateError;
use crate::vertex::types::{
    Content, FunctionCallingConfig, FunctionCallingMode, FunctionDeclaration, GenerateContentRequest,
    GenerationConfig, Part, SafetySetting, Tool, ToolConfig,
};

/// MIME type assumed for remote images without a recognisable extension.
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Build the full Vertex request for an OpenAI chat request.
pub fn build_generate_request(
    req: &ChatCompletionRequest,
    defaults: &GenerationDefaults,
) -> Result<GenerateContentRequest, TranslateError> {
    let (contents, system_instruction) = convert_messages(&req.messages)?;

    Ok(GenerateContentRequest {
        contents,
        system_instruction,
        tools: req.tools.as_deref().and_then(convert_tools),
        tool_config: req.tool_choice.as_ref().and_then(convert_tool_choice),
        generation_config: Some(build_generation_config(req, defaults)),
        safety_settings: defaults.safety_block_none.then(SafetySetting::block_none),
    })
}

/// Convert OpenAI messages into Vertex contents plus an optional system instruction.
pub fn convert_messages(
    messages: &[ChatMessage],
) -> Result<(Vec<Content>, Option<Content>), TranslateError> {
    let mut contents = Vec::with_capacity(messages.len());
    let mut system_parts = Vec::new();
    // tool_call_id → function name, for tool results that omit `name`.
    let mut call_names: HashMap<&str, &str> = HashMap::new();

    for message in messages {
        match message.role.as_str() {
            "system" | "developer" => {
                let text = message.text_content();
                if !text.is_empty() {
                    system_parts.push(Part::text(text));
                }
            }
            "tool" | "function" => {
                let name = match (&message.name, &message.tool_call_id) {
                    (Some(name), _) => name.clone(),
                    (None, Some(id)) => call_names
                        .get(id.as_str())
                        .map(|n| n.to_string())
                        .ok_or_else(|| TranslateError::UnknownToolCall(id.clone()))?,
                    (None, None) => return Err(TranslateError::UnknownToolCall(String::new())),
                };
                let response = json!({ "content": message.text_content() });
                let part = Part::function_response(name, response);

                // Parallel tool results share one user turn.
                match contents.last_mut() {
                    Some(last) if is_function_response_turn(last) => last.parts.push(part),
                    _ => contents.push(Content::new("user", vec![part])),
                }
            }
            role => {
                let vertex_role = if role == "assistant" { "model" } else { "user" };
                let mut parts = content_parts(message.content.as_ref())?;

                for call in message.tool_calls.iter().flatten() {
                    call_names.insert(call.id.as_str(), call.function.name.as_str());
                    parts.push(Part::function_call(
                        call.function.name.clone(),
                        parse_arguments(&call.function)?,
                    ));
                }

                if !parts.is_empty() {
                    contents.push(Content::new(vertex_role, parts));
                }
            }
        }
    }

    let system_instruction = (!system_parts.is_empty()).then(|| Content {
        role: None,
        parts: system_parts,
    });

    Ok((contents, system_instruction))
}

fn is_function_response_turn(content: &Content) -> bool {
    content.role.as_deref() == Some("user")
        && !content.parts.is_empty()
        && content.parts.iter().all(|p| p.function_response.is_some())
}

fn content_parts(content: Option<&MessageContent>) -> Result<Vec<Part>, TranslateError> {
    match content {
        None => Ok(Vec::new()),
        Some(MessageContent::Text(text)) if text.is_empty() => Ok(Vec::new()),
        Some(MessageContent::Text(text)) => Ok(vec![Part::text(text.clone())]),
        Some(MessageContent::Parts(items)) => items
            .iter()
            .map(|item| match item {
                ContentPart::Text { text } => Ok(Part::text(text.clone())),
                ContentPart::ImageUrl { image_url } => image_part(&image_url.url),
            })
            .collect(),
    }
}

/// Turn an image URL into inline data (for `data:` URLs) or a file reference.
pub fn image_part(url: &str) -> Result<Part, TranslateError> {
    let Some(rest) = url.strip_prefix("data:") else {
        return Ok(Part::file_data(guess_mime(url), url));
    };

    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| TranslateError::InvalidImageUrl(preview(url)))?;
    let meta = meta
        .strip_suffix(";base64")
        .ok_or_else(|| TranslateError::InvalidImageUrl(preview(url)))?;
    let mime = meta.split(';').next().filter(|m| !m.is_empty());

    let payload = payload.trim();
    STANDARD.decode(payload)?;

    Ok(Part::inline_data(mime.unwrap_or(DEFAULT_IMAGE_MIME), payload))
}

fn guess_mime(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    mime_guess::from_path(path)
        .first_raw()
        .filter(|m| {
            m.starts_with("image/")
                || m.starts_with("video/")
                || m.starts_with("audio/")
                || *m == "application/pdf"
        })
        .unwrap_or(DEFAULT_IMAGE_MIME)
        .to_string()
}

fn preview(url: &str) -> String {
    url.chars().take(48).collect()
}

fn parse_arguments(call: &OpenAiFunctionCall) -> Result<Value, TranslateError> {
    if call.arguments.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    match serde_json::from_str::<Value>(&call.arguments) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(TranslateError::InvalidToolArguments {
            name: call.name.clone(),
            reason: "arguments must be a JSON object".to_string(),
        }),
        Err(e) => Err(TranslateError::InvalidToolArguments {
            name: call.name.clone(),
            reason: e.to_string(),
        }),
    }
}

/// All function tools as one Vertex tool; `None` when there are none.
pub fn convert_tools(tools: &[OpenAiTool]) -> Option<Vec<Tool>> {
    let declarations: Vec<FunctionDeclaration> = tools
        .iter()
        .filter(|t| t.kind == "function")
        .map(|t| FunctionDeclaration {
            name: t.function.name.clone(),
            description: t.function.description.clone(),
            parameters: t.function.parameters.clone(),
        })
        .collect();

    if declarations.is_empty() {
        return None;
    }

    Some(vec![Tool {
        function_declarations: declarations,
    }])
}

pub fn convert_tool_choice(choice: &ToolChoice) -> Option<ToolConfig> {
    let (mode, allowed) = match choice {
        ToolChoice::Mode(mode) => match mode.as_str() {
            "auto" => (FunctionCallingMode::Auto, None),
            "none" => (FunctionCallingMode::None, None),
            "required" => (FunctionCallingMode::Any, None),
            _ => return None,
        },
        ToolChoice::Named(named) => (
            FunctionCallingMode::Any,
            Some(vec![named.function.name.clone()]),
        ),
    };

    Some(ToolConfig {
        function_calling_config: FunctionCallingConfig {
            mode,
            allowed_function_names: allowed,
        },
    })
}

/// Sampling parameters. Output-token limits are not forwarded for
/// multimodal requests.
pub fn build_generation_config(
    req: &ChatCompletionRequest,
    defaults: &GenerationDefaults,
) -> GenerationConfig {
    let max_output_tokens = if req.is_multimodal() {
        None
    } else {
        req.max_completion_tokens.or(req.max_tokens)
    };

    GenerationConfig {
        temperature: Some(req.temperature.unwrap_or(defaults.temperature)),
        top_p: req.top_p,
        candidate_count: Some(1),
        max_output_tokens,
        stop_sequences: req.stop.clone().map(|s| s.into_vec()),
        response_mime_type: req.wants_json().then(|| "application/json".to_string()),
    }
}
