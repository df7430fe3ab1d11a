//! Shared HTTP plumbing for the OpenAI-compatible chat-completions wire
//! format (§4.1). `clients::openai` and `clients::claude` both speak this
//! dialect — Anthropic's own `/v1/chat/completions`-compatible beta surface
//! lets `ClaudeBackend` reuse the exact same request/response shapes and SSE
//! codec as `OpenAiBackend`, just against a different base URL and header
//! set.

use crate::error::CloudLlmError;
use crate::part::{ChatMessage, ChatResult, FinishReason, Part, Role, ToolPartKind, Usage};
use crate::tool::ToolDefinition;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

lazy_static::lazy_static! {
    /// One pooled client shared by every adapter in the process, tuned for
    /// long-lived streaming connections to a handful of LLM API hosts.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .expect("static reqwest client configuration always builds");
}

/// The process-wide pooled HTTP client every backend adapter should reuse
/// rather than constructing its own.
pub fn get_shared_http_client() -> reqwest::Client {
    SHARED_HTTP_CLIENT.clone()
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct WireTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: WireFunction,
}

#[derive(Debug, Serialize, Clone)]
pub struct WireFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Clone)]
pub struct WireMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: WireFunctionCall,
}

#[derive(Debug, Serialize, Clone)]
pub struct WireFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChunkToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChunkFunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// Translate a provider-agnostic history into the wire format above. Tool
/// results travel on ordinary `ChatMessage`s in our data model (§6.5: no
/// dedicated `tool` role is assumed upstream of the adapter boundary), so
/// they are split out into their own `role: "tool"` wire messages here, one
/// per `Tool.result` part.
pub fn to_wire_messages(history: &[ChatMessage]) -> Vec<WireMessage> {
    let mut wire = Vec::new();
    for message in history {
        let tool_results: Vec<&Part> = message
            .parts
            .iter()
            .filter(|p| matches!(p, Part::Tool { kind: ToolPartKind::Result, .. }))
            .collect();

        if !tool_results.is_empty() {
            for part in tool_results {
                if let Part::Tool { id, result, .. } = part {
                    wire.push(WireMessage {
                        role: "tool",
                        content: Some(result.clone().unwrap_or(serde_json::Value::Null).to_string()),
                        tool_calls: None,
                        tool_call_id: Some(id.clone()),
                    });
                }
            }
            continue;
        }

        let text = message.text();
        let tool_calls: Vec<WireToolCall> = message
            .tool_calls()
            .into_iter()
            .filter_map(|part| match part {
                Part::Tool { id, name, arguments, .. } => Some(WireToolCall {
                    id: id.clone(),
                    tool_type: "function",
                    function: WireFunctionCall {
                        name: name.clone(),
                        arguments: arguments.clone().unwrap_or(serde_json::Value::Null).to_string(),
                    },
                }),
                _ => None,
            })
            .collect();

        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Model => "assistant",
        };

        wire.push(WireMessage {
            role,
            content: if text.is_empty() && !tool_calls.is_empty() { None } else { Some(text) },
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
            tool_call_id: None,
        });
    }
    wire
}

/// Translate registered tools into the wire `tools` array.
pub fn to_wire_tools(tools: &[ToolDefinition]) -> Option<Vec<WireTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|t| WireTool {
                tool_type: "function",
                function: WireFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect(),
    )
}

fn finish_reason_from_str(raw: &str) -> FinishReason {
    match raw {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Unspecified,
    }
}

/// POST `request` to `url` and translate the resulting SSE stream into
/// [`ChatResult`] chunks (§4.1). Shared by every OpenAI-compatible adapter.
pub async fn stream_chat_completions(
    client: reqwest::Client,
    url: String,
    auth_header: (String, String),
    request: ChatCompletionRequest,
) -> Result<impl Stream<Item = Result<ChatResult, CloudLlmError>>, CloudLlmError> {
    let response = client
        .post(url)
        .header(auth_header.0, auth_header.1)
        .json(&request)
        .send()
        .await
        .map_err(|e| CloudLlmError::AdapterTransport(e.to_string()))?;

    let status = response.status();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        let body = response.text().await.unwrap_or_default();
        if log::log_enabled!(log::Level::Error) {
            log::error!("cloudllm::clients::common::stream_chat_completions(...): auth error HTTP {status}: {body}");
        }
        return Err(CloudLlmError::AdapterAuth(format!("HTTP {status}: {body}")));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if log::log_enabled!(log::Level::Error) {
            log::error!("cloudllm::clients::common::stream_chat_completions(...): transport error HTTP {status}: {body}");
        }
        return Err(CloudLlmError::AdapterTransport(format!("HTTP {status}: {body}")));
    }

    let mut event_stream = response.bytes_stream().eventsource();

    let stream = async_stream::try_stream! {
        // Provider-assigned ids only appear on a tool call's first delta;
        // subsequent deltas key by `index` alone, so track index -> id here.
        let mut call_ids: Vec<String> = Vec::new();

        while let Some(event) = event_stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    if log::log_enabled!(log::Level::Error) {
                        log::error!("cloudllm::clients::common::stream_chat_completions(...): SSE transport error: {e}");
                    }
                    Err(CloudLlmError::AdapterTransport(e.to_string()))?
                }
            };
            if event.data == "[DONE]" {
                break;
            }

            let chunk: ChatCompletionChunk = match serde_json::from_str(&event.data) {
                Ok(chunk) => chunk,
                Err(e) => {
                    if log::log_enabled!(log::Level::Error) {
                        log::error!("cloudllm::clients::common::stream_chat_completions(...): malformed SSE chunk: {e}");
                    }
                    Err(CloudLlmError::AdapterProtocol(format!("malformed SSE chunk: {e}")))?
                }
            };

            if chunk.choices.is_empty() {
                if let Some(usage) = chunk.usage {
                    let mut result = ChatResult::text_delta("");
                    result.usage = Some(Usage {
                        input_tokens: usage.prompt_tokens,
                        output_tokens: usage.completion_tokens,
                        total_tokens: usage.total_tokens,
                    });
                    yield result;
                }
                continue;
            }

            for choice in chunk.choices {
                let mut output = ChatMessage::new(Role::Model);

                if let Some(text) = choice.delta.content {
                    if !text.is_empty() {
                        output.parts.push(Part::text(text));
                    }
                }

                if let Some(deltas) = choice.delta.tool_calls {
                    for delta in deltas {
                        while call_ids.len() <= delta.index {
                            call_ids.push(String::new());
                        }
                        if let Some(id) = delta.id {
                            call_ids[delta.index] = id;
                        }
                        let id = call_ids[delta.index].clone();
                        let name = delta.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default();
                        let arguments = delta.function.and_then(|f| f.arguments).unwrap_or_default();
                        output.parts.push(Part::Tool {
                            kind: ToolPartKind::Call,
                            id,
                            name,
                            arguments: Some(serde_json::Value::String(arguments)),
                            result: None,
                        });
                    }
                }

                let finish_reason = choice
                    .finish_reason
                    .as_deref()
                    .map(finish_reason_from_str)
                    .unwrap_or(FinishReason::Unspecified);

                yield ChatResult {
                    id: None,
                    output,
                    messages: Vec::new(),
                    thinking: None,
                    finish_reason,
                    metadata: Default::default(),
                    usage: None,
                };
            }
        }
    };

    Ok(stream)
}
