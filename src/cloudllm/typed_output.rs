//! Typed-Output Orchestrator (§4.7).
//!
//! Wraps [`crate::orchestrator::run`] to force a schema-shaped response out
//! of backends that have no native "respond as JSON matching schema X"
//! mode: a synthetic `return_result` tool is injected whose `inputSchema`
//! is the caller's requested output shape, text and metadata are
//! suppressed while that tool is in play, and the eventual `return_result`
//! call's arguments become the final JSON payload.

use crate::error::CloudLlmError;
use crate::event::EventHandler;
use crate::orchestrator::{self, IterationResult};
use crate::part::{ChatMessage, FinishReason, Metadata, Part, Role};
use crate::tool::{tool_map, ToolDefinition, ToolMap};
use crate::backend::ChatBackend;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;

/// Name of the synthesized tool the model is steered toward calling exactly
/// once to deliver its typed result.
pub const RETURN_RESULT_TOOL_NAME: &str = "return_result";

fn return_result_tool(schema: serde_json::Value) -> ToolDefinition {
    ToolDefinition::new_sync(RETURN_RESULT_TOOL_NAME, "Deliver the final structured result.", schema, |args| {
        Ok(args)
    })
}

/// Drive `initial_history` to a single typed JSON result, falling back to
/// the default orchestrator's behaviour if the model never calls
/// `return_result` in a given turn. Equivalent to [`run_with_events`] with
/// no event sink attached.
pub fn run(
    backend: Arc<dyn ChatBackend>,
    initial_history: Vec<ChatMessage>,
    tools: ToolMap,
    output_schema: serde_json::Value,
) -> BoxStream<'static, Result<IterationResult, CloudLlmError>> {
    run_with_events(backend, initial_history, tools, output_schema, None)
}

/// Like [`run`], additionally reporting [`crate::event::AgentEvent`]s from
/// the wrapped default orchestrator to `events` (§10.1 observability).
///
/// Tries the backend's native schema mode first (`output_schema` forwarded to
/// `send_stream` alongside the synthesized `return_result` tool, in case the
/// model calls it anyway). If the adapter rejects that with
/// [`CloudLlmError::SchemaUnsupported`] before yielding anything, this retries
/// with `output_schema` withheld, relying solely on the model calling
/// `return_result` (§4.7, §9's "adapter is responsible for choosing"). If the
/// stream ends without a `return_result` call ever appearing — the native-mode
/// case, where the model's answer arrives as ordinary streamed text already
/// shaped to the schema — the suppressed text is flushed as the final output
/// instead of being discarded.
pub fn run_with_events(
    backend: Arc<dyn ChatBackend>,
    initial_history: Vec<ChatMessage>,
    tools: ToolMap,
    output_schema: serde_json::Value,
    events: Option<Arc<dyn EventHandler>>,
) -> BoxStream<'static, Result<IterationResult, CloudLlmError>> {
    let mut augmented_tools = tools;
    augmented_tools.insert(RETURN_RESULT_TOOL_NAME.to_string(), return_result_tool(output_schema.clone()));

    let stream = async_stream::try_stream! {
        let mut inner = orchestrator::run_with_events(
            backend.clone(),
            initial_history.clone(),
            augmented_tools.clone(),
            Some(output_schema.clone()),
            events.clone(),
        );

        let mut current = inner.next().await;
        if let Some(Err(CloudLlmError::SchemaUnsupported(_))) = &current {
            inner = orchestrator::run_with_events(backend, initial_history, augmented_tools, None, events);
            current = inner.next().await;
        }

        let mut suppressed_text_parts: Vec<Part> = Vec::new();
        let mut suppressed_metadata = Metadata::new();

        while let Some(event) = current {
            let event = event?;

            let return_result_call = event.messages.iter().find_map(|message| {
                message.tool_calls().into_iter().find_map(|part| match part {
                    Part::Tool { name, id, arguments, .. } if name == RETURN_RESULT_TOOL_NAME => {
                        Some((id.clone(), arguments.clone().unwrap_or(serde_json::Value::Null)))
                    }
                    _ => None,
                })
            });

            if let Some((call_id, arguments)) = return_result_call {
                let payload = serde_json::to_string(&arguments).unwrap_or_default();

                let mut metadata = Metadata::new();
                metadata.insert("returnResultCallId".to_string(), serde_json::Value::String(call_id.clone()));
                metadata.insert("returnResultToolName".to_string(), serde_json::Value::String(RETURN_RESULT_TOOL_NAME.to_string()));
                for (key, value) in &suppressed_metadata {
                    metadata.entry(key.clone()).or_insert_with(|| value.clone());
                }
                if !suppressed_text_parts.is_empty() {
                    let suppressed_text: String = suppressed_text_parts
                        .iter()
                        .filter_map(|p| if let Part::Text { text } = p { Some(text.as_str()) } else { None })
                        .collect();
                    metadata.insert("suppressedText".to_string(), serde_json::Value::String(suppressed_text));
                }

                let synthetic = ChatMessage::new(Role::Model)
                    .with_part(Part::text(payload.clone()));

                yield IterationResult {
                    output: payload,
                    messages: vec![synthetic],
                    should_continue: false,
                    finish_reason: FinishReason::Stop,
                    metadata,
                    usage: event.usage,
                };
                return;
            } else if !event.output.is_empty() {
                // Text is always in play until return_result is seen, or the
                // stream ends without one (native-schema fallback below); do
                // not forward it to the caller yet.
                suppressed_text_parts.push(Part::text(event.output.clone()));
                for (key, value) in &event.metadata {
                    suppressed_metadata.insert(key.clone(), value.clone());
                }
            } else if !event.metadata.is_empty() {
                for (key, value) in &event.metadata {
                    suppressed_metadata.insert(key.clone(), value.clone());
                }
            } else if !event.should_continue {
                // Terminal with no return_result ever observed: the backend
                // honored output_schema natively and already streamed the
                // schema-shaped JSON as ordinary text. Flush it now instead
                // of discarding it (SPEC_FULL.md §9 native-mode resolution).
                let payload: String = suppressed_text_parts
                    .iter()
                    .filter_map(|p| if let Part::Text { text } = p { Some(text.as_str()) } else { None })
                    .collect();
                yield IterationResult {
                    output: payload,
                    messages: Vec::new(),
                    should_continue: false,
                    finish_reason: event.finish_reason,
                    metadata: suppressed_metadata.clone(),
                    usage: event.usage,
                };
                return;
            } else {
                yield event;
            }

            current = inner.next().await;
        }
    };

    Box::pin(stream)
}
