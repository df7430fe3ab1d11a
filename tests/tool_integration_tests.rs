//! Typed-output and malformed-argument scenarios driven through the public
//! API against a deterministic in-process `ChatBackend`.

use async_trait::async_trait;
use cloudllm::backend::{BackendStream, ChatBackend, ModelInfo};
use cloudllm::part::{ChatMessage, ChatResult, FinishReason, Part, Role};
use cloudllm::tool::{tool_map, ToolDefinition};
use cloudllm::{typed_output, CloudLlmError};
use futures_util::StreamExt;
use std::sync::Mutex;

struct ScriptedBackend {
    turns: Mutex<Vec<Vec<ChatResult>>>,
}

impl ScriptedBackend {
    fn new(turns: Vec<Vec<ChatResult>>) -> Self {
        ScriptedBackend { turns: Mutex::new(turns) }
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![]
    }

    async fn send_stream(
        &self,
        _history: &[ChatMessage],
        _tools: &[ToolDefinition],
        _output_schema: Option<&serde_json::Value>,
    ) -> Result<BackendStream, CloudLlmError> {
        let mut turns = self.turns.lock().unwrap();
        let next = if turns.is_empty() { vec![] } else { turns.remove(0) };
        Ok(Box::pin(futures_util::stream::iter(next.into_iter().map(Ok))))
    }
}

/// Scenario 2 (§8): typed output via the synthesized `return_result` tool.
/// No text is streamed to the caller before the final JSON yield.
#[tokio::test]
async fn typed_output_yields_only_final_json() {
    let mut call_chunk = ChatResult::text_delta("");
    call_chunk.output = ChatMessage::new(Role::Model).with_part(Part::tool_call(
        "call_1",
        typed_output::RETURN_RESULT_TOOL_NAME,
        serde_json::json!({"town": "Chicago", "country": "United States"}),
    ));
    call_chunk.finish_reason = FinishReason::ToolCalls;

    let backend = std::sync::Arc::new(ScriptedBackend::new(vec![vec![call_chunk]]));
    let schema = serde_json::json!({
        "type": "object",
        "properties": {"town": {"type": "string"}, "country": {"type": "string"}},
        "required": ["town", "country"]
    });
    let history = vec![ChatMessage::user_text("The windy city in the US of A.")];

    let mut stream = typed_output::run(backend, history, tool_map(vec![]), schema);

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }

    assert_eq!(events.len(), 1, "only the final JSON event should reach the caller");
    let parsed: serde_json::Value = serde_json::from_str(&events[0].output).unwrap();
    assert_eq!(parsed["town"], "Chicago");
    assert_eq!(parsed["country"], "United States");
    assert!(!events[0].should_continue);
}

/// Scenario 6 (§8): a tool call with arguments that never close as valid
/// JSON consolidates to `{}`, and the tool's own validation error flows
/// back into history rather than panicking the orchestrator.
#[tokio::test]
async fn malformed_tool_arguments_consolidate_to_empty_object() {
    let strict_tool = ToolDefinition::new_sync("lookup", "strict lookup", serde_json::json!({}), |args| {
        args.get("key")
            .and_then(|v| v.as_str())
            .map(|key| serde_json::json!({"value": key}))
            .ok_or_else(|| "missing required argument \"key\"".to_string())
    });

    // Simulates a provider streaming partial JSON for a tool call that never
    // closes: the chunk's arguments carry a dangling object fragment as a
    // string the accumulator cannot parse, so it falls back to `{}`.
    let mut call_chunk = ChatResult::text_delta("");
    call_chunk.output = ChatMessage::new(Role::Model).with_part(Part::Tool {
        kind: cloudllm::part::ToolPartKind::Call,
        id: "call_1".to_string(),
        name: "lookup".to_string(),
        arguments: Some(serde_json::Value::String("{\"key\": \"abc".to_string())),
        result: None,
    });
    call_chunk.finish_reason = FinishReason::ToolCalls;

    let mut followup = ChatResult::text_delta("I need a valid key to look that up.");
    followup.finish_reason = FinishReason::Stop;

    let backend = std::sync::Arc::new(ScriptedBackend::new(vec![vec![call_chunk], vec![followup]]));
    let tools = tool_map(vec![strict_tool]);
    let history = vec![ChatMessage::user_text("look up abc")];

    let mut stream = cloudllm::orchestrator::run(backend, history, tools, None);

    let mut error_payload = None;
    let mut final_text = String::new();
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        final_text.push_str(&event.output);
        for message in &event.messages {
            for part in &message.parts {
                if let Part::Tool { result: Some(result), .. } = part {
                    error_payload = Some(result.clone());
                }
            }
        }
    }

    let error_payload = error_payload.expect("tool should have produced an error result");
    assert_eq!(error_payload["error"], "missing required argument \"key\"");
    assert!(final_text.contains("valid key"));
}
