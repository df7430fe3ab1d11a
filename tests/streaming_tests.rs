//! End-to-end orchestrator scenarios driven through the public API against
//! a deterministic in-process `ChatBackend`, no network involved.

use async_trait::async_trait;
use cloudllm::backend::{BackendStream, ChatBackend, ModelInfo};
use cloudllm::part::{ChatMessage, ChatResult, FinishReason, Part, Role, Usage};
use cloudllm::tool::{tool_map, ToolDefinition};
use cloudllm::{orchestrator, CloudLlmError};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Replays a fixed script of turns, one `Vec<ChatResult>` per call to
/// `send_stream`, regardless of the history/tools passed in.
struct ScriptedBackend {
    turns: Mutex<Vec<Vec<ChatResult>>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(turns: Vec<Vec<ChatResult>>) -> Self {
        ScriptedBackend {
            turns: Mutex::new(turns),
            calls: AtomicUsize::new(0),
        }
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
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut turns = self.turns.lock().unwrap();
        let next = if turns.is_empty() { vec![] } else { turns.remove(0) };
        Ok(Box::pin(futures_util::stream::iter(next.into_iter().map(Ok))))
    }
}

fn tool_call_chunk(id: &str, name: &str, args: serde_json::Value) -> ChatResult {
    let mut chunk = ChatResult::text_delta("");
    chunk.output = ChatMessage::new(Role::Model).with_part(Part::tool_call(id, name, args));
    chunk.finish_reason = FinishReason::ToolCalls;
    chunk
}

fn final_text_chunk(text: &str) -> ChatResult {
    let mut chunk = ChatResult::text_delta(text);
    chunk.finish_reason = FinishReason::Stop;
    chunk.usage = Some(Usage {
        input_tokens: 20,
        output_tokens: 8,
        total_tokens: 28,
    });
    chunk
}

/// Scenario 1 (§8): a two-step tool chain where the second tool's argument
/// depends on the first tool's result.
#[tokio::test]
async fn two_step_tool_chain_reaches_final_answer() {
    let get_current_time = ToolDefinition::new_sync("get_current_time", "current time", serde_json::json!({}), |_args| {
        Ok(serde_json::json!({"time": "2025-06-21T10:00:00Z"}))
    });
    let find_events = ToolDefinition::new_sync(
        "find_events",
        "events for a date",
        serde_json::json!({"type": "object", "properties": {"date": {"type": "string"}}}),
        |args| {
            let date = args.get("date").and_then(|v| v.as_str()).unwrap_or("");
            assert_eq!(date, "2025-06-21");
            Ok(serde_json::json!({"events": ["Team Meeting at 11am"]}))
        },
    );

    let backend = Arc::new(ScriptedBackend::new(vec![
        vec![tool_call_chunk("call_1", "get_current_time", serde_json::json!({}))],
        vec![tool_call_chunk("call_2", "find_events", serde_json::json!({"date": "2025-06-21"}))],
        vec![final_text_chunk("You have Team Meeting at 11am today.")],
    ]));

    let tools = tool_map(vec![get_current_time, find_events]);
    let history = vec![ChatMessage::user_text("What events do I have today? Find the current date first.")];
    let mut stream = orchestrator::run(backend, history, tools, None);

    let mut final_text = String::new();
    let mut messages = Vec::new();
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        final_text.push_str(&event.output);
        messages.extend(event.messages);
    }

    assert!(final_text.contains("Team Meeting at 11am"));

    let tool_result_payloads: Vec<serde_json::Value> = messages
        .iter()
        .flat_map(|m| &m.parts)
        .filter_map(|p| match p {
            Part::Tool { result: Some(result), .. } => Some(result.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(tool_result_payloads.len(), 2);
    assert_eq!(tool_result_payloads[0]["time"], "2025-06-21T10:00:00Z");
    assert_eq!(tool_result_payloads[1]["events"][0], "Team Meeting at 11am");
}

/// Scenario 3 (§8): a failing tool still lets the conversation recover —
/// the error becomes part of the tool-result payload and the model's next
/// turn addresses it in natural language.
#[tokio::test]
async fn tool_failure_recovers_with_natural_language_followup() {
    let weather = ToolDefinition::new_sync("weather", "weather lookup", serde_json::json!({}), |args| {
        let city = args.get("city").and_then(|v| v.as_str()).unwrap_or("");
        Err(format!("no weather data for '{city}'"))
    });

    let backend = Arc::new(ScriptedBackend::new(vec![
        vec![tool_call_chunk("call_1", "weather", serde_json::json!({"city": "Mars"}))],
        vec![final_text_chunk("I couldn't find weather data for Mars.")],
    ]));

    let tools = tool_map(vec![weather]);
    let history = vec![ChatMessage::user_text("What's the weather on Mars?")];
    let mut stream = orchestrator::run(backend, history, tools, None);

    let mut final_text = String::new();
    let mut final_finish_reason = FinishReason::Unspecified;
    let mut saw_error_result = false;
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        final_text.push_str(&event.output);
        final_finish_reason = event.finish_reason;
        for message in &event.messages {
            for part in &message.parts {
                if let Part::Tool { result: Some(result), .. } = part {
                    if result.get("error").is_some() {
                        saw_error_result = true;
                    }
                }
            }
        }
    }

    assert!(saw_error_result);
    assert!(final_text.contains("Mars"));
    assert_eq!(final_finish_reason, FinishReason::Stop);
}

/// Scenario 5 (§8): two tool calls in one turn execute concurrently and
/// their result parts appear in input order regardless of completion order,
/// then a single combined answer follows.
#[tokio::test]
async fn concurrent_tool_batch_preserves_call_order() {
    let weather = ToolDefinition::new_sync("weather", "weather lookup", serde_json::json!({}), |args| {
        let city = args.get("city").and_then(|v| v.as_str()).unwrap_or("").to_string();
        Ok(serde_json::json!({"city": city, "tempC": if city == "Paris" { 18 } else { 24 }}))
    });

    let mut batch_turn = ChatResult::text_delta("");
    batch_turn.output = ChatMessage::new(Role::Model)
        .with_part(Part::tool_call("call_1", "weather", serde_json::json!({"city": "Paris"})))
        .with_part(Part::tool_call("call_2", "weather", serde_json::json!({"city": "Tokyo"})));
    batch_turn.finish_reason = FinishReason::ToolCalls;

    let backend = Arc::new(ScriptedBackend::new(vec![
        vec![batch_turn],
        vec![final_text_chunk("Paris is 18C and Tokyo is 24C.")],
    ]));

    let tools = tool_map(vec![weather]);
    let history = vec![ChatMessage::user_text("What's the weather in Paris and Tokyo?")];
    let mut stream = orchestrator::run(backend, history, tools, None);

    let mut messages = Vec::new();
    let mut final_text = String::new();
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        final_text.push_str(&event.output);
        messages.extend(event.messages);
    }

    let result_ids: Vec<&str> = messages
        .iter()
        .flat_map(|m| &m.parts)
        .filter_map(|p| match p {
            Part::Tool { result: Some(_), id, .. } => Some(id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(result_ids, vec!["call_1", "call_2"]);
    assert!(final_text.contains("Paris") && final_text.contains("Tokyo"));
}

/// Scenario 4 (§8): an empty assistant turn immediately after a tool result
/// triggers exactly one synthetic continuation before the orchestrator
/// terminates if the retry is also empty.
#[tokio::test]
async fn empty_after_tools_terminates_after_one_retry() {
    let noop = ToolDefinition::new_sync("noop", "does nothing", serde_json::json!({}), |_| Ok(serde_json::json!({"ok": true})));

    let mut empty_turn = ChatResult::text_delta("");
    empty_turn.finish_reason = FinishReason::Stop;

    let backend = Arc::new(ScriptedBackend::new(vec![
        vec![tool_call_chunk("call_1", "noop", serde_json::json!({}))],
        vec![empty_turn.clone()],
        vec![empty_turn],
    ]));

    let tools = tool_map(vec![noop]);
    let history = vec![ChatMessage::user_text("do the thing")];
    let mut stream = orchestrator::run(Arc::clone(&backend), history, tools, None);

    let mut ended = false;
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        if !event.should_continue {
            ended = true;
        }
    }
    assert!(ended);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
}
