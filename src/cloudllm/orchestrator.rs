//! Default Orchestrator: the turn loop (§4.3).
//!
//! Drives one conversation to completion against a [`ChatBackend`]: opens a
//! stream, folds chunks into the accumulator, resolves tool calls between
//! turns, and yields one [`IterationResult`] per caller-visible event. The
//! typed-output variant in `typed_output.rs` wraps this loop rather than
//! duplicating it.

use crate::backend::ChatBackend;
use crate::error::CloudLlmError;
use crate::event::{AgentEvent, EventHandler};
use crate::part::{ChatMessage, FinishReason, Metadata, Part, Role, Usage};
use crate::streaming_state::StreamingState;
use crate::tool::{self, ToolMap};
use crate::tool_id::MatchOutcome;
use async_stream::try_stream;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;

/// One caller-visible event from [`run`].
#[derive(Debug, Clone, Default)]
pub struct IterationResult {
    /// Incremental or final text for this event; empty for metadata-only or
    /// tool-result events.
    pub output: String,
    /// Fully-formed messages completed by this event (turn boundaries and
    /// tool-result messages).
    pub messages: Vec<ChatMessage>,
    /// `false` once the orchestrator has nothing further to do.
    pub should_continue: bool,
    /// Most recent finish reason observed.
    pub finish_reason: FinishReason,
    /// Event-scoped metadata (merged from the underlying chunk).
    pub metadata: Metadata,
    /// Token usage, populated only on the terminal event.
    pub usage: Option<Usage>,
}

impl IterationResult {
    fn text_delta(text: String, finish_reason: FinishReason, metadata: Metadata) -> Self {
        IterationResult {
            output: text,
            messages: Vec::new(),
            should_continue: true,
            finish_reason,
            metadata,
            usage: None,
        }
    }

    fn turn_boundary(message: ChatMessage, finish_reason: FinishReason) -> Self {
        IterationResult {
            output: String::new(),
            messages: vec![message],
            should_continue: true,
            finish_reason,
            metadata: Metadata::new(),
            usage: None,
        }
    }

    fn continuation() -> Self {
        IterationResult {
            should_continue: true,
            ..Default::default()
        }
    }

    fn terminal(finish_reason: FinishReason, usage: Option<Usage>) -> Self {
        IterationResult {
            output: String::new(),
            messages: Vec::new(),
            should_continue: false,
            finish_reason,
            metadata: Metadata::new(),
            usage,
        }
    }
}

/// Drive `initial_history` to completion against `backend`, yielding one
/// [`IterationResult`] per turn-loop event (§4.3). Equivalent to
/// [`run_with_events`] with no event sink attached.
///
/// `output_schema` is accepted for signature parity with the backend
/// contract; callers wanting the typed-output pathway (§4.7) should go
/// through `typed_output::run` instead, which wraps this function.
pub fn run(
    backend: Arc<dyn ChatBackend>,
    initial_history: Vec<ChatMessage>,
    tools: ToolMap,
    output_schema: Option<serde_json::Value>,
) -> BoxStream<'static, Result<IterationResult, CloudLlmError>> {
    run_with_events(backend, initial_history, tools, output_schema, None)
}

/// Like [`run`], additionally reporting [`AgentEvent`]s to `events` as the
/// turn loop progresses (§10.1 observability). `Agent` is the usual caller;
/// tests and `run` itself pass `None`.
pub fn run_with_events(
    backend: Arc<dyn ChatBackend>,
    initial_history: Vec<ChatMessage>,
    tools: ToolMap,
    output_schema: Option<serde_json::Value>,
    events: Option<Arc<dyn EventHandler>>,
) -> BoxStream<'static, Result<IterationResult, CloudLlmError>> {
    let stream = try_stream! {
        let tool_defs: Vec<_> = tools.values().cloned().collect();
        let mut state = StreamingState::new(initial_history, tools);
        let mut iteration = 0usize;

        while !state.done {
            state.is_first_chunk_of_message = true;
            iteration += 1;

            if let Some(handler) = &events {
                handler
                    .on_agent_event(&AgentEvent::LlmCallStarted {
                        backend_name: backend.name().to_string(),
                        iteration,
                    })
                    .await;
            }

            let snapshot = state.conversation_history.clone();
            let mut backend_stream = backend.send_stream(&snapshot, &tool_defs, output_schema.as_ref()).await?;

            let mut turn_finish_reason = FinishReason::Unspecified;

            while let Some(chunk) = backend_stream.next().await {
                let chunk = chunk?;
                turn_finish_reason = chunk.finish_reason;

                let text = chunk.output.text();
                if !text.is_empty() {
                    let prefixed = if state.should_prefix_next_message && state.is_first_chunk_of_message {
                        format!("\n{text}")
                    } else {
                        text
                    };
                    state.is_first_chunk_of_message = false;
                    state.should_prefix_next_message = false;
                    yield IterationResult::text_delta(prefixed, chunk.finish_reason, chunk.metadata.clone());
                } else if !chunk.metadata.is_empty() {
                    yield IterationResult {
                        output: String::new(),
                        messages: Vec::new(),
                        should_continue: true,
                        finish_reason: chunk.finish_reason,
                        metadata: chunk.metadata.clone(),
                        usage: None,
                    };
                }

                if chunk.output.parts.is_empty() && !chunk.messages.is_empty() {
                    state.accumulated_message.accumulate(&chunk.messages[0]);
                    if let Some(thinking) = &chunk.thinking {
                        state.accumulated_message.accumulate_thinking(thinking);
                    }
                    state.last_result = Some(chunk);
                } else {
                    state.ingest_chunk(&chunk);
                }
            }

            let consolidated = std::mem::replace(&mut state.accumulated_message, crate::accumulator::Accumulator::new())
                .consolidate();

            if let Some(handler) = &events {
                handler
                    .on_agent_event(&AgentEvent::LlmCallCompleted {
                        backend_name: backend.name().to_string(),
                        iteration,
                        response_len: consolidated.text().len(),
                    })
                    .await;
            }

            if state.is_empty_after_tools(&consolidated) {
                let history_has_recent_tool_result = state
                    .conversation_history
                    .iter()
                    .rev()
                    .take(2)
                    .any(|m| m.parts.iter().any(|p| matches!(p, Part::Tool { kind: crate::part::ToolPartKind::Result, .. })));

                if history_has_recent_tool_result {
                    let exceeded = state.record_empty_after_tools_continuation();
                    if exceeded {
                        if let Some(handler) = &events {
                            handler
                                .on_agent_event(&AgentEvent::EmptyAfterToolsLimitReached {
                                    continuations: state.empty_after_tools_continuations,
                                })
                                .await;
                        }
                        state.conversation_history.push(consolidated);
                        state.done = true;
                        yield IterationResult::terminal(turn_finish_reason, state.last_result.as_ref().and_then(|r| r.usage));
                        continue;
                    }
                    yield IterationResult::continuation();
                    continue;
                } else if matches!(turn_finish_reason, FinishReason::Stop | FinishReason::Length) {
                    state.conversation_history.push(consolidated);
                    state.done = true;
                    yield IterationResult::terminal(turn_finish_reason, state.last_result.as_ref().and_then(|r| r.usage));
                    continue;
                } else {
                    yield IterationResult::continuation();
                    continue;
                }
            }

            state.conversation_history.push(consolidated.clone());
            if log::log_enabled!(log::Level::Debug) {
                log::debug!("cloudllm::orchestrator::run_with_events(...): turn {iteration} boundary, finish_reason={turn_finish_reason:?}");
            }
            yield IterationResult::turn_boundary(consolidated.clone(), turn_finish_reason);

            let pending_calls: Vec<Part> = consolidated.tool_calls().into_iter().cloned().collect();
            if pending_calls.is_empty() {
                state.done = true;
                yield IterationResult::terminal(turn_finish_reason, state.last_result.as_ref().and_then(|r| r.usage));
                continue;
            }

            state.tool_id_coordinator.register_all(&pending_calls);
            state.should_prefix_next_message = true;

            if log::log_enabled!(log::Level::Debug) {
                log::debug!("cloudllm::orchestrator::run_with_events(...): dispatching {} tool call(s)", pending_calls.len());
            }

            if let Some(handler) = &events {
                for call in &pending_calls {
                    if let Part::Tool { id, name, .. } = call {
                        handler
                            .on_agent_event(&AgentEvent::ToolCallDetected {
                                tool_name: name.clone(),
                                call_id: id.clone(),
                            })
                            .await;
                    }
                }
            }

            let results = tool::execute_batch(&pending_calls, &state.tool_map).await;
            let mut result_message = ChatMessage::new(Role::User);
            for result in &results {
                let (call_id, tool_name) = match &result.tool_part {
                    Part::Tool { id, name, .. } => (id.clone(), name.clone()),
                    _ => unreachable!("execute_batch only returns tool parts"),
                };
                let resolved_id = reconcile_tool_result(&mut state.tool_id_coordinator, &call_id, &tool_name)?;
                let result_part = match &result.result_part {
                    Part::Tool { result: payload, .. } => {
                        Part::tool_result(resolved_id.clone(), tool_name.clone(), payload.clone().unwrap_or(serde_json::Value::Null))
                    }
                    other => other.clone(),
                };
                result_message.parts.push(result_part);
                if let Some(handler) = &events {
                    handler
                        .on_agent_event(&AgentEvent::ToolExecutionCompleted {
                            tool_name: tool_name.clone(),
                            call_id: resolved_id,
                            is_success: result.is_success,
                        })
                        .await;
                }
            }
            state.conversation_history.push(result_message.clone());
            state.empty_after_tools_continuations = 0;

            yield IterationResult::turn_boundary(result_message, turn_finish_reason);
            yield IterationResult::continuation();
        }
    };

    Box::pin(stream)
}

/// Reconcile a `Tool.result` part's `(id, name)` against the coordinator,
/// returning `Err` on a hard mismatch per the tolerant matching policy
/// (§4.5). `run_with_events` calls this for every tool result before
/// appending it to history; adapters that synthesize tool-result history
/// entries of their own should do the same.
pub fn reconcile_tool_result(
    coordinator: &mut crate::tool_id::ToolIdCoordinator,
    id: &str,
    name: &str,
) -> Result<String, CloudLlmError> {
    match coordinator.resolve(id, name) {
        (MatchOutcome::HardMismatch, _) => Err(CloudLlmError::ToolIdMismatch {
            id: id.to_string(),
            name: name.to_string(),
        }),
        (_, resolved_id) => Ok(resolved_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendStream, ModelInfo};
    use crate::part::{ChatResult, Role};
    use crate::tool::{tool_map, ToolDefinition};
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        turns: std::sync::Mutex<Vec<Vec<ChatResult>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(turns: Vec<Vec<ChatResult>>) -> Self {
            ScriptedBackend {
                turns: std::sync::Mutex::new(turns),
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
            Ok(Box::pin(stream::iter(next.into_iter().map(Ok))))
        }
    }

    fn final_chunk(finish_reason: FinishReason) -> ChatResult {
        let mut c = ChatResult::text_delta("");
        c.output = ChatMessage::new(Role::Model);
        c.finish_reason = finish_reason;
        c.usage = Some(Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        });
        c
    }

    #[tokio::test]
    async fn simple_text_completion_terminates() {
        let backend = Arc::new(ScriptedBackend::new(vec![vec![
            ChatResult::text_delta("Hello"),
            final_chunk(FinishReason::Stop),
        ]]));
        let mut stream = run(backend, vec![ChatMessage::user_text("hi")], tool_map(vec![]), None);
        let mut texts = Vec::new();
        let mut ended = false;
        while let Some(event) = stream.next().await {
            let event = event.unwrap();
            if !event.output.is_empty() {
                texts.push(event.output);
            }
            if !event.should_continue {
                ended = true;
            }
        }
        assert!(ended);
        assert_eq!(texts.join(""), "Hello");
    }

    #[tokio::test]
    async fn executes_tool_call_then_continues() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();
        let add = ToolDefinition::new_sync("add", "adds numbers", serde_json::json!({}), move |args| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            let a = args["a"].as_i64().unwrap_or(0);
            let b = args["b"].as_i64().unwrap_or(0);
            Ok(serde_json::json!(a + b))
        });

        let mut first_turn = ChatResult::text_delta("");
        first_turn.output = ChatMessage::new(Role::Model).with_part(Part::tool_call(
            "call_1",
            "add",
            serde_json::json!({"a": 2, "b": 3}),
        ));
        first_turn.finish_reason = FinishReason::ToolCalls;

        let backend = Arc::new(ScriptedBackend::new(vec![
            vec![first_turn],
            vec![ChatResult::text_delta("The answer is 5"), final_chunk(FinishReason::Stop)],
        ]));

        let mut stream = run(
            backend,
            vec![ChatMessage::user_text("what is 2+3?")],
            tool_map(vec![add]),
            None,
        );
        let mut saw_tool_result = false;
        let mut final_text = String::new();
        while let Some(event) = stream.next().await {
            let event = event.unwrap();
            for message in &event.messages {
                if message.parts.iter().any(|p| matches!(p, Part::Tool { kind: crate::part::ToolPartKind::Result, .. })) {
                    saw_tool_result = true;
                }
            }
            if !event.output.is_empty() {
                final_text.push_str(&event.output);
            }
        }
        assert!(saw_tool_result);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(final_text, "The answer is 5");
    }

    #[tokio::test]
    async fn empty_after_tools_retries_then_terminates() {
        let noop = ToolDefinition::new_sync("noop", "d", serde_json::json!({}), |_| Ok(serde_json::json!("ok")));

        let mut tool_turn = ChatResult::text_delta("");
        tool_turn.output = ChatMessage::new(Role::Model).with_part(Part::tool_call("call_1", "noop", serde_json::json!({})));
        tool_turn.finish_reason = FinishReason::ToolCalls;

        let backend = Arc::new(ScriptedBackend::new(vec![
            vec![tool_turn],
            vec![final_chunk(FinishReason::Unspecified)],
            vec![final_chunk(FinishReason::Unspecified)],
        ]));

        let mut stream = run(backend.clone(), vec![ChatMessage::user_text("do nothing")], tool_map(vec![noop]), None);
        let mut ended = false;
        while let Some(event) = stream.next().await {
            let event = event.unwrap();
            if !event.should_continue {
                ended = true;
            }
        }
        assert!(ended);
        // One empty-after-tools continuation is tolerated; the second
        // consecutive empty turn is terminal. Total backend invocations:
        // tool turn + 1st empty (retried) + 2nd empty (terminal) = 3.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn events_fire_for_tool_call_turn() {
        use crate::event::{AgentEvent, EventHandler};
        use std::sync::Mutex as StdMutex;

        struct RecordingHandler(StdMutex<Vec<String>>);

        #[async_trait]
        impl EventHandler for RecordingHandler {
            async fn on_agent_event(&self, event: &AgentEvent) {
                let label = match event {
                    AgentEvent::LlmCallStarted { .. } => "llm_call_started",
                    AgentEvent::LlmCallCompleted { .. } => "llm_call_completed",
                    AgentEvent::ToolCallDetected { .. } => "tool_call_detected",
                    AgentEvent::ToolExecutionCompleted { .. } => "tool_execution_completed",
                    AgentEvent::EmptyAfterToolsLimitReached { .. } => "empty_after_tools_limit_reached",
                    AgentEvent::SendStarted { .. } => "send_started",
                    AgentEvent::SendCompleted { .. } => "send_completed",
                };
                self.0.lock().unwrap().push(label.to_string());
            }
        }

        let add = ToolDefinition::new_sync("add", "adds numbers", serde_json::json!({}), |args| {
            let a = args["a"].as_i64().unwrap_or(0);
            let b = args["b"].as_i64().unwrap_or(0);
            Ok(serde_json::json!(a + b))
        });

        let mut first_turn = ChatResult::text_delta("");
        first_turn.output = ChatMessage::new(Role::Model).with_part(Part::tool_call(
            "call_1",
            "add",
            serde_json::json!({"a": 2, "b": 3}),
        ));
        first_turn.finish_reason = FinishReason::ToolCalls;

        let backend = Arc::new(ScriptedBackend::new(vec![
            vec![first_turn],
            vec![ChatResult::text_delta("The answer is 5"), final_chunk(FinishReason::Stop)],
        ]));

        let handler = Arc::new(RecordingHandler(StdMutex::new(Vec::new())));
        let mut stream = run_with_events(
            backend,
            vec![ChatMessage::user_text("what is 2+3?")],
            tool_map(vec![add]),
            None,
            Some(handler.clone() as Arc<dyn EventHandler>),
        );
        while let Some(event) = stream.next().await {
            event.unwrap();
        }

        let events = handler.0.lock().unwrap().clone();
        assert_eq!(events.iter().filter(|e| *e == "llm_call_started").count(), 2);
        assert_eq!(events.iter().filter(|e| *e == "llm_call_completed").count(), 2);
        assert!(events.contains(&"tool_call_detected".to_string()));
        assert!(events.contains(&"tool_execution_completed".to_string()));
    }
}
