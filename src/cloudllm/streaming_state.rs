//! Per-invocation Streaming State (§4.2).
//!
//! One [`StreamingState`] is created per call to `Agent::send`/`send_stream`
//! and lives only for that call's duration. It is the orchestrator's working
//! memory across chunks and turns: conversation history so far, the tool map
//! for this call, the in-progress accumulated message, the tool-id
//! coordinator, and the handful of flags needed to implement the
//! empty-after-tools retry policy and the typed-output suppression mode.

use crate::accumulator::Accumulator;
use crate::part::{ChatMessage, ChatResult, Metadata, Part};
use crate::tool::ToolMap;
use crate::tool_id::ToolIdCoordinator;

/// Working state for one in-progress `send`/`send_stream` invocation.
pub struct StreamingState {
    /// Full conversation so far, including the user's latest message and
    /// every completed assistant/tool-result turn produced during this call.
    pub conversation_history: Vec<ChatMessage>,
    /// Tools available to the model for this call.
    pub tool_map: ToolMap,
    /// In-progress assistant message for the current turn.
    pub accumulated_message: Accumulator,
    /// The most recent `ChatResult` chunk observed, kept for inspecting
    /// `finish_reason`/`usage` after the stream for this turn ends.
    pub last_result: Option<ChatResult>,
    /// Call-id bookkeeping, shared across every turn of this invocation.
    pub tool_id_coordinator: ToolIdCoordinator,
    /// Metadata suppressed from caller-visible output (typed-output mode).
    pub suppressed_metadata: Metadata,
    /// Text parts suppressed from caller-visible output (typed-output mode).
    pub suppressed_text_parts: Vec<Part>,
    /// Count of consecutive turns that produced no text and no tool calls
    /// after at least one tool call has been made. Bounds the
    /// empty-after-tools retry policy (§4.3 edge case).
    pub empty_after_tools_continuations: usize,
    /// Whether the next appended chunk should be treated as a fresh
    /// turn boundary rather than a continuation of the current one.
    pub should_prefix_next_message: bool,
    /// `true` until the first chunk of the current message has arrived.
    pub is_first_chunk_of_message: bool,
    /// Set once the orchestrator has decided the invocation is finished.
    pub done: bool,
}

/// Turns tolerated with no text and no tool calls after tool use has begun,
/// before the orchestrator gives up and ends the turn anyway (§4.3). The
/// specification's bounded variant allows exactly one empty continuation;
/// the second consecutive empty turn is terminal.
pub const MAX_EMPTY_AFTER_TOOLS_CONTINUATIONS: usize = 1;

impl StreamingState {
    /// Start a new invocation against the given history and tool set.
    pub fn new(conversation_history: Vec<ChatMessage>, tool_map: ToolMap) -> Self {
        StreamingState {
            conversation_history,
            tool_map,
            accumulated_message: Accumulator::new(),
            last_result: None,
            tool_id_coordinator: ToolIdCoordinator::new(),
            suppressed_metadata: Metadata::new(),
            suppressed_text_parts: Vec::new(),
            empty_after_tools_continuations: 0,
            should_prefix_next_message: false,
            is_first_chunk_of_message: true,
            done: false,
        }
    }

    /// Fold one streamed chunk into the current turn's accumulator.
    pub fn ingest_chunk(&mut self, chunk: &ChatResult) {
        if self.is_first_chunk_of_message {
            self.is_first_chunk_of_message = false;
        }
        self.accumulated_message.accumulate(&chunk.output);
        if let Some(thinking) = &chunk.thinking {
            self.accumulated_message.accumulate_thinking(thinking);
        }
        self.last_result = Some(chunk.clone());
    }

    /// Whether a consolidated turn counts as empty for the purposes of the
    /// empty-after-tools retry policy (§4.3). Equivalent to
    /// [`ChatMessage::is_empty`] (no parts at all, so a `Data`/`Link`-only
    /// turn is not empty); kept here so the orchestrator and its tests share
    /// one definition rather than re-deriving it inline.
    pub fn is_empty_after_tools(&self, turn: &ChatMessage) -> bool {
        turn.is_empty()
    }

    /// Record one more empty-after-tools continuation; returns `true` if the
    /// bound has been exceeded and the orchestrator should stop retrying.
    pub fn record_empty_after_tools_continuation(&mut self) -> bool {
        self.empty_after_tools_continuations += 1;
        self.empty_after_tools_continuations > MAX_EMPTY_AFTER_TOOLS_CONTINUATIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::Role;
    use crate::tool::tool_map;

    #[test]
    fn ingest_chunk_accumulates_text() {
        let mut state = StreamingState::new(vec![ChatMessage::user_text("hi")], tool_map(vec![]));
        state.ingest_chunk(&ChatResult::text_delta("Hello"));
        state.ingest_chunk(&ChatResult::text_delta(", world"));
        let turn = std::mem::replace(&mut state.accumulated_message, Accumulator::new()).consolidate();
        assert_eq!(turn.text(), "Hello, world");
    }

    #[test]
    fn empty_after_tools_detection() {
        let state = StreamingState::new(vec![], tool_map(vec![]));
        let empty = ChatMessage::new(Role::Model);
        assert!(state.is_empty_after_tools(&empty));
        let with_text = ChatMessage::new(Role::Model).with_part(Part::text("done"));
        assert!(!state.is_empty_after_tools(&with_text));
    }

    #[test]
    fn data_only_turn_is_not_empty_after_tools() {
        let state = StreamingState::new(vec![], tool_map(vec![]));
        let data_only = ChatMessage::new(Role::Model).with_part(Part::Data {
            bytes: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
            name: None,
        });
        assert!(!state.is_empty_after_tools(&data_only));
    }

    #[test]
    fn empty_after_tools_continuation_bound() {
        let mut state = StreamingState::new(vec![], tool_map(vec![]));
        assert!(!state.record_empty_after_tools_continuation());
        assert!(state.record_empty_after_tools_continuation());
    }
}
