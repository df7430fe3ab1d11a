//! Tagged-variant message data model.
//!
//! Every piece of conversation content — text, binary media, external links,
//! tool calls, and tool results — is a [`Part`]. Providers' wildly different
//! wire shapes all fold down into this one enum so the rest of the crate
//! (accumulator, executor, adapters) dispatches by pattern match instead of
//! trait-object downcasting.
//!
//! # Example
//!
//! ```rust
//! use cloudllm::part::{ChatMessage, Part, Role};
//! use serde_json::json;
//!
//! let msg = ChatMessage::new(Role::Model).with_part(Part::Text {
//!     text: "Team Meeting at 11am".to_string(),
//! });
//! assert!(matches!(msg.parts[0], Part::Text { .. }));
//! # let _ = json!({});
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One piece of message content.
///
/// `Tool` collapses what would otherwise be two classes (`ToolCall`,
/// `ToolResult`) into a single variant discriminated by `kind`, matching the
/// data model's own invariant that a call and its result are "two variants
/// of the same part kind; paired by `id`".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "partKind", rename_all = "camelCase")]
pub enum Part {
    /// Plain text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Inline binary data (image, generated file, audio).
    Data {
        /// Raw bytes. Must be non-empty.
        bytes: Vec<u8>,
        /// MIME type, e.g. `"image/png"`. Must be non-empty.
        mime_type: String,
        /// Optional display name / filename.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// An external reference (URL) rather than inline bytes.
    Link {
        /// The referenced URL.
        url: String,
        /// Optional MIME type hint for the linked resource.
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    /// A tool call or tool result, discriminated by `kind`.
    Tool {
        /// Which half of the call/result pair this is.
        kind: ToolPartKind,
        /// Stable id correlating a call with its eventual result.
        id: String,
        /// Tool name.
        name: String,
        /// Present on `kind == Call`: the (possibly still-accumulating)
        /// structured arguments.
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<serde_json::Value>,
        /// Present on `kind == Result`: the tool's return value.
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },
}

impl Part {
    /// Construct a `Text` part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Construct a `Tool.call` part.
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Part::Tool {
            kind: ToolPartKind::Call,
            id: id.into(),
            name: name.into(),
            arguments: Some(arguments),
            result: None,
        }
    }

    /// Construct a `Tool.result` part.
    pub fn tool_result(id: impl Into<String>, name: impl Into<String>, result: serde_json::Value) -> Self {
        Part::Tool {
            kind: ToolPartKind::Result,
            id: id.into(),
            name: name.into(),
            arguments: None,
            result: Some(result),
        }
    }

    /// `true` if this part is `Text` with non-empty content.
    pub fn is_nonempty_text(&self) -> bool {
        matches!(self, Part::Text { text } if !text.is_empty())
    }

    /// Returns the tool call/result id, if this is a `Tool` part.
    pub fn tool_id(&self) -> Option<&str> {
        match self {
            Part::Tool { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Discriminant distinguishing the two halves of a tool interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolPartKind {
    /// The model is requesting a tool invocation.
    Call,
    /// A tool's result, delivered back to the model.
    Result,
}

/// Who authored a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that prime or constrain the model. At most one per
    /// conversation, at the head of history.
    System,
    /// Human input, and the carrier role for tool results — a dedicated
    /// `tool` role is not assumed, since some backends reject it.
    User,
    /// Assistant output: text, tool calls, data parts, thinking metadata.
    Model,
}

/// Why a turn's backend stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinishReason {
    /// The adapter has not reported a reason yet (mid-stream).
    Unspecified,
    /// The model completed naturally.
    Stop,
    /// The model hit its output token budget.
    Length,
    /// The model stopped to request tool calls.
    ToolCalls,
    /// Provider content filtering truncated the response.
    ContentFilter,
    /// The model refused due to recitation/citation policy.
    Recitation,
}

/// A metadata map: `string -> any`. Shared by [`ChatMessage`] and
/// [`crate::orchestrator::IterationResult`].
pub type Metadata = HashMap<String, serde_json::Value>;

/// A complete message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: Role,
    /// Ordered content parts.
    pub parts: Vec<Part>,
    /// Free-form metadata (provider event data, thinking, etc.).
    #[serde(default)]
    pub metadata: Metadata,
}

impl ChatMessage {
    /// Create an empty message with the given role.
    pub fn new(role: Role) -> Self {
        ChatMessage {
            role,
            parts: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Convenience constructor for a single-`Text`-part user message.
    pub fn user_text(text: impl Into<String>) -> Self {
        ChatMessage::new(Role::User).with_part(Part::text(text))
    }

    /// Convenience constructor for a single-`Text`-part system message.
    pub fn system_text(text: impl Into<String>) -> Self {
        ChatMessage::new(Role::System).with_part(Part::text(text))
    }

    /// Builder-style part append.
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Concatenation of all `Text` parts, in order, with no separator
    /// (consecutive text deltas are expected to already be coalesced).
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All `Tool.call` parts in this message, in order.
    pub fn tool_calls(&self) -> Vec<&Part> {
        self.parts
            .iter()
            .filter(|p| matches!(p, Part::Tool { kind: ToolPartKind::Call, .. }))
            .collect()
    }

    /// `true` if this message carries zero parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// One streamed event from a [`crate::backend::ChatBackend`].
///
/// `output.parts` is the *delta* for this chunk; `messages`, when non-empty,
/// carries fully-formed turn boundaries for adapters that emit content
/// out-of-band rather than incrementally.
#[derive(Debug, Clone)]
pub struct ChatResult {
    /// Optional provider-assigned id for this chunk/turn.
    pub id: Option<String>,
    /// Incremental content for the in-progress assistant message.
    pub output: ChatMessage,
    /// Fully-formed messages, when the adapter produces them out-of-band.
    pub messages: Vec<ChatMessage>,
    /// Provider "thinking"/reasoning text surfaced out-of-band, if any.
    pub thinking: Option<String>,
    /// Why the stream is stopping, or `Unspecified` mid-stream.
    pub finish_reason: FinishReason,
    /// Chunk-level metadata (merged into the consolidated message).
    pub metadata: Metadata,
    /// Token usage; populated only on the final chunk of a turn.
    pub usage: Option<Usage>,
}

impl ChatResult {
    /// A chunk carrying only a text delta; all other fields default.
    pub fn text_delta(text: impl Into<String>) -> Self {
        ChatResult {
            id: None,
            output: ChatMessage::new(Role::Model).with_part(Part::text(text)),
            messages: Vec::new(),
            thinking: None,
            finish_reason: FinishReason::Unspecified,
            metadata: Metadata::new(),
            usage: None,
        }
    }
}

/// Prompt/completion token accounting for one turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt/input tokens billed by the provider.
    pub input_tokens: u64,
    /// Generated/output tokens billed by the provider.
    pub output_tokens: u64,
    /// `input_tokens + output_tokens`.
    pub total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_concatenates_in_order() {
        let msg = ChatMessage::new(Role::Model)
            .with_part(Part::text("Hello, "))
            .with_part(Part::text("world"));
        assert_eq!(msg.text(), "Hello, world");
    }

    #[test]
    fn tool_calls_filters_by_kind() {
        let msg = ChatMessage::new(Role::Model)
            .with_part(Part::tool_call("1", "weather", serde_json::json!({"city": "Paris"})))
            .with_part(Part::text("thinking out loud"));
        assert_eq!(msg.tool_calls().len(), 1);
    }

    #[test]
    fn is_nonempty_text() {
        assert!(Part::text("x").is_nonempty_text());
        assert!(!Part::text("").is_nonempty_text());
        assert!(!Part::tool_call("1", "t", serde_json::json!({})).is_nonempty_text());
    }
}
