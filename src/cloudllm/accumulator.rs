//! Message Accumulator.
//!
//! Folds chunk-level deltas into one consolidated [`ChatMessage`] per turn.
//! Pure and total: no I/O, and malformed input (partial JSON that never
//! closes) degrades to a documented fallback rather than an error.

use crate::part::{ChatMessage, Metadata, Part, Role, ToolPartKind};
use std::collections::HashMap;

/// Working state for one in-progress assistant turn.
///
/// Distinct from the final `ChatMessage` because tool-call arguments arrive
/// as partial JSON strings that are only parsed at [`Accumulator::consolidate`].
#[derive(Debug, Default)]
pub struct Accumulator {
    text: String,
    data_and_link_parts: Vec<Part>,
    /// Call slots in first-seen order: `(id, name, argument_buffer)`.
    call_slots: Vec<ToolCallSlot>,
    /// Maps a call's `id`, or its provider slot index stringified, to its
    /// position in `call_slots`.
    slot_index: HashMap<String, usize>,
    metadata: Metadata,
    thinking: String,
}

#[derive(Debug, Clone)]
struct ToolCallSlot {
    id: String,
    name: String,
    argument_buffer: String,
}

impl Accumulator {
    /// A fresh accumulator for a new turn.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk's delta message into the accumulator.
    pub fn accumulate(&mut self, delta: &ChatMessage) {
        for part in &delta.parts {
            match part {
                Part::Text { text } => self.text.push_str(text),
                Part::Data { .. } | Part::Link { .. } => {
                    self.data_and_link_parts.push(part.clone());
                }
                Part::Tool {
                    kind: ToolPartKind::Call,
                    id,
                    name,
                    arguments,
                    ..
                } => {
                    let slot_key = id.clone();
                    let idx = *self.slot_index.entry(slot_key).or_insert_with(|| {
                        self.call_slots.push(ToolCallSlot {
                            id: id.clone(),
                            name: name.clone(),
                            argument_buffer: String::new(),
                        });
                        self.call_slots.len() - 1
                    });
                    let slot = &mut self.call_slots[idx];
                    if !name.is_empty() {
                        slot.name = name.clone();
                    }
                    if let Some(args) = arguments {
                        if let Some(s) = args.as_str() {
                            // Adapters stream partial JSON as raw strings
                            // wrapped in a JSON string value.
                            slot.argument_buffer.push_str(s);
                        } else {
                            // A fully-formed arguments object arrived in one
                            // delta; replace rather than append.
                            slot.argument_buffer = args.to_string();
                        }
                    }
                }
                Part::Tool { kind: ToolPartKind::Result, .. } => {
                    // Tool results never arrive as part of a streamed model
                    // delta; ignore defensively rather than panicking.
                }
            }
        }
        merge_metadata(&mut self.metadata, &delta.metadata);
    }

    /// Append provider "thinking"/reasoning text for this turn.
    pub fn accumulate_thinking(&mut self, text: &str) {
        self.thinking.push_str(text);
    }

    /// Fold all buffered state into one final `ChatMessage`. Consecutive
    /// text deltas coalesce into a single `Text` part; tool-call argument
    /// buffers are parsed (malformed JSON falls back to `{}`).
    pub fn consolidate(mut self) -> ChatMessage {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(Part::text(self.text.clone()));
        }
        parts.extend(self.data_and_link_parts.drain(..));
        for slot in &self.call_slots {
            let arguments = if slot.argument_buffer.trim().is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_str(&slot.argument_buffer)
                    .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
            };
            parts.push(Part::tool_call(slot.id.clone(), slot.name.clone(), arguments));
        }

        if !self.thinking.is_empty() {
            self.metadata
                .insert("thinking".to_string(), serde_json::Value::String(self.thinking.clone()));
        }

        ChatMessage {
            role: Role::Model,
            parts,
            metadata: self.metadata,
        }
    }
}

/// Scalar-overwrite, list-concatenate metadata merge (§4.4, open question
/// resolved in SPEC_FULL.md §9).
pub fn merge_metadata(into: &mut Metadata, delta: &Metadata) {
    for (key, value) in delta {
        match (into.get_mut(key), value) {
            (Some(serde_json::Value::Array(existing)), serde_json::Value::Array(new_items)) => {
                existing.extend(new_items.clone());
            }
            _ => {
                into.insert(key.clone(), value.clone());
            }
        }
    }
}
