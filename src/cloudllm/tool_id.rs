//! Tool-ID Coordinator.
//!
//! Harmonizes tool-call identity across providers with divergent ID
//! conventions: some emit a stable opaque id per call, some only a
//! per-block index, some nothing at all. The coordinator is the single
//! place that decides whether a `Tool.result` part can be matched back to
//! the `Tool.call` that produced it.

use crate::part::Part;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

/// A registered tool call, as seen by the coordinator.
#[derive(Debug, Clone)]
struct RegisteredCall {
    name: String,
    #[allow(dead_code)]
    arguments: serde_json::Value,
    resolved: bool,
}

/// Outcome of [`ToolIdCoordinator::validate_tool_result_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The result id exactly matches a registered, unresolved call.
    ExactMatch,
    /// No exact match; resolved by falling back to the most recent
    /// unresolved call with the same `name`.
    ToleratedByName,
    /// No call with that name exists at all — a fatal mismatch.
    HardMismatch,
}

/// Registers tool calls and validates/synthesizes ids for the duration of
/// one conversation. Cleared between conversations via [`Self::clear`].
#[derive(Debug, Default)]
pub struct ToolIdCoordinator {
    calls: HashMap<String, RegisteredCall>,
    /// Per-name queue of unresolved call ids, oldest first, used for the
    /// tolerant by-name matching policy.
    unresolved_by_name: HashMap<String, VecDeque<String>>,
}

impl ToolIdCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool call so a later result can be matched against it.
    pub fn register_tool_call(&mut self, id: &str, name: &str, arguments: serde_json::Value) {
        self.calls.insert(
            id.to_string(),
            RegisteredCall {
                name: name.to_string(),
                arguments,
                resolved: false,
            },
        );
        self.unresolved_by_name
            .entry(name.to_string())
            .or_default()
            .push_back(id.to_string());
    }

    /// Register every `Tool.call` part found in `parts`, in order.
    pub fn register_all(&mut self, parts: &[Part]) {
        for part in parts {
            if let Part::Tool {
                kind: crate::part::ToolPartKind::Call,
                id,
                name,
                arguments,
                ..
            } = part
            {
                self.register_tool_call(id, name, arguments.clone().unwrap_or(serde_json::Value::Null));
            }
        }
    }

    /// `true` iff a call with this exact id is registered and unresolved.
    pub fn validate_tool_result_id(&self, id: &str) -> bool {
        self.calls
            .get(id)
            .map(|c| !c.resolved)
            .unwrap_or(false)
    }

    /// Resolve a result id against the tolerant matching policy described in
    /// the coordinator's contract: exact match first, then fall back to the
    /// oldest unresolved call sharing `name`, then a hard mismatch.
    ///
    /// On `ToleratedByName`, the returned id is the *actual* call id the
    /// result should be attached to (which may differ from the `id` the
    /// caller passed in).
    pub fn resolve(&mut self, id: &str, name: &str) -> (MatchOutcome, String) {
        if self.validate_tool_result_id(id) {
            if let Some(call) = self.calls.get_mut(id) {
                call.resolved = true;
            }
            Self::remove_from_queue(&mut self.unresolved_by_name, name, id);
            return (MatchOutcome::ExactMatch, id.to_string());
        }

        if let Some(queue) = self.unresolved_by_name.get_mut(name) {
            if let Some(fallback_id) = queue.pop_front() {
                if let Some(call) = self.calls.get_mut(&fallback_id) {
                    call.resolved = true;
                }
                if log::log_enabled!(log::Level::Warn) {
                    log::warn!(
                        "tool result id '{id}' unregistered; tolerantly matched to call '{fallback_id}' by name '{name}'"
                    );
                }
                return (MatchOutcome::ToleratedByName, fallback_id);
            }
        }

        (MatchOutcome::HardMismatch, id.to_string())
    }

    fn remove_from_queue(map: &mut HashMap<String, VecDeque<String>>, name: &str, id: &str) {
        if let Some(queue) = map.get_mut(name) {
            queue.retain(|existing| existing != id);
        }
    }

    /// Deterministic call-id generator, used when an adapter observes a
    /// tool call without a provider-assigned id. Same inputs within a
    /// process always yield the same id.
    pub fn generate_tool_call_id(
        tool_name: &str,
        provider_hint: &str,
        arguments: &serde_json::Value,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tool_name.as_bytes());
        hasher.update(b"\0");
        hasher.update(provider_hint.as_bytes());
        hasher.update(b"\0");
        hasher.update(arguments.to_string().as_bytes());
        let digest = hasher.finalize();
        let hex = format!("{:x}", digest);
        format!("call_{}", &hex[..20])
    }

    /// Reset all state between conversations.
    pub fn clear(&mut self) {
        self.calls.clear();
        self.unresolved_by_name.clear();
    }
}
