//! Turn-loop observability.
//!
//! A callback-based event layer so callers can log or trace an agent's
//! activity without threading extra state through `run`. Implement
//! [`EventHandler`] and register it on an [`crate::agent::Agent`]; both
//! methods default to no-ops, so a handler only needs to override what it
//! cares about.
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudllm::event::{AgentEvent, EventHandler};
//! use async_trait::async_trait;
//!
//! struct MyHandler;
//!
//! #[async_trait]
//! impl EventHandler for MyHandler {
//!     async fn on_agent_event(&self, event: &AgentEvent) {
//!         match event {
//!             AgentEvent::LlmCallStarted { backend_name, .. } => {
//!                 println!("calling {backend_name}...");
//!             }
//!             AgentEvent::ToolCallDetected { tool_name, .. } => {
//!                 println!("tool call: {tool_name}");
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```

use crate::part::Usage;
use async_trait::async_trait;

/// Events emitted from within [`crate::agent::Agent::send`] /
/// [`crate::agent::Agent::send_stream`] as the turn loop progresses.
///
/// # Event flow (one call with one round of tool use)
///
/// ```text
/// SendStarted
///   └─ LlmCallStarted
///   └─ LlmCallCompleted
///   └─ ToolCallDetected        (per call)
///   └─ ToolExecutionCompleted  (per call)
///   └─ LlmCallStarted
///   └─ LlmCallCompleted
/// SendCompleted
/// ```
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Fired once at the start of `send`/`send_stream`.
    SendStarted {
        /// Number of messages in the history handed to the backend.
        history_len: usize,
    },
    /// Fired once the turn loop has no further work to do.
    SendCompleted {
        /// Number of backend round-trips the call took.
        iterations: usize,
        /// Token usage for the final turn, if the backend reported it.
        usage: Option<Usage>,
    },
    /// Fired before opening a backend stream for one turn.
    LlmCallStarted {
        /// Adapter name the call is routed to.
        backend_name: String,
        /// 1-based turn counter within this `send` call.
        iteration: usize,
    },
    /// Fired once a turn's stream has closed and been consolidated.
    LlmCallCompleted {
        /// Adapter name the call was routed to.
        backend_name: String,
        /// 1-based turn counter within this `send` call.
        iteration: usize,
        /// Length, in UTF-8 bytes, of the turn's consolidated text.
        response_len: usize,
    },
    /// Fired once per `Tool.call` part extracted from a consolidated
    /// message, before execution.
    ToolCallDetected {
        /// The tool's registered name.
        tool_name: String,
        /// The call's coordinator id.
        call_id: String,
    },
    /// Fired once per tool call after execution completes.
    ToolExecutionCompleted {
        /// The tool's registered name.
        tool_name: String,
        /// The call's coordinator id.
        call_id: String,
        /// `false` if the tool returned an error or timed out.
        is_success: bool,
    },
    /// Fired when the empty-after-tools retry bound (§4.3) is hit and the
    /// loop terminates rather than retrying again.
    EmptyAfterToolsLimitReached {
        /// How many consecutive empty continuations were observed.
        continuations: usize,
    },
}

/// Receives [`AgentEvent`]s from an [`crate::agent::Agent`]. Both methods
/// default to no-ops; override only what you need.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for every event emitted during a `send`/`send_stream` call.
    async fn on_agent_event(&self, _event: &AgentEvent) {}
}
