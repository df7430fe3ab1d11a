//! Error taxonomy for the agent runtime.
//!
//! Mirrors the donor crate's hand-written error enums (`ToolError`,
//! `OrchestrationError`) rather than reaching for an exception hierarchy:
//! one flat enum, one variant per failure kind, `Display` + `std::error::Error`
//! implemented by hand.

use std::error::Error as StdError;
use std::fmt;

/// Every failure kind the orchestrator and its collaborators can surface.
///
/// `Adapter*` and `ToolIdMismatch` / `SchemaUnsupported` are fatal to the
/// current `run()` invocation, while `ToolFailure` / `ToolUnknown` /
/// `ToolArgumentMalformed` are folded into a `Tool.result` part and the loop
/// continues.
#[derive(Debug)]
pub enum CloudLlmError {
    /// Network failure, HTTP 5xx, or a malformed SSE/event stream.
    AdapterTransport(String),
    /// 401/403 from the backend; not recoverable without reconfiguration.
    AdapterAuth(String),
    /// Backend returned a payload the adapter could not parse into `ChatResult`.
    AdapterProtocol(String),
    /// A tool's `on_call` returned an error or timed out.
    ToolFailure { tool_name: String, message: String },
    /// The model requested a tool name absent from the tool map.
    ToolUnknown { tool_name: String },
    /// A tool call's streamed JSON arguments failed to parse.
    ToolArgumentMalformed { tool_name: String, raw: String },
    /// A `Tool.result` part's id matched no registered call, even after
    /// tolerant name-based matching.
    ToolIdMismatch { id: String, name: String },
    /// Typed output was requested but the adapter rejected it and no
    /// `return_result` fallback was installed.
    SchemaUnsupported(String),
    /// The caller's cancellation token fired.
    Cancelled,
}

impl fmt::Display for CloudLlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudLlmError::AdapterTransport(msg) => write!(f, "adapter transport error: {msg}"),
            CloudLlmError::AdapterAuth(msg) => write!(f, "adapter auth error: {msg}"),
            CloudLlmError::AdapterProtocol(msg) => write!(f, "adapter protocol error: {msg}"),
            CloudLlmError::ToolFailure { tool_name, message } => {
                write!(f, "tool '{tool_name}' failed: {message}")
            }
            CloudLlmError::ToolUnknown { tool_name } => {
                write!(f, "unknown tool requested: '{tool_name}'")
            }
            CloudLlmError::ToolArgumentMalformed { tool_name, raw } => write!(
                f,
                "malformed arguments for tool '{tool_name}': {raw}"
            ),
            CloudLlmError::ToolIdMismatch { id, name } => write!(
                f,
                "tool result id '{id}' (name '{name}') matches no registered call"
            ),
            CloudLlmError::SchemaUnsupported(msg) => write!(f, "schema unsupported: {msg}"),
            CloudLlmError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl StdError for CloudLlmError {}

impl From<Box<dyn StdError + Send + Sync>> for CloudLlmError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        CloudLlmError::AdapterTransport(err.to_string())
    }
}
