//! Tool definitions and the batch executor.
//!
//! A [`ToolDefinition`] is the minimal external contract (§6.3): a name, a
//! description, a JSON-Schema input shape, and an async callback. The
//! [`execute_batch`] function is the Tool Executor (§4.6): it resolves each
//! call by name, invokes it with a timeout, and always returns result parts
//! in the same order as the input calls regardless of completion order.

use crate::part::Part;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A tool's async callback. Boxed to allow both closures and function
/// pointers.
pub type ToolCallback = Arc<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, String>> + Send>>
        + Send
        + Sync,
>;

/// `{name, description, inputSchema, onCall}` (§3.4 / §6.3).
#[derive(Clone)]
pub struct ToolDefinition {
    /// Unique name (per agent) under which the model invokes this tool.
    pub name: String,
    /// Human-readable description surfaced to the model.
    pub description: String,
    /// JSON-Schema object describing accepted arguments.
    pub input_schema: serde_json::Value,
    /// Async callback invoked with the parsed arguments.
    pub on_call: ToolCallback,
}

impl ToolDefinition {
    /// Build a tool from a synchronous closure, wrapping it to satisfy the
    /// async `on_call` contract.
    pub fn new_sync<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        f: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Result<serde_json::Value, String> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        ToolDefinition {
            name: name.into(),
            description: description.into(),
            input_schema,
            on_call: Arc::new(move |args| {
                let f = f.clone();
                Box::pin(async move { f(args) })
            }),
        }
    }
}

/// name → tool lookup used by the orchestrator and executor.
pub type ToolMap = HashMap<String, ToolDefinition>;

/// Build a `ToolMap` from a list of definitions.
pub fn tool_map(tools: Vec<ToolDefinition>) -> ToolMap {
    tools.into_iter().map(|t| (t.name.clone(), t)).collect()
}

/// Outcome of executing one call.
pub struct ToolExecutionResult {
    /// The original `Tool.call` part.
    pub tool_part: Part,
    /// The resulting `Tool.result` part.
    pub result_part: Part,
    /// Whether the tool invocation succeeded.
    pub is_success: bool,
}

/// Default per-call timeout. Callers needing a different budget should wrap
/// individual tool callbacks with their own timeout instead; this bound
/// exists to keep a single misbehaving tool from hanging a whole batch.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Execute a batch of `Tool.call` parts concurrently, returning results in
/// the same order as `calls` regardless of completion order.
pub async fn execute_batch(calls: &[Part], tool_map: &ToolMap) -> Vec<ToolExecutionResult> {
    let futures = calls.iter().map(|call| execute_one(call, tool_map));
    join_all(futures).await
}

async fn execute_one(call: &Part, tool_map: &ToolMap) -> ToolExecutionResult {
    let (id, name, arguments) = match call {
        Part::Tool {
            id,
            name,
            arguments,
            ..
        } => (id.clone(), name.clone(), arguments.clone().unwrap_or(serde_json::Value::Null)),
        _ => unreachable!("execute_batch called with a non-tool part"),
    };

    let Some(tool) = tool_map.get(&name) else {
        let payload = serde_json::json!({"error": "unknown_tool", "name": name});
        return ToolExecutionResult {
            tool_part: call.clone(),
            result_part: Part::tool_result(id, name, payload),
            is_success: false,
        };
    };

    let invocation = (tool.on_call)(arguments);
    let outcome = tokio::time::timeout(DEFAULT_TOOL_TIMEOUT, invocation).await;

    let (is_success, payload) = match outcome {
        Ok(Ok(value)) => (true, serialize_result(value)),
        Ok(Err(message)) => (false, serde_json::json!({"error": message})),
        Err(_) => (false, serde_json::json!({"error": "tool timed out"})),
    };

    ToolExecutionResult {
        tool_part: call.clone(),
        result_part: Part::tool_result(id, name, payload),
        is_success,
    }
}

fn serialize_result(value: serde_json::Value) -> serde_json::Value {
    // Already a string: pass through. Map/list/number/bool: canonical JSON.
    value
}
