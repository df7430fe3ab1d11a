//! Built-in tools (§10.5).
//!
//! `calculator_tool` is the one concrete, runnable [`ToolDefinition`] this
//! crate ships, built on the standalone scientific calculator implementation
//! below it in this module.
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudllm::agent::Agent;
//! use cloudllm::backend::BackendSettings;
//! use cloudllm::tools::calculator_tool;
//!
//! # async {
//! let agent = Agent::from_model_string("openai:gpt-4.1", BackendSettings::default())
//!     .unwrap()
//!     .with_tools(vec![calculator_tool()]);
//! # };
//! ```

pub mod calculator;

pub use calculator::{Calculator, CalculatorError, CalculatorResult};

use crate::tool::ToolDefinition;
use std::sync::Arc;

/// Wrap a [`Calculator`] as a tool callable under the name `calculator`.
pub fn calculator_tool() -> ToolDefinition {
    let calc = Arc::new(Calculator::new());
    ToolDefinition {
        name: "calculator".to_string(),
        description: "Evaluate a scientific math expression (arithmetic, trig, logs, basic stats) and return its numeric result.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {"type": "string", "description": "The math expression to evaluate, e.g. \"2 + 2 * 3\" or \"mean([1,2,3])\"."}
            },
            "required": ["expression"]
        }),
        on_call: Arc::new(move |args| {
            let calc = calc.clone();
            Box::pin(async move {
                let expression = args
                    .get("expression")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| "missing required argument \"expression\"".to_string())?;
                calc.evaluate(expression)
                    .await
                    .map(|value| serde_json::json!({"result": value}))
                    .map_err(|e| e.to_string())
            })
        }),
    }
}
