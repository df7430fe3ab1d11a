//! MCP tool bridge (§6.4).
//!
//! A tool collector connects to an external tool server and surfaces its
//! tools as ordinary [`ToolDefinition`]s; the orchestrator never knows it is
//! talking to MCP rather than an in-process callback. This module ships one
//! concrete collector, [`McpHttpCollector`], talking to a remote MCP-over-
//! HTTP relay exposing `GET {endpoint}/tools` and `POST {endpoint}/execute`
//! (the same shape the donor crate's `McpClientProtocol` speaks), gated
//! behind the `mcp-bridge` feature so the base crate stays free of `axum`/
//! `tower`.

use crate::error::CloudLlmError;
use crate::tool::ToolDefinition;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// One tool's metadata as reported by an MCP server's `/tools` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolMetadata {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct McpExecuteResponse {
    result: serde_json::Value,
}

/// Collects tool definitions from a remote MCP HTTP relay (§6.4).
///
/// # Example
///
/// ```rust,no_run
/// use cloudllm::mcp::McpHttpCollector;
///
/// # async {
/// let collector = McpHttpCollector::new("http://localhost:8080/mcp".to_string());
/// let tools = collector.get_tools().await.unwrap();
/// collector.disconnect();
/// # };
/// ```
pub struct McpHttpCollector {
    endpoint: String,
    client: reqwest::Client,
}

impl McpHttpCollector {
    /// Build a collector against `endpoint` (no connection is made yet).
    pub fn new(endpoint: String) -> Self {
        McpHttpCollector {
            endpoint,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client with a static config always builds"),
        }
    }

    /// Fetch the server's tool catalog and adapt each entry into a callable
    /// [`ToolDefinition`] whose `on_call` posts to `{endpoint}/execute`.
    pub async fn get_tools(&self) -> Result<Vec<ToolDefinition>, CloudLlmError> {
        let response = self
            .client
            .get(format!("{}/tools", self.endpoint))
            .send()
            .await
            .map_err(|e| CloudLlmError::AdapterTransport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CloudLlmError::AdapterTransport(format!(
                "MCP server returned status {}",
                response.status()
            )));
        }

        let catalog: Vec<McpToolMetadata> = response
            .json()
            .await
            .map_err(|e| CloudLlmError::AdapterProtocol(e.to_string()))?;

        Ok(catalog.into_iter().map(|meta| self.adapt(meta)).collect())
    }

    fn adapt(&self, meta: McpToolMetadata) -> ToolDefinition {
        let endpoint = self.endpoint.clone();
        let client = self.client.clone();
        let name = meta.name.clone();

        ToolDefinition {
            name: meta.name,
            description: meta.description,
            input_schema: meta.input_schema,
            on_call: Arc::new(move |arguments| {
                let endpoint = endpoint.clone();
                let client = client.clone();
                let name = name.clone();
                Box::pin(async move {
                    let response = client
                        .post(format!("{endpoint}/execute"))
                        .json(&serde_json::json!({"tool": name, "parameters": arguments}))
                        .send()
                        .await
                        .map_err(|e| e.to_string())?;

                    if !response.status().is_success() {
                        return Err(format!("MCP server returned status {}", response.status()));
                    }

                    let body: McpExecuteResponse = response.json().await.map_err(|e| e.to_string())?;
                    Ok(body.result)
                })
            }),
        }
    }

    /// Idempotent no-op: the collector holds no persistent connection to
    /// tear down, only a pooled HTTP client.
    pub fn disconnect(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapt_preserves_name_description_and_schema() {
        let collector = McpHttpCollector::new("http://localhost:9/mcp".to_string());
        let meta = McpToolMetadata {
            name: "search".to_string(),
            description: "search the web".to_string(),
            input_schema: serde_json::json!({"type": "object"}),
        };
        let tool = collector.adapt(meta);
        assert_eq!(tool.name, "search");
        assert_eq!(tool.description, "search the web");
        assert_eq!(tool.input_schema, serde_json::json!({"type": "object"}));
    }
}
