//! Public agent API (§6.1).
//!
//! [`Agent`] is the crate's top-level entry point: construct one against a
//! registered backend (or an `Arc<dyn ChatBackend>` directly), then call
//! [`Agent::send`] or [`Agent::send_stream`] to drive the turn loop in
//! `orchestrator`/`typed_output` to completion. Everything below `Agent` —
//! accumulation, tool-id coordination, the turn state machine — is an
//! implementation detail a caller never touches directly.
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudllm::agent::Agent;
//! use cloudllm::backend::BackendSettings;
//!
//! # async {
//! let mut settings = BackendSettings::default();
//! settings.api_key = Some("sk-...".to_string());
//! let agent = Agent::from_model_string("openai:gpt-4.1", settings).unwrap();
//! let result = agent.send("What's 2 + 2?", None, None).await.unwrap();
//! println!("{}", result.output);
//! # };
//! ```

use crate::backend::{self, BackendSettings, ChatBackend, ModelInfo};
use crate::error::CloudLlmError;
use crate::event::{AgentEvent, EventHandler};
use crate::orchestrator::{self, IterationResult};
use crate::part::{ChatMessage, Metadata, Part, Role, Usage};
use crate::tool::{tool_map, ToolDefinition, ToolMap};
use crate::typed_output;
use futures_util::StreamExt;
use std::sync::Arc;

/// Final result of a drained [`Agent::send`] call.
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Final text output (or, in typed-output mode, the JSON payload).
    pub output: String,
    /// Every message appended to history during the call, in order.
    pub messages: Vec<ChatMessage>,
    /// Token usage for the call's final turn, if reported.
    pub usage: Option<Usage>,
}

/// Parsed `provider`, `provider:model`, or `provider/model` string (§6.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedModelString {
    /// Provider name, lower-cased.
    pub provider: String,
    /// Model name, if the string included one.
    pub model: Option<String>,
}

/// Split on the first `:` or `/`, whichever comes first; the left side is
/// the provider name (case-insensitive), the right is the model name.
pub fn parse_model_string(input: &str) -> ParsedModelString {
    let split_at = input.find([':', '/']);
    match split_at {
        Some(idx) => ParsedModelString {
            provider: input[..idx].to_lowercase(),
            model: Some(input[idx + 1..].to_string()),
        },
        None => ParsedModelString {
            provider: input.to_lowercase(),
            model: None,
        },
    }
}

/// An LLM-powered agent: a backend, a tool set, and the turn loop that ties
/// them together.
pub struct Agent {
    backend: Arc<dyn ChatBackend>,
    model: Option<String>,
    tools: ToolMap,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl Agent {
    /// Build an agent directly from a backend instance.
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Agent {
            backend,
            model: None,
            tools: tool_map(vec![]),
            event_handler: None,
        }
    }

    /// Build an agent by looking up a registered backend factory by model
    /// string (§6.1 parsing rules).
    pub fn from_model_string(model_string: &str, settings: BackendSettings) -> Result<Self, CloudLlmError> {
        let parsed = parse_model_string(model_string);
        let mut settings = settings;
        if settings.default_model.is_none() {
            settings.default_model = parsed.model.clone();
        }
        let backend = backend::build(&parsed.provider, settings)?;
        Ok(Agent {
            backend,
            model: parsed.model,
            tools: tool_map(vec![]),
            event_handler: None,
        })
    }

    /// Attach a tool set, replacing any previously attached tools.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tool_map(tools);
        self
    }

    /// Attach an event handler (§10 observability).
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Models this agent's backend can serve.
    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.backend.list_models()
    }

    /// Embed a single query string, delegating to the backend.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, CloudLlmError> {
        self.backend.embed_query(text).await
    }

    /// Embed a batch of documents, delegating to the backend.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CloudLlmError> {
        self.backend.embed_documents(texts).await
    }

    fn build_history(&self, prompt: &str, history: Option<Vec<ChatMessage>>, attachments: Option<Vec<Part>>) -> Vec<ChatMessage> {
        let mut full_history = history.unwrap_or_default();
        let mut user_message = ChatMessage::new(Role::User).with_part(Part::text(prompt));
        if let Some(attachments) = attachments {
            for part in attachments {
                user_message.parts.push(part);
            }
        }
        full_history.push(user_message);
        full_history
    }

    /// Stream a turn-by-turn response (§6.1 `sendStream`).
    pub fn send_stream(
        &self,
        prompt: &str,
        history: Option<Vec<ChatMessage>>,
        attachments: Option<Vec<Part>>,
        output_schema: Option<serde_json::Value>,
    ) -> impl futures_util::Stream<Item = Result<IterationResult, CloudLlmError>> + Send {
        let full_history = self.build_history(prompt, history, attachments);
        let backend = self.backend.clone();
        let tools = self.tools.clone();
        let events = self.event_handler.clone();

        match output_schema {
            Some(schema) => typed_output::run_with_events(backend, full_history, tools, schema, events),
            None => orchestrator::run_with_events(backend, full_history, tools, None, events),
        }
    }

    /// Drain [`Agent::send_stream`] into a single [`AgentResult`] (§6.1
    /// `send`).
    pub async fn send(
        &self,
        prompt: &str,
        history: Option<Vec<ChatMessage>>,
        attachments: Option<Vec<Part>>,
    ) -> Result<AgentResult, CloudLlmError> {
        self.send_with_schema(prompt, history, attachments, None).await
    }

    /// Like [`Agent::send`] but requesting typed output against
    /// `output_schema` (§4.7).
    pub async fn send_with_schema(
        &self,
        prompt: &str,
        history: Option<Vec<ChatMessage>>,
        attachments: Option<Vec<Part>>,
        output_schema: Option<serde_json::Value>,
    ) -> Result<AgentResult, CloudLlmError> {
        if let Some(handler) = &self.event_handler {
            handler
                .on_agent_event(&AgentEvent::SendStarted {
                    history_len: history.as_ref().map(|h| h.len()).unwrap_or(0),
                })
                .await;
        }

        let mut stream = Box::pin(self.send_stream(prompt, history, attachments, output_schema));
        let mut output = String::new();
        let mut messages = Vec::new();
        let mut usage = None;
        let mut iterations = 0usize;
        let mut metadata_text_only: Metadata = Metadata::new();

        while let Some(event) = stream.next().await {
            let event = event?;
            iterations += 1;
            output.push_str(&event.output);
            messages.extend(event.messages);
            if event.usage.is_some() {
                usage = event.usage;
            }
            for (key, value) in &event.metadata {
                metadata_text_only.insert(key.clone(), value.clone());
            }
        }

        if let Some(handler) = &self.event_handler {
            handler
                .on_agent_event(&AgentEvent::SendCompleted { iterations, usage })
                .await;
        }

        Ok(AgentResult { output, messages, usage })
    }

    /// The model this agent was built with, if a model string was supplied.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_provider() {
        let parsed = parse_model_string("openai");
        assert_eq!(parsed.provider, "openai");
        assert_eq!(parsed.model, None);
    }

    #[test]
    fn parses_provider_colon_model() {
        let parsed = parse_model_string("openai:gpt-4.1");
        assert_eq!(parsed.provider, "openai");
        assert_eq!(parsed.model.as_deref(), Some("gpt-4.1"));
    }

    #[test]
    fn parses_provider_slash_model() {
        let parsed = parse_model_string("anthropic/claude-sonnet-4");
        assert_eq!(parsed.provider, "anthropic");
        assert_eq!(parsed.model.as_deref(), Some("claude-sonnet-4"));
    }

    #[test]
    fn provider_is_lowercased() {
        let parsed = parse_model_string("OpenAI:GPT-4.1");
        assert_eq!(parsed.provider, "openai");
        assert_eq!(parsed.model.as_deref(), Some("GPT-4.1"));
    }

    #[test]
    fn slash_before_colon_uses_first_separator() {
        let parsed = parse_model_string("openai/gpt-4.1:preview");
        assert_eq!(parsed.provider, "openai");
        assert_eq!(parsed.model.as_deref(), Some("gpt-4.1:preview"));
    }
}
