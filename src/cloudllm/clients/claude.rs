//! Anthropic Claude `ChatBackend` adapter (§4.1, §10.5).
//!
//! Routes through Anthropic's OpenAI-compatible chat-completions surface
//! (`https://api.anthropic.com/v1`), reusing the exact same wire codec as
//! [`crate::clients::openai`] rather than Anthropic's native Messages API —
//! this mirrors the donor crate's own `ClaudeClient`, which delegated to
//! `OpenAIClient::new_with_base_url` for the same reason.

use crate::backend::{BackendSettings, BackendStream, ChatBackend, ModelInfo};
use crate::clients::common::{get_shared_http_client, stream_chat_completions, to_wire_messages, to_wire_tools, ChatCompletionRequest, StreamOptions};
use crate::error::CloudLlmError;
use crate::part::ChatMessage;
use crate::tool::ToolDefinition;
use async_trait::async_trait;
use futures_util::StreamExt;

const CLAUDE_API_BASE: &str = "https://api.anthropic.com/v1";

/// Claude model identifiers this adapter is aware of for `Agent::list_models`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    ClaudeOpus41,
    ClaudeOpus4,
    ClaudeSonnet4,
    ClaudeSonnet37,
    ClaudeHaiku35,
}

/// Convert a [`Model`] variant into the string identifier expected by the REST API.
pub fn model_to_string(model: Model) -> &'static str {
    match model {
        Model::ClaudeOpus41 => "claude-opus-4-1",
        Model::ClaudeOpus4 => "claude-opus-4-0",
        Model::ClaudeSonnet4 => "claude-sonnet-4-0",
        Model::ClaudeSonnet37 => "claude-3-7-sonnet-latest",
        Model::ClaudeHaiku35 => "claude-3-5-haiku-latest",
    }
}

const KNOWN_MODELS: &[Model] = &[
    Model::ClaudeOpus41,
    Model::ClaudeOpus4,
    Model::ClaudeSonnet4,
    Model::ClaudeSonnet37,
    Model::ClaudeHaiku35,
];

/// A [`ChatBackend`] speaking Anthropic's OpenAI-compatible endpoint.
pub struct ClaudeBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl ClaudeBackend {
    /// Build an adapter from settings (§6.2); `settings.api_key` is
    /// required, `settings.base_url` overrides the default Anthropic
    /// endpoint.
    pub fn new(settings: BackendSettings) -> Result<Self, CloudLlmError> {
        let api_key = settings
            .api_key
            .ok_or_else(|| CloudLlmError::AdapterAuth("Claude backend requires an api_key".to_string()))?;
        Ok(ClaudeBackend {
            client: get_shared_http_client(),
            base_url: settings.base_url.unwrap_or_else(|| CLAUDE_API_BASE.to_string()),
            api_key,
            default_model: settings.default_model.unwrap_or_else(|| model_to_string(Model::ClaudeSonnet4).to_string()),
        })
    }

    /// Register this adapter's factory under the provider name `"claude"`.
    pub fn register() {
        crate::backend::register(
            "claude",
            std::sync::Arc::new(|settings| Ok(std::sync::Arc::new(ClaudeBackend::new(settings)?) as std::sync::Arc<dyn ChatBackend>)),
        );
    }
}

#[async_trait]
impl ChatBackend for ClaudeBackend {
    fn name(&self) -> &str {
        "claude"
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        KNOWN_MODELS
            .iter()
            .map(|&model| ModelInfo {
                name: model_to_string(model).to_string(),
                family: Some("claude".to_string()),
                supports_streaming: true,
                supports_tools: true,
                supports_typed_output: false,
            })
            .collect()
    }

    async fn send_stream(
        &self,
        history: &[ChatMessage],
        tools: &[ToolDefinition],
        output_schema: Option<&serde_json::Value>,
    ) -> Result<BackendStream, CloudLlmError> {
        if output_schema.is_some() {
            // Anthropic's compatible surface has no native structured-output
            // mode; typed_output's return_result fallback handles this.
            return Err(CloudLlmError::SchemaUnsupported(
                "claude backend has no native typed-output mode".to_string(),
            ));
        }

        let request = ChatCompletionRequest {
            model: self.default_model.clone(),
            messages: to_wire_messages(history),
            stream: true,
            stream_options: Some(StreamOptions { include_usage: true }),
            tools: to_wire_tools(tools),
            response_format: None,
        };

        let stream = stream_chat_completions(
            self.client.clone(),
            format!("{}/chat/completions", self.base_url),
            ("x-api-key".to_string(), self.api_key.clone()),
            request,
        )
        .await?;

        Ok(Box::pin(stream.boxed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_to_string_matches_known_identifiers() {
        assert_eq!(model_to_string(Model::ClaudeSonnet4), "claude-sonnet-4-0");
    }

    #[test]
    fn new_requires_an_api_key() {
        let err = ClaudeBackend::new(BackendSettings::default());
        assert!(matches!(err, Err(CloudLlmError::AdapterAuth(_))));
    }
}
