//! OpenAI `ChatBackend` adapter (§4.1, §10.5).
//!
//! Talks directly to OpenAI's Chat Completions API over SSE via the shared
//! pooled client in [`crate::clients::common`], rather than through a
//! vendored SDK — see `register` in this module for the full list of
//! `Model` identifiers this adapter advertises in `list_models`.

use crate::backend::{BackendSettings, BackendStream, ChatBackend, ModelInfo};
use crate::clients::common::{get_shared_http_client, stream_chat_completions, to_wire_messages, to_wire_tools, ChatCompletionRequest, StreamOptions};
use crate::error::CloudLlmError;
use crate::part::ChatMessage;
use crate::tool::ToolDefinition;
use async_trait::async_trait;
use futures_util::StreamExt;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI chat model identifiers this adapter is aware of for
/// `Agent::list_models`. Any other model string is still accepted and
/// passed through verbatim to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    GPT52,
    GPT52ChatLatest,
    GPT52Pro,
    GPT51,
    GPT5,
    GPT5Mini,
    GPT5Nano,
    GPT5ChatLatest,
    GPT4o,
    ChatGPT4oLatest,
    GPt4oMini,
    O1,
    O1Mini,
    O1Preview,
    O3Mini,
    O4Mini,
    O4MiniHigh,
    O3,
    GPT45Preview,
    GPT41,
    GPT41Mini,
    GPT41Nano,
}

/// Convert a [`Model`] variant into the string identifier expected by the REST API.
pub fn model_to_string(model: Model) -> &'static str {
    match model {
        Model::GPT52 => "gpt-5.2",
        Model::GPT52ChatLatest => "gpt-5.2-chat-latest",
        Model::GPT52Pro => "gpt-5.2-pro",
        Model::GPT51 => "gpt-5.1",
        Model::GPT5 => "gpt-5",
        Model::GPT5Mini => "gpt-5-mini",
        Model::GPT5Nano => "gpt-5-nano",
        Model::GPT5ChatLatest => "gpt-5-chat-latest",
        Model::GPT4o => "gpt-4o",
        Model::ChatGPT4oLatest => "chatgpt-4o-latest",
        Model::GPt4oMini => "gpt-4o-mini",
        Model::O1 => "o1",
        Model::O1Mini => "o1-mini",
        Model::O1Preview => "o1-preview",
        Model::O3Mini => "o3-mini",
        Model::O4Mini => "o4-mini",
        Model::O4MiniHigh => "o4-mini-high",
        Model::O3 => "o3",
        Model::GPT45Preview => "gpt-4.5-preview",
        Model::GPT41 => "gpt-4.1",
        Model::GPT41Mini => "gpt-4.1-mini",
        Model::GPT41Nano => "gpt-4.1-nano",
    }
}

const KNOWN_MODELS: &[Model] = &[
    Model::GPT52,
    Model::GPT52ChatLatest,
    Model::GPT52Pro,
    Model::GPT51,
    Model::GPT5,
    Model::GPT5Mini,
    Model::GPT5Nano,
    Model::GPT5ChatLatest,
    Model::GPT4o,
    Model::ChatGPT4oLatest,
    Model::GPt4oMini,
    Model::O1,
    Model::O1Mini,
    Model::O1Preview,
    Model::O3Mini,
    Model::O4Mini,
    Model::O4MiniHigh,
    Model::O3,
    Model::GPT45Preview,
    Model::GPT41,
    Model::GPT41Mini,
    Model::GPT41Nano,
];

/// A [`ChatBackend`] speaking OpenAI's Chat Completions API.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl OpenAiBackend {
    /// Build an adapter from settings (§6.2); `settings.api_key` is
    /// required, `settings.base_url` overrides the default OpenAI endpoint
    /// for self-hosted OpenAI-compatible gateways.
    pub fn new(settings: BackendSettings) -> Result<Self, CloudLlmError> {
        let api_key = settings
            .api_key
            .ok_or_else(|| CloudLlmError::AdapterAuth("OpenAI backend requires an api_key".to_string()))?;
        Ok(OpenAiBackend {
            client: get_shared_http_client(),
            base_url: settings.base_url.unwrap_or_else(|| OPENAI_API_BASE.to_string()),
            api_key,
            default_model: settings.default_model.unwrap_or_else(|| model_to_string(Model::GPT41).to_string()),
        })
    }

    /// Register this adapter's factory under the provider name `"openai"`.
    pub fn register() {
        crate::backend::register(
            "openai",
            std::sync::Arc::new(|settings| Ok(std::sync::Arc::new(OpenAiBackend::new(settings)?) as std::sync::Arc<dyn ChatBackend>)),
        );
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        KNOWN_MODELS
            .iter()
            .map(|&model| {
                let name = model_to_string(model);
                ModelInfo {
                    name: name.to_string(),
                    family: Some(name.split('-').next().unwrap_or(name).to_string()),
                    supports_streaming: true,
                    supports_tools: !matches!(model, Model::O1Preview),
                    supports_typed_output: true,
                }
            })
            .collect()
    }

    async fn send_stream(
        &self,
        history: &[ChatMessage],
        tools: &[ToolDefinition],
        output_schema: Option<&serde_json::Value>,
    ) -> Result<BackendStream, CloudLlmError> {
        let request = ChatCompletionRequest {
            model: self.default_model.clone(),
            messages: to_wire_messages(history),
            stream: true,
            stream_options: Some(StreamOptions { include_usage: true }),
            tools: to_wire_tools(tools),
            response_format: output_schema.map(|schema| {
                serde_json::json!({"type": "json_schema", "json_schema": {"name": "output", "schema": schema}})
            }),
        };

        let stream = stream_chat_completions(
            self.client.clone(),
            format!("{}/chat/completions", self.base_url),
            ("Authorization".to_string(), format!("Bearer {}", self.api_key)),
            request,
        )
        .await?;

        Ok(Box::pin(stream.boxed()))
    }
}
