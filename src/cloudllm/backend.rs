//! Backend Adapter contract (§4.1, §6.2) and the process-wide adapter
//! registry.
//!
//! A [`ChatBackend`] is the one seam every provider integration implements:
//! turn a conversation history (plus an optional output JSON-Schema) into a
//! stream of [`ChatResult`] chunks. Everything above this trait — the
//! orchestrator, the accumulator, the tool executor — is provider-agnostic.
//!
//! Adapters are registered by name at an explicit init phase (`register`),
//! never constructed implicitly by string-matching inside `Agent::send`;
//! this mirrors the donor crate's `ClientWrapper` being handed to
//! `LLMSession` at construction time rather than resolved from a global.

use crate::error::CloudLlmError;
use crate::part::ChatMessage;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A single chunk of a backend's response stream.
pub type BackendStream = BoxStream<'static, Result<crate::part::ChatResult, CloudLlmError>>;

/// Static facts about a model a backend can serve, surfaced by
/// `Agent::list_models` (§6.1).
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Provider-local model identifier, e.g. `"gpt-4.1"`.
    pub name: String,
    /// Free-form family label, e.g. `"gpt-4"`.
    pub family: Option<String>,
    /// `true` if the backend can stream `send_stream` for this model.
    pub supports_streaming: bool,
    /// `true` if the backend supports native tool calling for this model.
    pub supports_tools: bool,
    /// `true` if the backend can take a JSON-Schema `outputSchema` for this
    /// model (§4.7 typed output).
    pub supports_typed_output: bool,
}

/// Construction-time configuration handed to a backend (§6.2).
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    /// API key / bearer credential. Absent for backends reading it from the
    /// environment at process start.
    pub api_key: Option<String>,
    /// Override for the provider's default API base URL (self-hosted
    /// gateways, OpenAI-compatible proxies).
    pub base_url: Option<String>,
    /// Extra HTTP headers sent with every request.
    pub headers: HashMap<String, String>,
    /// Model used when a call does not specify one explicitly.
    pub default_model: Option<String>,
    /// Provider-specific default generation options (temperature, etc.),
    /// passed through verbatim.
    pub default_options: serde_json::Value,
}

/// The provider-agnostic streaming chat contract every adapter implements.
///
/// Implementors own their own wire format (SSE, chunked JSON, websockets)
/// and must translate it into the common [`crate::part::ChatResult`] shape;
/// nothing above this trait should need to know which provider it is
/// talking to.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Stable adapter name used for registry lookups and metadata
    /// (`"openai"`, `"claude"`, ...).
    fn name(&self) -> &str;

    /// Models this backend can serve, for `Agent::list_models`.
    fn list_models(&self) -> Vec<ModelInfo>;

    /// Stream a turn's response for the given history.
    ///
    /// `output_schema`, when present, requests typed output: the adapter
    /// should either honor it natively or return
    /// [`CloudLlmError::SchemaUnsupported`] so the typed-output orchestrator
    /// can fall back to tool synthesis (§4.7).
    async fn send_stream(
        &self,
        history: &[ChatMessage],
        tools: &[crate::tool::ToolDefinition],
        output_schema: Option<&serde_json::Value>,
    ) -> Result<BackendStream, CloudLlmError>;

    /// Embed a single query string, if this backend supports embeddings.
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, CloudLlmError> {
        Err(CloudLlmError::SchemaUnsupported(
            "this backend does not support embeddings".to_string(),
        ))
    }

    /// Embed a batch of documents, if this backend supports embeddings.
    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, CloudLlmError> {
        Err(CloudLlmError::SchemaUnsupported(
            "this backend does not support embeddings".to_string(),
        ))
    }
}

/// A constructor for a backend, installed once at process init and looked
/// up by provider name thereafter.
pub type BackendFactory = Arc<dyn Fn(BackendSettings) -> Result<Arc<dyn ChatBackend>, CloudLlmError> + Send + Sync>;

lazy_static::lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, BackendFactory>> = RwLock::new(HashMap::new());
}

/// Register a backend factory under `provider_name`. Re-registering the
/// same name replaces the previous factory; callers that want isolated
/// registries (tests) should prefer constructing adapters directly instead
/// of going through this process-wide registry.
pub fn register(provider_name: impl Into<String>, factory: BackendFactory) {
    REGISTRY.write().unwrap().insert(provider_name.into(), factory);
}

/// Build a registered backend by provider name and settings.
pub fn build(provider_name: &str, settings: BackendSettings) -> Result<Arc<dyn ChatBackend>, CloudLlmError> {
    let factory = REGISTRY
        .read()
        .unwrap()
        .get(provider_name)
        .cloned()
        .ok_or_else(|| CloudLlmError::AdapterProtocol(format!("no backend registered under '{provider_name}'")))?;
    factory(settings)
}

/// `true` if a backend is registered under this name.
pub fn is_registered(provider_name: &str) -> bool {
    REGISTRY.read().unwrap().contains_key(provider_name)
}
