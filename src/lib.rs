//! Provider-agnostic streaming agent runtime for LLM chat APIs.
//!
//! Start at [`agent::Agent`]: build one from a registered backend name
//! (`agent::Agent::from_model_string`) or directly from a
//! [`backend::ChatBackend`] instance, attach tools with
//! [`agent::Agent::with_tools`], then call [`agent::Agent::send`] or
//! [`agent::Agent::send_stream`].

pub mod cloudllm;

pub use cloudllm::accumulator;
pub use cloudllm::agent;
pub use cloudllm::backend;
pub use cloudllm::clients;
pub use cloudllm::config;
pub use cloudllm::error;
pub use cloudllm::event;
pub use cloudllm::orchestrator;
pub use cloudllm::part;
pub use cloudllm::streaming_state;
pub use cloudllm::tool;
pub use cloudllm::tool_id;
pub use cloudllm::tools;
pub use cloudllm::typed_output;

#[cfg(feature = "mcp-bridge")]
pub use cloudllm::mcp;

pub use agent::Agent;
pub use backend::ChatBackend;
pub use error::CloudLlmError;
pub use part::{ChatMessage, ChatResult, Part, Role};
