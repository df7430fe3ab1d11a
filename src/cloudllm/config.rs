//! Global runtime configuration.
//!
//! Mirrors the donor crate's philosophy: a small, manually-constructed
//! struct, no TOML/YAML parsing dependency pulled in just to populate a few
//! fields callers can set directly.
//!
//! # Example
//!
//! ```rust
//! use cloudllm::config::CloudLlmConfig;
//! use std::time::Duration;
//!
//! let config = CloudLlmConfig {
//!     tool_timeout: Duration::from_secs(10),
//!     ..CloudLlmConfig::default()
//! };
//! ```

use std::time::Duration;

/// Global knobs shared across every `Agent` built in a process.
///
/// Per-backend credentials and endpoints live in
/// [`crate::backend::BackendSettings`] instead — this struct only holds
/// settings that apply to the orchestrator itself.
#[derive(Debug, Clone)]
pub struct CloudLlmConfig {
    /// Per-call timeout applied to each tool invocation (§4.6).
    pub tool_timeout: Duration,
    /// Consecutive empty-after-tools continuations tolerated before the
    /// turn loop gives up and terminates (§4.3).
    pub max_empty_after_tools_continuations: usize,
}

impl Default for CloudLlmConfig {
    /// 30s tool timeout, matching [`crate::tool::DEFAULT_TOOL_TIMEOUT`]; one
    /// tolerated empty-after-tools continuation, matching
    /// [`crate::streaming_state::MAX_EMPTY_AFTER_TOOLS_CONTINUATIONS`].
    fn default() -> Self {
        CloudLlmConfig {
            tool_timeout: crate::tool::DEFAULT_TOOL_TIMEOUT,
            max_empty_after_tools_continuations: crate::streaming_state::MAX_EMPTY_AFTER_TOOLS_CONTINUATIONS,
        }
    }
}

/// A cancellation signal the caller can fire to abort an in-flight `send`/
/// `send_stream` call (§5). Thin wrapper around a `tokio` watch channel so
/// it is cheaply cloneable and observable from any task.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    receiver: tokio::sync::watch::Receiver<bool>,
}

/// The other half of a [`CancellationToken`], held by the caller.
#[derive(Debug, Clone)]
pub struct CancellationSource {
    sender: tokio::sync::watch::Sender<bool>,
}

/// Create a linked cancellation source/token pair.
pub fn cancellation_pair() -> (CancellationSource, CancellationToken) {
    let (sender, receiver) = tokio::sync::watch::channel(false);
    (CancellationSource { sender }, CancellationToken { receiver })
}

impl CancellationSource {
    /// Signal cancellation to every cloned [`CancellationToken`].
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

impl CancellationToken {
    /// `true` once [`CancellationSource::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_module_defaults() {
        let config = CloudLlmConfig::default();
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
        assert_eq!(config.max_empty_after_tools_continuations, 1);
    }

    #[test]
    fn cancellation_token_observes_source() {
        let (source, token) = cancellation_pair();
        assert!(!token.is_cancelled());
        source.cancel();
        assert!(token.is_cancelled());
    }
}
