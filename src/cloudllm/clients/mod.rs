//! Concrete [`crate::backend::ChatBackend`] adapters (§10.5, ambient — not
//! core). Both ship on the shared pooled `reqwest::Client` in `common` and
//! translate SSE chunks into [`crate::part::ChatResult`] values.

pub mod claude;
pub mod common;
pub mod openai;

/// Register both shipped adapters (`"openai"`, `"claude"`) under
/// [`crate::backend`]. Still an explicit call the caller makes at process
/// init — nothing in this crate registers a backend on its own.
pub fn register_builtin_backends() {
    openai::OpenAiBackend::register();
    claude::ClaudeBackend::register();
}
