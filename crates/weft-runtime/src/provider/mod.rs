//! Collaborator traits for external capabilities.
//!
//! The runtime treats tool lookup/invocation and LLM completion as opaque
//! collaborators behind traits. Implementations live outside this crate;
//! failures surface through the typed error taxonomy.

mod llm;
mod tools;

pub use llm::{
    ChatMessage, CompletionBackend, LlmHandle, LlmNodeConfig, LlmParams, LlmProvider, LlmService,
    MessageRole, build_messages,
};
pub use tools::{ToolDefinition, ToolId, ToolResolver};
