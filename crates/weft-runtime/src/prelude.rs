//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use weft_runtime::prelude::*;
//! ```

pub use crate::convert::{AgentSpec, ChainSpec, ExecutionGraphConfig, WorkflowKind};
pub use crate::definition::{
    Connection, Node, NodeId, NodeKind, ValidationReport, WorkflowDefinition,
};
pub use crate::engine::{
    Engine, EngineConfig, ExecutionEvent, ExecutionGraph, ExecutionId, ExecutionState, RunOptions,
    RunOutcome,
};
pub use crate::error::{WorkflowError, WorkflowResult};
pub use crate::provider::{
    ChatMessage, CompletionBackend, LlmProvider, ToolDefinition, ToolId, ToolResolver,
};
pub use crate::retry::RetryPolicy;
pub use crate::transform::TransformSpec;
