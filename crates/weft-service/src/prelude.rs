//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use weft_service::prelude::*;
//! ```

pub use crate::agent::{AgentEngine, AgentOutcome};
pub use crate::chain::{ChainEngine, ChainOutcome};
pub use crate::error::{ServiceError, ServiceResult};
pub use crate::execution::{
    ExecutionLog, ExecutionStatus, LogLevel, ToolCall, WorkflowExecution,
};
pub use crate::executor::{ExecutionUpdate, WorkflowExecutor};
pub use crate::registry::ExecutionRegistry;
pub use crate::store::{InMemoryWorkflowStore, WorkflowStore};
pub use crate::tools::ToolRegistry;
pub use crate::workflow::{Workflow, WorkflowId, WorkflowStatus};
