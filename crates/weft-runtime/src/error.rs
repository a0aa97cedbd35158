//! Workflow error types.

use thiserror::Error;

use crate::definition::NodeId;
use crate::provider::ToolId;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors that can occur during workflow compilation and execution.
///
/// Node-level failures keep their typed variant all the way to the execution
/// record; only genuinely unexpected failures are wrapped into [`Execution`]
/// at the boundary where they are first caught.
///
/// [`Execution`]: WorkflowError::Execution
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Workflow definition is invalid.
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// Definition could not be compiled into an execution graph.
    #[error("graph compilation failed{}: {message}", fmt_node(node_id))]
    GraphCompilation {
        /// Node the compilation failed on, if any.
        node_id: Option<NodeId>,
        /// Error message.
        message: String,
    },

    /// LLM invocation failed inside a node.
    #[error("llm execution failed for {provider}/{model}{}: {message}", fmt_node(node_id))]
    LlmExecution {
        /// Provider name the call was made against.
        provider: String,
        /// Model name the call was made against.
        model: String,
        /// Node the call originated from, if any.
        node_id: Option<NodeId>,
        /// Error message.
        message: String,
    },

    /// Tool invocation failed inside a node.
    #[error("tool {tool_id} execution failed: {message}")]
    ToolExecution {
        /// ID of the failing tool.
        tool_id: ToolId,
        /// Error message.
        message: String,
    },

    /// Transform application failed inside a node.
    #[error("transform '{transform_type}' failed on node {node_id}: {message}")]
    TransformExecution {
        /// The attempted transform type.
        transform_type: String,
        /// Node the transform belongs to.
        node_id: NodeId,
        /// Error message.
        message: String,
    },

    /// Execution state does not satisfy the state schema.
    #[error("state validation failed: {}", violations.join("; "))]
    StateValidation {
        /// Individual violations, each carrying path and message.
        violations: Vec<String>,
    },

    /// Workflow execution was cancelled.
    #[error("workflow execution cancelled")]
    Cancelled,

    /// Catch-all for unexpected execution failures.
    #[error("workflow execution failed ({code}): {message}")]
    Execution {
        /// Stable error code for callers.
        code: &'static str,
        /// Error message, including the original failure.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Creates a generic execution error with the default code.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            code: "GRAPH_EXECUTION_ERROR",
            message: message.into(),
        }
    }

    /// Returns whether this error is terminal for a whole execution
    /// rather than a single retryable call.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn fmt_node(node_id: &Option<NodeId>) -> String {
    match node_id {
        Some(id) => format!(" on node {id}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_names_tool() {
        let err = WorkflowError::ToolExecution {
            tool_id: ToolId::from("tool-7"),
            message: "not found".into(),
        };
        assert!(err.to_string().contains("tool-7"));
    }

    #[test]
    fn test_llm_error_names_provider_and_model() {
        let err = WorkflowError::LlmExecution {
            provider: "openai".into(),
            model: "gpt-4".into(),
            node_id: Some(NodeId::from("node-2")),
            message: "timeout".into(),
        };
        let text = err.to_string();
        assert!(text.contains("openai/gpt-4"));
        assert!(text.contains("node-2"));
    }
}
