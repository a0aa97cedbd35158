//! Service error types.

use thiserror::Error;
use weft_runtime::WorkflowError;
use weft_runtime::engine::ExecutionId;

use crate::execution::ExecutionStatus;
use crate::workflow::WorkflowId;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that can occur in the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No workflow with the given ID exists.
    #[error("workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    /// No execution with the given ID exists.
    #[error("execution {0} not found")]
    ExecutionNotFound(ExecutionId),

    /// The operation requires a running execution.
    #[error("execution {id} is not running (status: {status})")]
    ExecutionNotRunning {
        /// The execution ID.
        id: ExecutionId,
        /// Its current status.
        status: ExecutionStatus,
    },

    /// The workflow definition failed validation.
    #[error("invalid workflow definition: {}", errors.join("; "))]
    InvalidWorkflow {
        /// Accumulated validation errors.
        errors: Vec<String>,
    },

    /// The workflow is missing configuration its engine requires.
    #[error("workflow is missing required {0} configuration")]
    MissingConfig(&'static str),

    /// A runtime error surfaced through the service layer.
    #[error(transparent)]
    Runtime(#[from] WorkflowError),
}
