//! Execution records.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display as StrumDisplay, EnumString};
use weft_runtime::definition::NodeId;
use weft_runtime::engine::{ExecutionId, ExecutionState};

use crate::workflow::WorkflowId;

/// Lifecycle status of an execution.
///
/// `Running` transitions exactly once to one of the terminal statuses and
/// never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(StrumDisplay, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    /// The execution is in flight.
    Running,
    /// The execution finished successfully.
    Completed,
    /// The execution failed with an error.
    Failed,
    /// The execution was cancelled by an external request.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns whether this status is terminal.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Severity of an execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Informational.
    Info,
    /// Something unexpected but non-fatal.
    Warn,
    /// A failure.
    Error,
}

/// One log entry attached to an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// When the entry was recorded.
    pub timestamp: Timestamp,
    /// Severity.
    pub level: LogLevel,
    /// Log message.
    pub message: String,
    /// Node the entry relates to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
}

impl ExecutionLog {
    /// Creates a log entry stamped with the current time.
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Timestamp::now(),
            level,
            message: message.into(),
            node_id: None,
        }
    }

    /// Attaches a node ID, returning the entry.
    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }
}

/// One tool invocation made during an agent execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name or ID.
    pub tool: String,
    /// Arguments the tool was invoked with.
    pub input: Value,
    /// Text output the tool returned.
    pub output: String,
}

/// One run of a workflow against concrete input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Unique execution ID.
    pub id: ExecutionId,
    /// The workflow that ran.
    pub workflow_id: WorkflowId,
    /// Lifecycle status.
    pub status: ExecutionStatus,
    /// When the execution started.
    pub started_at: Timestamp,
    /// When the execution reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// Wall-clock duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Caller-supplied input.
    pub input: Value,
    /// Final output, when completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Failure description, when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Final execution state snapshot, for graph runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ExecutionState>,
    /// Tool invocations made during the run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Reasoning steps captured from agent runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_steps: Vec<String>,
    /// Log entries recorded during the run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<ExecutionLog>,
}

impl WorkflowExecution {
    /// Creates a running execution started now.
    pub fn new(workflow_id: WorkflowId, input: Value) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id,
            status: ExecutionStatus::Running,
            started_at: Timestamp::now(),
            completed_at: None,
            duration_ms: None,
            input,
            output: None,
            error: None,
            state: None,
            tool_calls: Vec::new(),
            reasoning_steps: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Marks the execution completed with its results.
    pub fn complete(
        &mut self,
        output: Value,
        state: Option<ExecutionState>,
        tool_calls: Vec<ToolCall>,
        reasoning_steps: Vec<String>,
    ) {
        self.output = Some(output);
        self.state = state;
        self.tool_calls = tool_calls;
        self.reasoning_steps = reasoning_steps;
        self.finish(ExecutionStatus::Completed);
    }

    /// Marks the execution failed with a human-readable error.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(ExecutionStatus::Failed);
    }

    /// Marks the execution cancelled.
    pub fn cancel(&mut self) {
        self.finish(ExecutionStatus::Cancelled);
    }

    /// Appends a log entry.
    pub fn log(&mut self, entry: ExecutionLog) {
        self.logs.push(entry);
    }

    fn finish(&mut self, status: ExecutionStatus) {
        let completed = Timestamp::now();
        self.status = status;
        self.completed_at = Some(completed);
        self.duration_ms = Some(completed.as_millisecond() - self.started_at.as_millisecond());
    }
}
