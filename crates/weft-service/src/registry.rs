//! Execution registry.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use weft_runtime::engine::{ExecutionId, ExecutionState};

use crate::TRACING_TARGET;
use crate::error::{ServiceError, ServiceResult};
use crate::execution::{ExecutionLog, ExecutionStatus, ToolCall, WorkflowExecution};
use crate::workflow::WorkflowId;

/// In-memory keyed store of execution records.
///
/// Tracks at most one logical run per execution ID. Each running execution
/// carries a [`CancellationToken`] shared with any active stream, so an
/// external [`cancel`] is observed at the stream's next node boundary.
///
/// [`cancel`]: ExecutionRegistry::cancel
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    executions: RwLock<HashMap<ExecutionId, WorkflowExecution>>,
    tokens: RwLock<HashMap<ExecutionId, CancellationToken>>,
}

impl ExecutionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a running execution record and its cancellation token.
    pub async fn create(&self, workflow_id: WorkflowId, input: Value) -> WorkflowExecution {
        let execution = WorkflowExecution::new(workflow_id, input);

        self.tokens
            .write()
            .await
            .insert(execution.id, CancellationToken::new());
        self.executions
            .write()
            .await
            .insert(execution.id, execution.clone());

        tracing::debug!(
            target: TRACING_TARGET,
            execution_id = %execution.id,
            workflow_id = %workflow_id,
            "Execution created"
        );

        execution
    }

    /// Returns an execution by ID.
    pub async fn get(&self, id: &ExecutionId) -> Option<WorkflowExecution> {
        self.executions.read().await.get(id).cloned()
    }

    /// Returns up to `limit` executions of a workflow, most recent first.
    pub async fn list_by_workflow(
        &self,
        workflow_id: &WorkflowId,
        limit: usize,
    ) -> Vec<WorkflowExecution> {
        let mut executions: Vec<WorkflowExecution> = self
            .executions
            .read()
            .await
            .values()
            .filter(|e| &e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        executions.truncate(limit);
        executions
    }

    /// Returns the cancellation token of an execution, if it still exists.
    pub async fn cancellation_token(&self, id: &ExecutionId) -> Option<CancellationToken> {
        self.tokens.read().await.get(id).cloned()
    }

    /// Marks a running execution completed with its results.
    pub async fn complete(
        &self,
        id: &ExecutionId,
        output: Value,
        state: Option<ExecutionState>,
        tool_calls: Vec<ToolCall>,
        reasoning_steps: Vec<String>,
    ) -> ServiceResult<WorkflowExecution> {
        self.transition(id, move |execution| {
            execution.complete(output, state, tool_calls, reasoning_steps);
        })
        .await
    }

    /// Marks a running execution failed.
    pub async fn fail(&self, id: &ExecutionId, error: impl Into<String>) -> ServiceResult<WorkflowExecution> {
        let error = error.into();
        self.transition(id, move |execution| execution.fail(error)).await
    }

    /// Cancels a running execution.
    ///
    /// Fires the execution's cancellation token so an active stream observes
    /// the cancellation at its next node boundary. Cancelling an execution
    /// that is not running is an error and changes nothing.
    pub async fn cancel(&self, id: &ExecutionId) -> ServiceResult<WorkflowExecution> {
        let cancelled = self.transition(id, |execution| execution.cancel()).await?;

        if let Some(token) = self.tokens.read().await.get(id) {
            token.cancel();
        }

        tracing::info!(
            target: TRACING_TARGET,
            execution_id = %id,
            "Execution cancelled"
        );

        Ok(cancelled)
    }

    /// Appends a log entry to an execution.
    pub async fn log(&self, id: &ExecutionId, entry: ExecutionLog) -> ServiceResult<()> {
        let mut executions = self.executions.write().await;
        let execution = executions
            .get_mut(id)
            .ok_or(ServiceError::ExecutionNotFound(*id))?;
        execution.log(entry);
        Ok(())
    }

    /// Applies a terminal transition to a running execution.
    async fn transition(
        &self,
        id: &ExecutionId,
        apply: impl FnOnce(&mut WorkflowExecution),
    ) -> ServiceResult<WorkflowExecution> {
        let mut executions = self.executions.write().await;
        let execution = executions
            .get_mut(id)
            .ok_or(ServiceError::ExecutionNotFound(*id))?;

        if execution.status != ExecutionStatus::Running {
            return Err(ServiceError::ExecutionNotRunning {
                id: *id,
                status: execution.status,
            });
        }

        apply(execution);
        let snapshot = execution.clone();
        drop(executions);

        // Terminal executions no longer need their token.
        if snapshot.status != ExecutionStatus::Cancelled {
            self.tokens.write().await.remove(id);
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = ExecutionRegistry::new();
        let workflow_id = WorkflowId::new();

        let execution = registry.create(workflow_id, json!({"q": 1})).await;
        let fetched = registry.get(&execution.id).await.unwrap();
        assert_eq!(fetched.status, ExecutionStatus::Running);
        assert_eq!(fetched.workflow_id, workflow_id);

        assert!(registry.get(&ExecutionId::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_complete_sets_duration() {
        let registry = ExecutionRegistry::new();
        let execution = registry.create(WorkflowId::new(), json!({})).await;

        let completed = registry
            .complete(&execution.id, json!("out"), None, vec![], vec![])
            .await
            .unwrap();
        assert_eq!(completed.status, ExecutionStatus::Completed);
        assert!(completed.duration_ms.unwrap() >= 0);
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_requires_running() {
        let registry = ExecutionRegistry::new();
        let execution = registry.create(WorkflowId::new(), json!({})).await;

        registry
            .complete(&execution.id, json!("out"), None, vec![], vec![])
            .await
            .unwrap();

        let err = registry.cancel(&execution.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::ExecutionNotRunning { .. }));

        // The record is unchanged.
        let record = registry.get(&execution.id).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_fires_token() {
        let registry = ExecutionRegistry::new();
        let execution = registry.create(WorkflowId::new(), json!({})).await;
        let token = registry.cancellation_token(&execution.id).await.unwrap();
        assert!(!token.is_cancelled());

        registry.cancel(&execution.id).await.unwrap();
        assert!(token.is_cancelled());
        assert_eq!(
            registry.get(&execution.id).await.unwrap().status,
            ExecutionStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_log_appends_entries() {
        let registry = ExecutionRegistry::new();
        let execution = registry.create(WorkflowId::new(), json!({})).await;

        registry
            .log(
                &execution.id,
                ExecutionLog::now(crate::execution::LogLevel::Info, "node started"),
            )
            .await
            .unwrap();

        let record = registry.get(&execution.id).await.unwrap();
        assert_eq!(record.logs.len(), 1);
        assert_eq!(record.logs[0].message, "node started");
    }

    #[tokio::test]
    async fn test_list_by_workflow_sorted_and_limited() {
        let registry = ExecutionRegistry::new();
        let workflow_id = WorkflowId::new();

        let mut ids = Vec::new();
        for n in 0..5 {
            let execution = registry.create(workflow_id, json!(n)).await;
            ids.push(execution.id);
            // Distinct start timestamps so the ordering is deterministic.
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        registry.create(WorkflowId::new(), json!("other")).await;

        let listed = registry.list_by_workflow(&workflow_id, 3).await;
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, ids[4]);
        assert_eq!(listed[1].id, ids[3]);
        assert_eq!(listed[2].id, ids[2]);
    }
}
