//! Workflow executor.
//!
//! Routes a `(workflow, definition, input)` submission to the right engine,
//! tracks the resulting execution in the [`ExecutionRegistry`], and exposes
//! streaming: natively for graph workflows, by status polling for chain and
//! agent workflows.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_runtime::convert::{self, WorkflowKind};
use weft_runtime::definition::{WorkflowDefinition, validate};
use weft_runtime::engine::{
    Engine, EngineConfig, ExecutionEvent, ExecutionId, ExecutionState, RunOptions,
};
use weft_runtime::provider::{CompletionBackend, ToolResolver};

use crate::TRACING_TARGET;
use crate::agent::AgentEngine;
use crate::chain::ChainEngine;
use crate::error::{ServiceError, ServiceResult};
use crate::execution::{ExecutionStatus, ToolCall, WorkflowExecution};
use crate::registry::ExecutionRegistry;
use crate::store::WorkflowStore;
use crate::workflow::{Workflow, WorkflowId};

/// How often the poll-based stream samples execution status.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A status update emitted by the poll-based execution stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionUpdate {
    /// The execution being observed.
    pub execution_id: ExecutionId,
    /// Its status at sample time.
    pub status: ExecutionStatus,
    /// Final output, once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Failure description, once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Routes workflow submissions to the graph, chain, or agent engine and
/// records the resulting executions.
pub struct WorkflowExecutor {
    store: Arc<dyn WorkflowStore>,
    registry: Arc<ExecutionRegistry>,
    engine: Arc<Engine>,
    chain: ChainEngine,
    agent: AgentEngine,
}

impl WorkflowExecutor {
    /// Creates an executor with default engine configuration.
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        tools: Arc<dyn ToolResolver>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self::with_config(EngineConfig::default(), store, tools, backend)
    }

    /// Creates an executor with a custom engine configuration.
    pub fn with_config(
        config: EngineConfig,
        store: Arc<dyn WorkflowStore>,
        tools: Arc<dyn ToolResolver>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        let chain = ChainEngine::with_policy(
            Arc::clone(&backend),
            config.retry.clone(),
            config.call_timeout,
        );
        let agent = AgentEngine::with_policy(
            Arc::clone(&tools),
            Arc::clone(&backend),
            config.retry.clone(),
            config.call_timeout,
        );
        let engine = Arc::new(Engine::with_config(config, tools, backend));

        Self {
            store,
            registry: Arc::new(ExecutionRegistry::new()),
            engine,
            chain,
            agent,
        }
    }

    /// Returns the execution registry.
    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    /// Returns the underlying graph engine.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Executes a stored workflow to completion.
    ///
    /// The definition is validated up front; an invalid definition is
    /// rejected before any execution record is created. Engine failures
    /// during the run are captured in the returned record (`failed` status
    /// with a human-readable error), not raised.
    pub async fn execute(
        &self,
        workflow_id: &WorkflowId,
        input: Value,
    ) -> ServiceResult<WorkflowExecution> {
        let (workflow, definition) = self.store.get(workflow_id).await?;

        let report = validate::validate_definition(&definition);
        if !report.is_valid() {
            return Err(ServiceError::InvalidWorkflow {
                errors: report.into_errors(),
            });
        }

        let execution = self.registry.create(workflow.id, input.clone()).await;
        let kind = self.resolve_kind(&workflow, &definition);

        tracing::info!(
            target: TRACING_TARGET,
            workflow_id = %workflow.id,
            execution_id = %execution.id,
            kind = %kind,
            "Executing workflow"
        );

        match self.run_engine(kind, &workflow, &definition, execution.id, input).await {
            Ok(outcome) => {
                self.registry
                    .complete(
                        &execution.id,
                        outcome.output,
                        outcome.state,
                        outcome.tool_calls,
                        outcome.reasoning_steps,
                    )
                    .await
            }
            Err(err) => self.registry.fail(&execution.id, err.to_string()).await,
        }
    }

    /// Streams a graph workflow execution natively.
    ///
    /// Creates the execution record, bridges the engine's event stream, and
    /// settles the record when a terminal event passes through. The stream
    /// shares the registry's cancellation token, so
    /// [`ExecutionRegistry::cancel`] makes the next emitted event
    /// `cancelled`.
    pub async fn stream_workflow(
        &self,
        workflow_id: &WorkflowId,
        input: Value,
    ) -> ServiceResult<(ExecutionId, BoxStream<'_, ExecutionEvent>)> {
        let (workflow, definition) = self.store.get(workflow_id).await?;

        let report = validate::validate_definition(&definition);
        if !report.is_valid() {
            return Err(ServiceError::InvalidWorkflow {
                errors: report.into_errors(),
            });
        }

        let graph = self.engine.compile(&definition)?;
        let execution = self.registry.create(workflow.id, input.clone()).await;
        let execution_id = execution.id;
        let token = self
            .registry
            .cancellation_token(&execution_id)
            .await
            .unwrap_or_default();

        let engine = Arc::clone(&self.engine);
        let registry = Arc::clone(&self.registry);

        let stream = async_stream::stream! {
            let mut state = ExecutionState::new();
            let mut inner = engine.stream(&graph, input, token);

            while let Some(event) = inner.next().await {
                match &event {
                    ExecutionEvent::Running { state: delta, .. } => {
                        state = state.merged(delta);
                    }
                    ExecutionEvent::Completed => {
                        let output = state
                            .get("output")
                            .cloned()
                            .unwrap_or_else(|| state.to_value());
                        let _ = registry
                            .complete(&execution_id, output, Some(state.clone()), vec![], vec![])
                            .await;
                    }
                    ExecutionEvent::Error { error } => {
                        let _ = registry.fail(&execution_id, error.clone()).await;
                    }
                    ExecutionEvent::Cancelled => {
                        // The registry already settled the record when it
                        // fired the token; nothing further to record.
                    }
                }
                yield event;
            }
        };

        Ok((execution_id, Box::pin(stream)))
    }

    /// Streams execution status by polling the registry until terminal.
    ///
    /// This is the streaming mode for chain and agent workflows, which do
    /// not expose per-step events.
    pub async fn stream_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> ServiceResult<BoxStream<'_, ExecutionUpdate>> {
        let execution = self
            .registry
            .get(execution_id)
            .await
            .ok_or(ServiceError::ExecutionNotFound(*execution_id))?;

        let registry = Arc::clone(&self.registry);
        let execution_id = execution.id;

        let stream = async_stream::stream! {
            loop {
                let Some(execution) = registry.get(&execution_id).await else {
                    return;
                };

                let update = ExecutionUpdate {
                    execution_id,
                    status: execution.status,
                    output: execution.output.clone(),
                    error: execution.error.clone(),
                };
                let terminal = update.status.is_terminal();
                yield update;

                if terminal {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        Ok(Box::pin(stream))
    }

    /// Cancels a running execution.
    pub async fn cancel(&self, execution_id: &ExecutionId) -> ServiceResult<WorkflowExecution> {
        self.registry.cancel(execution_id).await
    }

    fn resolve_kind(&self, workflow: &Workflow, definition: &WorkflowDefinition) -> WorkflowKind {
        workflow.kind.unwrap_or_else(|| convert::detect_kind(definition))
    }

    async fn run_engine(
        &self,
        kind: WorkflowKind,
        workflow: &Workflow,
        definition: &WorkflowDefinition,
        execution_id: ExecutionId,
        input: Value,
    ) -> ServiceResult<EngineOutcome> {
        match kind {
            WorkflowKind::Graph => {
                let graph = self.engine.compile(definition)?;
                let options = RunOptions::new().with_checkpoints(execution_id);
                let outcome = self.engine.run(&graph, input, options).await?;
                Ok(EngineOutcome {
                    output: outcome.output,
                    state: Some(outcome.state),
                    tool_calls: Vec::new(),
                    reasoning_steps: Vec::new(),
                })
            }
            WorkflowKind::Chain => {
                let spec = convert::to_linear_chain(definition);
                let outcome = self
                    .chain
                    .execute(&spec, workflow.llm_config.as_ref(), input)
                    .await;
                if outcome.success {
                    Ok(EngineOutcome {
                        output: outcome.output,
                        state: None,
                        tool_calls: Vec::new(),
                        reasoning_steps: Vec::new(),
                    })
                } else {
                    Err(ServiceError::Runtime(
                        weft_runtime::WorkflowError::execution(
                            outcome
                                .error
                                .unwrap_or_else(|| "chain execution failed".to_owned()),
                        ),
                    ))
                }
            }
            WorkflowKind::Agent => {
                let config = workflow
                    .agent_config
                    .as_ref()
                    .ok_or(ServiceError::MissingConfig("agent"))?;
                let input_text = match &input {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                let outcome = self.agent.execute(config, &input_text).await?;
                Ok(EngineOutcome {
                    output: Value::String(outcome.output),
                    state: None,
                    tool_calls: outcome.tool_calls,
                    reasoning_steps: outcome.reasoning_steps,
                })
            }
        }
    }
}

/// Normalized result from any of the three engines.
struct EngineOutcome {
    output: Value,
    state: Option<ExecutionState>,
    tool_calls: Vec<ToolCall>,
    reasoning_steps: Vec<String>,
}

impl std::fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use weft_runtime::WorkflowResult;
    use weft_runtime::definition::{AgentConfig, AgentType, Connection, Node, NodeKind};
    use weft_runtime::provider::{ChatMessage, LlmHandle};

    use super::*;
    use crate::store::InMemoryWorkflowStore;
    use crate::tools::ToolRegistry;

    struct StubBackend;

    #[async_trait::async_trait]
    impl CompletionBackend for StubBackend {
        async fn complete(
            &self,
            _handle: &LlmHandle,
            messages: &[ChatMessage],
        ) -> WorkflowResult<String> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("llm:{last}"))
        }
    }

    fn graph_definition() -> WorkflowDefinition {
        WorkflowDefinition::new()
            .with_node(Node::new("in", NodeKind::Input))
            .with_node(
                Node::new("llm", NodeKind::Llm).with_data(
                    json!({"provider": "openai", "model": "gpt-4"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                ),
            )
            .with_connection(Connection::new("c1", "in", "llm"))
    }

    async fn executor_with(
        workflow: Workflow,
        definition: WorkflowDefinition,
    ) -> (WorkflowExecutor, WorkflowId) {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let id = store.insert(workflow, definition).await;
        let tools = Arc::new(ToolRegistry::new());
        let executor = WorkflowExecutor::new(store, tools, Arc::new(StubBackend));
        (executor, id)
    }

    #[tokio::test]
    async fn test_execute_graph_workflow() {
        let workflow = Workflow::new("g").with_kind(WorkflowKind::Graph);
        let (executor, id) = executor_with(workflow, graph_definition()).await;

        let execution = executor.execute(&id, json!("hi")).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.output, Some(json!("llm:hi")));
        assert!(execution.state.is_some());
        assert!(execution.duration_ms.unwrap() >= 0);
    }

    #[tokio::test]
    async fn test_execute_detects_kind_when_unset() {
        let (executor, id) = executor_with(Workflow::new("auto"), graph_definition()).await;

        // in + llm with fewer connections than nodes detects as chain.
        let execution = executor.execute(&id, json!("hi")).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.output, Some(json!("llm:hi")));
    }

    #[tokio::test]
    async fn test_execute_agent_workflow() {
        let workflow = Workflow::new("a")
            .with_kind(WorkflowKind::Agent)
            .with_agent_config(AgentConfig {
                agent_type: AgentType::React,
                provider: "openai".into(),
                model: "gpt-4".into(),
                temperature: None,
                max_tokens: None,
                system_message: None,
                tools: vec![],
            });
        let (executor, id) = executor_with(workflow, graph_definition()).await;

        let execution = executor.execute(&id, json!("task")).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.output, Some(json!("llm:task")));
    }

    #[tokio::test]
    async fn test_execute_agent_without_config_fails_record() {
        let workflow = Workflow::new("a").with_kind(WorkflowKind::Agent);
        let (executor, id) = executor_with(workflow, graph_definition()).await;

        let execution = executor.execute(&id, json!("task")).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error.unwrap().contains("agent"));
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_definition() {
        let definition = WorkflowDefinition::new()
            .with_node(Node::new("a", NodeKind::Input))
            .with_node(Node::new("a", NodeKind::Output));
        let (executor, id) = executor_with(Workflow::new("dup"), definition).await;

        let err = executor.execute(&id, json!({})).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidWorkflow { .. }));
        // No execution record was created.
        assert!(executor.registry().list_by_workflow(&id, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_execute_tool_failure_marks_record_failed() {
        let definition = WorkflowDefinition::new()
            .with_node(Node::new("t", NodeKind::Tool).with_tool_id("missing"));
        let workflow = Workflow::new("t").with_kind(WorkflowKind::Graph);
        let (executor, id) = executor_with(workflow, definition).await;

        let execution = executor.execute(&id, json!({})).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error.unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_stream_workflow_settles_record() {
        let workflow = Workflow::new("g").with_kind(WorkflowKind::Graph);
        let (executor, id) = executor_with(workflow, graph_definition()).await;

        let (execution_id, stream) = executor.stream_workflow(&id, json!("hi")).await.unwrap();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.last(), Some(&ExecutionEvent::Completed));
        let record = executor.registry().get(&execution_id).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.output, Some(json!("llm:hi")));
    }

    #[tokio::test]
    async fn test_cancel_makes_next_streamed_event_cancelled() {
        let workflow = Workflow::new("g").with_kind(WorkflowKind::Graph);
        let (executor, id) = executor_with(workflow, graph_definition()).await;

        let (execution_id, mut stream) =
            executor.stream_workflow(&id, json!("hi")).await.unwrap();

        // Consume the first node's event, then cancel.
        let first = stream.next().await.unwrap();
        assert!(matches!(first, ExecutionEvent::Running { .. }));

        executor.cancel(&execution_id).await.unwrap();
        assert_eq!(stream.next().await, Some(ExecutionEvent::Cancelled));
        assert_eq!(stream.next().await, None);

        let record = executor.registry().get(&execution_id).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_execution_polls_until_terminal() {
        let workflow = Workflow::new("c");
        let (executor, id) = executor_with(workflow, graph_definition()).await;

        let execution = executor.execute(&id, json!("hi")).await.unwrap();
        let updates: Vec<_> = executor
            .stream_execution(&execution.id)
            .await
            .unwrap()
            .collect()
            .await;

        // Already terminal: a single update ends the stream.
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, ExecutionStatus::Completed);
        assert_eq!(updates[0].output, Some(json!("llm:hi")));
    }

    #[tokio::test]
    async fn test_stream_execution_unknown_id() {
        let (executor, _) = executor_with(Workflow::new("x"), graph_definition()).await;
        let err = executor.stream_execution(&ExecutionId::new()).await.err().unwrap();
        assert!(matches!(err, ServiceError::ExecutionNotFound(_)));
    }
}
