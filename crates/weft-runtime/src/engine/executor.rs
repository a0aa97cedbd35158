//! Graph execution engine.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::checkpoint::{Checkpoint, CheckpointKind, CheckpointStore, ExecutionId};
use super::config::EngineConfig;
use super::graph::ExecutionGraph;
use super::state::ExecutionState;
use super::stream::{EventStream, ExecutionEvent};
use crate::convert::{self, GraphNode};
use crate::definition::{NodeKind, WorkflowDefinition};
use crate::error::{WorkflowError, WorkflowResult};
use crate::provider::{
    CompletionBackend, LlmNodeConfig, LlmService, ToolResolver, build_messages,
};
use crate::retry::with_retry;
use crate::transform::{self, TransformSpec};
use crate::{TRACING_TARGET, schema};

/// The graph execution engine.
///
/// Compiles workflow definitions into executable graphs and runs them
/// node by node, propagating a shared state. Concurrent executions of
/// different ids run in parallel up to the configured limit; a suspended
/// node call (tool or LLM I/O) never blocks other executions.
pub struct Engine {
    config: EngineConfig,
    tools: Arc<dyn ToolResolver>,
    llm: LlmService,
    checkpoints: CheckpointStore,
    semaphore: Arc<Semaphore>,
}

impl Engine {
    /// Creates an engine with the default configuration.
    pub fn new(tools: Arc<dyn ToolResolver>, backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_config(EngineConfig::default(), tools, backend)
    }

    /// Creates an engine with a custom configuration.
    pub fn with_config(
        config: EngineConfig,
        tools: Arc<dyn ToolResolver>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_runs));
        let checkpoints = CheckpointStore::new(config.checkpoint_capacity);

        tracing::info!(
            target: TRACING_TARGET,
            max_concurrent_runs = config.max_concurrent_runs,
            call_timeout_secs = config.call_timeout.as_secs(),
            "Graph engine initialized"
        );

        Self {
            config,
            tools,
            llm: LlmService::new(backend),
            checkpoints,
            semaphore,
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the number of available execution slots.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Compiles a workflow definition into an executable graph.
    ///
    /// The entry point is the first input node, or the first node when no
    /// input node exists. An invalid state schema is dropped with a warning
    /// rather than failing compilation; structural violations (no nodes,
    /// dangling edges, duplicate ids, cycles) fail with a compilation error.
    pub fn compile(&self, definition: &WorkflowDefinition) -> WorkflowResult<ExecutionGraph> {
        let config = convert::to_execution_graph(definition);

        if config.nodes.is_empty() {
            return Err(WorkflowError::GraphCompilation {
                node_id: None,
                message: "workflow must have at least one node".into(),
            });
        }

        let state_schema = match &config.state_schema {
            Value::Null => Value::Null,
            candidate => match schema::check_schema(candidate) {
                Ok(()) => candidate.clone(),
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        error = %err,
                        "Invalid state schema, compiling without one"
                    );
                    Value::Null
                }
            },
        };

        let entry = config
            .nodes
            .iter()
            .find(|n| n.kind.is_input())
            .unwrap_or(&config.nodes[0])
            .id
            .clone();

        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        for node in config.nodes {
            let id = node.id.clone();
            let index = graph.add_node(node);
            if node_indices.insert(id.clone(), index).is_some() {
                return Err(WorkflowError::GraphCompilation {
                    node_id: Some(id),
                    message: "duplicate node id".into(),
                });
            }
        }

        for edge in &config.edges {
            if edge.target.is_terminal() {
                // Terminal-marker edges end the graph; nothing to wire.
                continue;
            }
            let source = node_indices.get(&edge.source).ok_or_else(|| {
                WorkflowError::GraphCompilation {
                    node_id: Some(edge.source.clone()),
                    message: "edge references unknown source node".into(),
                }
            })?;
            let target = node_indices.get(&edge.target).ok_or_else(|| {
                WorkflowError::GraphCompilation {
                    node_id: Some(edge.target.clone()),
                    message: "edge references unknown target node".into(),
                }
            })?;
            graph.add_edge(*source, *target, ());
        }

        if is_cyclic_directed(&graph) {
            return Err(WorkflowError::GraphCompilation {
                node_id: None,
                message: "workflow contains a cycle".into(),
            });
        }

        Ok(ExecutionGraph::new(graph, node_indices, entry, state_schema))
    }

    /// Executes a compiled graph to completion.
    ///
    /// State is seeded from schema defaults overlaid with `{input}`;
    /// schema validation of the seeded state is warn-only and never blocks
    /// the run. Node failures propagate with their typed error intact.
    pub async fn run(
        &self,
        graph: &ExecutionGraph,
        input: Value,
        options: RunOptions,
    ) -> WorkflowResult<RunOutcome> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| WorkflowError::execution(format!("semaphore closed: {e}")))?;

        let state_schema = options
            .state_schema
            .clone()
            .filter(|s| !s.is_null())
            .unwrap_or_else(|| graph.state_schema().clone());

        let defaults = if state_schema.is_null() {
            Map::new()
        } else {
            schema::defaults(&state_schema)
        };
        let mut state = ExecutionState::seed(defaults, input);

        if !state_schema.is_null() {
            if let Err(err) = schema::validate_against(&state.to_value(), &state_schema) {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %err,
                    "Initial state does not satisfy the schema"
                );
            }
        }

        if options.checkpoint {
            if let Some(execution_id) = options.execution_id {
                self.checkpoints
                    .record(
                        execution_id,
                        Checkpoint::now(CheckpointKind::Initial, state.clone()),
                    )
                    .await;
            }
        }

        let order = graph.execution_order()?;
        tracing::debug!(
            target: TRACING_TARGET,
            node_count = order.len(),
            "Starting graph execution"
        );

        for node_id in &order {
            let node = graph.node(node_id).ok_or_else(|| {
                WorkflowError::execution(format!("compiled graph lost node {node_id}"))
            })?;
            let delta = self
                .execute_node(node, &state)
                .await
                .map_err(|err| escalate(err, options.execution_id))?;
            state = state.merged(&delta);
        }

        if options.checkpoint {
            if let Some(execution_id) = options.execution_id {
                self.checkpoints
                    .record(
                        execution_id,
                        Checkpoint::now(CheckpointKind::Final, state.clone()),
                    )
                    .await;
            }
        }

        let checkpoints = match options.execution_id {
            Some(execution_id) => self.checkpoints.get(&execution_id).await,
            None => Vec::new(),
        };

        let output = state
            .get("output")
            .cloned()
            .unwrap_or_else(|| state.to_value());

        Ok(RunOutcome {
            output,
            state,
            success: true,
            checkpoints,
        })
    }

    /// Streams a graph execution as a lazy, pull-based event sequence.
    ///
    /// Emits one `running` event per completed node. The cancellation token
    /// is checked only at node boundaries: an in-flight node call is never
    /// interrupted, and on cancellation the stream emits a final
    /// `cancelled` event and stops advancing.
    pub fn stream<'a>(
        &'a self,
        graph: &'a ExecutionGraph,
        input: Value,
        cancellation: CancellationToken,
    ) -> EventStream<'a> {
        Box::pin(async_stream::stream! {
            let mut state = ExecutionState::seed(Map::new(), input);

            let order = match graph.execution_order() {
                Ok(order) => order,
                Err(err) => {
                    yield ExecutionEvent::Error { error: err.to_string() };
                    return;
                }
            };

            for node_id in order {
                if cancellation.is_cancelled() {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        node_id = %node_id,
                        "Execution cancelled at node boundary"
                    );
                    yield ExecutionEvent::Cancelled;
                    return;
                }

                let Some(node) = graph.node(&node_id) else {
                    yield ExecutionEvent::Error {
                        error: format!("compiled graph lost node {node_id}"),
                    };
                    return;
                };

                match self.execute_node(node, &state).await {
                    Ok(delta) => {
                        state = state.merged(&delta);
                        yield ExecutionEvent::Running { node_id, state: delta };
                    }
                    Err(err) => {
                        yield ExecutionEvent::Error { error: err.to_string() };
                        return;
                    }
                }
            }

            yield ExecutionEvent::Completed;
        })
    }

    /// Returns the checkpoints recorded for an execution.
    pub async fn get_checkpoints(&self, execution_id: &ExecutionId) -> Vec<Checkpoint> {
        self.checkpoints.get(execution_id).await
    }

    /// Clears the checkpoints recorded for an execution.
    pub async fn clear_checkpoints(&self, execution_id: &ExecutionId) {
        self.checkpoints.clear(execution_id).await
    }

    /// Executes a single node against the current state, returning the
    /// partial update to merge.
    async fn execute_node(
        &self,
        node: &GraphNode,
        state: &ExecutionState,
    ) -> WorkflowResult<Map<String, Value>> {
        match node.kind {
            NodeKind::Input => {
                let mut delta = Map::new();
                delta.insert("input".to_owned(), state.input());
                Ok(delta)
            }
            NodeKind::Tool if node.tool_id.is_some() => self.execute_tool_node(node, state).await,
            NodeKind::Llm => self.execute_llm_node(node, state).await,
            NodeKind::Transform => self.execute_transform_node(node, state),
            // Output, condition, and unreferenced tool nodes pass through.
            _ => Ok(passthrough(node, state)),
        }
    }

    async fn execute_tool_node(
        &self,
        node: &GraphNode,
        state: &ExecutionState,
    ) -> WorkflowResult<Map<String, Value>> {
        let tool_id = node.tool_id.clone().unwrap_or_else(|| "".into());
        let as_tool_error = |err: WorkflowError| match err {
            tool @ WorkflowError::ToolExecution { .. } => tool,
            other => WorkflowError::ToolExecution {
                tool_id: tool_id.clone(),
                message: format!("tool execution failed: {other}"),
            },
        };

        let tool = self
            .tools
            .get_tool(&tool_id)
            .await
            .map_err(as_tool_error)?
            .ok_or_else(|| WorkflowError::ToolExecution {
                tool_id: tool_id.clone(),
                message: format!("tool {tool_id} not found"),
            })?;

        let args = state.input();
        let timeout = self.config.call_timeout;
        let (tool_ref, args_ref, id_ref) = (&tool, &args, &tool_id);
        let output = with_retry(&self.config.retry, || async move {
            tokio::time::timeout(timeout, self.tools.invoke(tool_ref, args_ref))
                .await
                .unwrap_or_else(|_| {
                    Err(WorkflowError::ToolExecution {
                        tool_id: id_ref.clone(),
                        message: format!("tool call timed out after {}s", timeout.as_secs()),
                    })
                })
        })
        .await
        .map_err(as_tool_error)?;

        tracing::info!(
            target: TRACING_TARGET,
            node_id = %node.id,
            tool_id = %tool_id,
            "Tool node executed"
        );

        let mut delta = Map::new();
        delta.insert("output".to_owned(), Value::String(output));
        delta.insert("node_id".to_owned(), Value::String(node.id.to_string()));
        Ok(delta)
    }

    async fn execute_llm_node(
        &self,
        node: &GraphNode,
        state: &ExecutionState,
    ) -> WorkflowResult<Map<String, Value>> {
        let config = LlmNodeConfig::from_node_data(&node.config).map_err(|err| match err {
            WorkflowError::LlmExecution {
                provider,
                model,
                message,
                ..
            } => WorkflowError::LlmExecution {
                provider,
                model,
                node_id: Some(node.id.clone()),
                message,
            },
            other => other,
        })?;

        let provider = config.params.provider.to_string();
        let model = config.params.model.clone();
        let as_llm_error = |err: WorkflowError| match err {
            WorkflowError::LlmExecution {
                provider,
                model,
                node_id,
                message,
            } => WorkflowError::LlmExecution {
                provider,
                model,
                node_id: node_id.or_else(|| Some(node.id.clone())),
                message,
            },
            other => WorkflowError::LlmExecution {
                provider: provider.clone(),
                model: model.clone(),
                node_id: Some(node.id.clone()),
                message: format!("llm execution failed: {other}"),
            },
        };

        let handle = self.llm.create_model(config.params.clone()).await;

        let input = state
            .get("input")
            .cloned()
            .or_else(|| state.get("output").cloned())
            .unwrap_or_else(|| Value::String(String::new()));
        let messages = build_messages(&input, config.system_message.as_deref());

        let timeout = self.config.call_timeout;
        let (handle_ref, messages_ref) = (&handle, &messages);
        let (provider_ref, model_ref, node_ref) = (&provider, &model, &node.id);
        let response = with_retry(&self.config.retry, || async move {
            tokio::time::timeout(timeout, self.llm.invoke(handle_ref, messages_ref))
                .await
                .unwrap_or_else(|_| {
                    Err(WorkflowError::LlmExecution {
                        provider: provider_ref.clone(),
                        model: model_ref.clone(),
                        node_id: Some(node_ref.clone()),
                        message: format!("llm call timed out after {}s", timeout.as_secs()),
                    })
                })
        })
        .await
        .map_err(as_llm_error)?;

        tracing::info!(
            target: TRACING_TARGET,
            node_id = %node.id,
            provider = %provider,
            model = %model,
            "LLM node executed"
        );

        let mut llm_response = Map::new();
        llm_response.insert("provider".to_owned(), Value::String(provider));
        llm_response.insert("model".to_owned(), Value::String(model));
        llm_response.insert("response".to_owned(), Value::String(response.clone()));

        let mut delta = Map::new();
        delta.insert("output".to_owned(), Value::String(response));
        delta.insert("node_id".to_owned(), Value::String(node.id.to_string()));
        delta.insert("llm_response".to_owned(), Value::Object(llm_response));
        Ok(delta)
    }

    fn execute_transform_node(
        &self,
        node: &GraphNode,
        state: &ExecutionState,
    ) -> WorkflowResult<Map<String, Value>> {
        let Some(spec_value) = node.config.get("transform") else {
            return Ok(passthrough(node, state));
        };

        let spec = TransformSpec::from_value(spec_value).map_err(|err| {
            WorkflowError::TransformExecution {
                transform_type: guess_transform_type(spec_value),
                node_id: node.id.clone(),
                message: format!("invalid transform spec: {err}"),
            }
        })?;

        let output = transform::apply(&state.input(), &spec);

        let mut delta = Map::new();
        delta.insert("output".to_owned(), output);
        delta.insert("node_id".to_owned(), Value::String(node.id.to_string()));
        Ok(delta)
    }
}

/// Passthrough delta: the node's output is the current input.
fn passthrough(node: &GraphNode, state: &ExecutionState) -> Map<String, Value> {
    let mut delta = Map::new();
    delta.insert("output".to_owned(), state.input());
    delta.insert("node_id".to_owned(), Value::String(node.id.to_string()));
    delta
}

/// Best-effort transform type name for error context.
fn guess_transform_type(spec: &Value) -> String {
    spec.as_str()
        .or_else(|| spec.get("type").and_then(Value::as_str))
        .unwrap_or("unknown")
        .to_owned()
}

/// Keeps typed node errors intact and wraps anything else into a generic
/// execution error carrying the execution id.
fn escalate(err: WorkflowError, execution_id: Option<ExecutionId>) -> WorkflowError {
    match err {
        typed @ (WorkflowError::LlmExecution { .. }
        | WorkflowError::ToolExecution { .. }
        | WorkflowError::TransformExecution { .. }
        | WorkflowError::Cancelled) => typed,
        other => {
            let message = match execution_id {
                Some(id) => format!("graph execution failed for {id}: {other}"),
                None => format!("graph execution failed: {other}"),
            };
            tracing::error!(target: TRACING_TARGET, error = %other, "Graph execution failed");
            WorkflowError::Execution {
                code: "GRAPH_EXECUTION_ERROR",
                message,
            }
        }
    }
}

/// Options for a single graph run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides the graph's state schema for seeding/validation.
    pub state_schema: Option<Value>,
    /// Whether to record initial/final checkpoints.
    pub checkpoint: bool,
    /// Execution id used to key checkpoints.
    pub execution_id: Option<ExecutionId>,
}

impl RunOptions {
    /// Creates default options: no schema override, no checkpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the state schema override.
    pub fn with_state_schema(mut self, schema: Value) -> Self {
        self.state_schema = Some(schema);
        self
    }

    /// Enables checkpointing under the given execution id.
    pub fn with_checkpoints(mut self, execution_id: ExecutionId) -> Self {
        self.checkpoint = true;
        self.execution_id = Some(execution_id);
        self
    }
}

/// Result of a completed graph run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The `output` state field, falling back to the whole final state.
    pub output: Value,
    /// The final execution state.
    pub state: ExecutionState,
    /// Whether the run completed.
    pub success: bool,
    /// Checkpoints recorded for this execution, when enabled.
    pub checkpoints: Vec<Checkpoint>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("available_slots", &self.available_slots())
            .finish_non_exhaustive()
    }
}
