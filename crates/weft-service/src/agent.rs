//! Agent engine.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use weft_runtime::WorkflowError;
use weft_runtime::definition::{AgentConfig, validate};
use weft_runtime::provider::{
    CompletionBackend, LlmParams, LlmProvider, LlmService, ToolDefinition, ToolResolver,
    build_messages,
};
use weft_runtime::retry::{RetryPolicy, with_retry};

use crate::TRACING_TARGET;
use crate::error::{ServiceError, ServiceResult};
use crate::execution::ToolCall;

/// Result of an agent run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentOutcome {
    /// The agent's final answer.
    pub output: String,
    /// Tool invocations made during the run.
    pub tool_calls: Vec<ToolCall>,
    /// Captured reasoning steps.
    pub reasoning_steps: Vec<String>,
}

/// Executes agent workflows: one configured LLM with a set of tools.
pub struct AgentEngine {
    llm: LlmService,
    tools: Arc<dyn ToolResolver>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl AgentEngine {
    /// Creates an agent engine with default retry and timeout settings.
    pub fn new(tools: Arc<dyn ToolResolver>, backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_policy(
            tools,
            backend,
            RetryPolicy::default(),
            Duration::from_secs(30),
        )
    }

    /// Creates an agent engine with explicit retry and timeout settings.
    pub fn with_policy(
        tools: Arc<dyn ToolResolver>,
        backend: Arc<dyn CompletionBackend>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            llm: LlmService::new(backend),
            tools,
            retry,
            call_timeout,
        }
    }

    /// Runs an agent against input text.
    ///
    /// Tools that fail to resolve are skipped with a warning; the agent
    /// runs with whatever subset resolved.
    pub async fn execute(&self, config: &AgentConfig, input: &str) -> ServiceResult<AgentOutcome> {
        let report = validate::validate_agent_config(config);
        if !report.is_valid() {
            return Err(ServiceError::InvalidWorkflow {
                errors: report.into_errors(),
            });
        }

        let tools = self.resolve_tools(config).await;

        // validate_agent_config already vetted the provider name.
        let provider = LlmProvider::from_str(&config.provider).map_err(|_| {
            ServiceError::Runtime(WorkflowError::LlmExecution {
                provider: config.provider.clone(),
                model: config.model.clone(),
                node_id: None,
                message: format!("unsupported LLM provider '{}'", config.provider),
            })
        })?;

        let mut params = LlmParams::new(provider, config.model.clone());
        params.temperature = config.temperature;
        params.max_tokens = config.max_tokens;
        let handle = self.llm.create_model(params).await;

        let system_message = system_prompt(config, &tools);
        let messages = build_messages(&Value::String(input.to_owned()), Some(&system_message));

        let timeout = self.call_timeout;
        let (handle_ref, messages_ref) = (&handle, &messages);
        let response = with_retry(&self.retry, || async move {
            tokio::time::timeout(timeout, self.llm.invoke(handle_ref, messages_ref))
                .await
                .unwrap_or_else(|_| {
                    Err(WorkflowError::LlmExecution {
                        provider: handle_ref.provider_name(),
                        model: handle_ref.model_name().to_owned(),
                        node_id: None,
                        message: format!("agent call timed out after {}s", timeout.as_secs()),
                    })
                })
        })
        .await?;

        tracing::info!(
            target: TRACING_TARGET,
            agent_type = %config.agent_type,
            tool_count = tools.len(),
            "Agent executed"
        );

        Ok(AgentOutcome {
            output: response,
            tool_calls: Vec::new(),
            reasoning_steps: Vec::new(),
        })
    }

    async fn resolve_tools(&self, config: &AgentConfig) -> Vec<ToolDefinition> {
        let mut tools = Vec::new();
        for tool_id in &config.tools {
            match self.tools.get_tool(tool_id).await {
                Ok(Some(tool)) => tools.push(tool),
                Ok(None) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        tool_id = %tool_id,
                        "Tool not found, skipping"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        tool_id = %tool_id,
                        error = %err,
                        "Tool lookup failed, skipping"
                    );
                }
            }
        }
        tools
    }
}

/// Builds the agent's system prompt from its configuration and tools.
fn system_prompt(config: &AgentConfig, tools: &[ToolDefinition]) -> String {
    let mut prompt = config
        .system_message
        .clone()
        .unwrap_or_else(|| "You are a helpful assistant.".to_owned());

    if !tools.is_empty() {
        prompt.push_str("\n\nAvailable tools:");
        for tool in tools {
            prompt.push_str(&format!("\n- {}: {}", tool.name, tool.description));
        }
    }

    prompt
}

impl std::fmt::Debug for AgentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentEngine")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}
