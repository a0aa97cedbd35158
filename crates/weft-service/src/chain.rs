//! Sequential chain engine.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use weft_runtime::convert::{ChainSpec, GraphNode};
use weft_runtime::definition::NodeKind;
use weft_runtime::provider::{
    CompletionBackend, LlmNodeConfig, LlmParams, LlmProvider, LlmService, build_messages,
};
use weft_runtime::retry::{RetryPolicy, with_retry};
use weft_runtime::transform::{self, TransformSpec};
use weft_runtime::{WorkflowError, WorkflowResult};

use crate::TRACING_TARGET;

/// Result of a chain run.
///
/// Chain failures are reported in the outcome rather than returned as an
/// error, so a failed chain still yields a record-able result.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    /// Final value produced by the chain; `Null` on failure.
    pub output: Value,
    /// Whether the chain ran to completion.
    pub success: bool,
    /// Failure description, when unsuccessful.
    pub error: Option<String>,
}

/// Executes linear chains node by node.
///
/// LLM nodes invoke the completion collaborator with the running value,
/// transform nodes reshape it, and everything else passes it through.
pub struct ChainEngine {
    llm: LlmService,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ChainEngine {
    /// Creates a chain engine with default retry and timeout settings.
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_policy(backend, RetryPolicy::default(), Duration::from_secs(30))
    }

    /// Creates a chain engine with explicit retry and timeout settings.
    pub fn with_policy(
        backend: Arc<dyn CompletionBackend>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            llm: LlmService::new(backend),
            retry,
            call_timeout,
        }
    }

    /// Runs a chain against an input value.
    ///
    /// `defaults` supplies LLM parameters for nodes that carry none of
    /// their own.
    pub async fn execute(
        &self,
        spec: &ChainSpec,
        defaults: Option<&LlmParams>,
        input: Value,
    ) -> ChainOutcome {
        match self.run_nodes(spec, defaults, input).await {
            Ok(output) => ChainOutcome {
                output,
                success: true,
                error: None,
            },
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %err,
                    "Chain execution failed"
                );
                ChainOutcome {
                    output: Value::Null,
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn run_nodes(
        &self,
        spec: &ChainSpec,
        defaults: Option<&LlmParams>,
        input: Value,
    ) -> WorkflowResult<Value> {
        let mut value = input;

        for node in &spec.nodes {
            match node.kind {
                NodeKind::Llm => {
                    let (params, system_message) = self.resolve_params(node, defaults)?;
                    let handle = self.llm.create_model(params).await;
                    let messages = build_messages(&value, system_message.as_deref());

                    let timeout = self.call_timeout;
                    let (handle_ref, messages_ref) = (&handle, &messages);
                    let response = with_retry(&self.retry, || async move {
                        tokio::time::timeout(
                            timeout,
                            self.llm.invoke(handle_ref, messages_ref),
                        )
                        .await
                        .unwrap_or_else(|_| {
                            Err(WorkflowError::LlmExecution {
                                provider: handle_ref.provider_name(),
                                model: handle_ref.model_name().to_owned(),
                                node_id: Some(node.id.clone()),
                                message: format!(
                                    "llm call timed out after {}s",
                                    timeout.as_secs()
                                ),
                            })
                        })
                    })
                    .await?;

                    value = Value::String(response);
                }
                NodeKind::Transform => {
                    let spec_value = spec
                        .transforms
                        .get(node.id.as_str())
                        .or_else(|| node.config.get("transform"));
                    let Some(spec_value) = spec_value else {
                        continue;
                    };

                    // A transform node's config may be the spec itself or
                    // wrap it under a `transform` key.
                    let spec_value = spec_value.get("transform").unwrap_or(spec_value);
                    let parsed = TransformSpec::from_value(spec_value).map_err(|err| {
                        WorkflowError::TransformExecution {
                            transform_type: spec_value
                                .as_str()
                                .or_else(|| spec_value.get("type").and_then(Value::as_str))
                                .unwrap_or("unknown")
                                .to_owned(),
                            node_id: node.id.clone(),
                            message: format!("invalid transform spec: {err}"),
                        }
                    })?;

                    value = transform::apply(&value, &parsed);
                }
                // Input, output, tool, and condition nodes pass the value
                // through in a chain.
                _ => {}
            }
        }

        Ok(value)
    }

    fn resolve_params(
        &self,
        node: &GraphNode,
        defaults: Option<&LlmParams>,
    ) -> WorkflowResult<(LlmParams, Option<String>)> {
        let has_own_config = node.config.contains_key("llm")
            || node.config.contains_key("provider")
            || node.config.contains_key("model");

        if has_own_config {
            let config = LlmNodeConfig::from_node_data(&node.config)?;
            return Ok((config.params, config.system_message));
        }

        let params = defaults
            .cloned()
            .unwrap_or_else(|| LlmParams::new(LlmProvider::OpenAi, "gpt-4"));
        Ok((params, None))
    }
}

impl std::fmt::Debug for ChainEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEngine")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use weft_runtime::convert::to_linear_chain;
    use weft_runtime::definition::{Connection, Node, WorkflowDefinition};
    use weft_runtime::provider::{ChatMessage, LlmHandle};

    use super::*;

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

    fn engine() -> ChainEngine {
        ChainEngine::with_policy(
            Arc::new(StubBackend),
            RetryPolicy::builder().with_max_attempts(1u32).build().unwrap(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_chain_threads_value_through_nodes() {
        let def = WorkflowDefinition::new()
            .with_node(Node::new("in", NodeKind::Input))
            .with_node(
                Node::new("llm", NodeKind::Llm).with_data(
                    json!({"provider": "openai", "model": "gpt-4"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                ),
            )
            .with_node(
                Node::new("shout", NodeKind::Transform).with_data(
                    json!({"transform": "uppercase"}).as_object().cloned().unwrap(),
                ),
            )
            .with_connection(Connection::new("c1", "in", "llm"))
            .with_connection(Connection::new("c2", "llm", "shout"));
        let spec = to_linear_chain(&def);

        let outcome = engine().execute(&spec, None, json!("hi")).await;
        assert!(outcome.success);
        assert_eq!(outcome.output, json!("LLM:HI"));
    }

    #[tokio::test]
    async fn test_chain_uses_default_llm_params() {
        let def = WorkflowDefinition::new().with_node(Node::new("llm", NodeKind::Llm));
        let spec = to_linear_chain(&def);

        let defaults = LlmParams::new(LlmProvider::Anthropic, "claude-3-haiku");
        let outcome = engine().execute(&spec, Some(&defaults), json!("q")).await;
        assert!(outcome.success);
        assert_eq!(outcome.output, json!("llm:q"));
    }

    #[tokio::test]
    async fn test_chain_failure_is_reported_in_outcome() {
        let def = WorkflowDefinition::new().with_node(
            Node::new("llm", NodeKind::Llm).with_data(
                json!({"provider": "mistral", "model": "large"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
        );
        let spec = to_linear_chain(&def);

        let outcome = engine().execute(&spec, None, json!("q")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.output, Value::Null);
        assert!(outcome.error.unwrap().contains("mistral"));
    }
}
