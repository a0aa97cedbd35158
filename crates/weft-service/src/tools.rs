//! In-memory tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use weft_runtime::provider::{ToolDefinition, ToolId, ToolResolver};
use weft_runtime::{WorkflowError, WorkflowResult};

/// Handler invoked when a registered tool is called.
pub type ToolHandler = Arc<dyn Fn(&Value) -> WorkflowResult<String> + Send + Sync>;

/// In-memory [`ToolResolver`] implementation.
///
/// Definitions are held in a read-mostly map; invocation dispatches to the
/// handler registered alongside the definition. Tools registered without a
/// handler resolve but fail on invocation, which keeps misconfiguration
/// visible as a tool error instead of a silent success.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<ToolId, (ToolDefinition, Option<ToolHandler>)>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool definition without an invocation handler.
    pub async fn register(&self, definition: ToolDefinition) {
        self.tools
            .write()
            .await
            .insert(definition.id.clone(), (definition, None));
    }

    /// Registers a tool definition with an invocation handler.
    pub async fn register_with_handler(
        &self,
        definition: ToolDefinition,
        handler: impl Fn(&Value) -> WorkflowResult<String> + Send + Sync + 'static,
    ) {
        self.tools
            .write()
            .await
            .insert(definition.id.clone(), (definition, Some(Arc::new(handler))));
    }

    /// Removes a tool, returning whether it existed.
    pub async fn remove(&self, id: &ToolId) -> bool {
        self.tools.write().await.remove(id).is_some()
    }

    /// Returns the number of registered tools.
    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Returns whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ToolResolver for ToolRegistry {
    async fn get_tool(&self, id: &ToolId) -> WorkflowResult<Option<ToolDefinition>> {
        Ok(self
            .tools
            .read()
            .await
            .get(id)
            .map(|(definition, _)| definition.clone()))
    }

    async fn invoke(&self, tool: &ToolDefinition, args: &Value) -> WorkflowResult<String> {
        let handler = self
            .tools
            .read()
            .await
            .get(&tool.id)
            .and_then(|(_, handler)| handler.clone());

        match handler {
            Some(handler) => handler(args),
            None => Err(WorkflowError::ToolExecution {
                tool_id: tool.id.clone(),
                message: format!("no handler registered for tool {}", tool.id),
            }),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").finish_non_exhaustive()
    }
}
