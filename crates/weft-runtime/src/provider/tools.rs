//! Tool lookup collaborator.

use derive_more::{AsRef, Debug, Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::WorkflowResult;

/// Unique identifier for an external tool.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into, AsRef)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    /// Creates a tool ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ToolId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Definition of an invokable external tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool ID.
    pub id: ToolId,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// JSON-Schema-shaped input schema.
    #[serde(default)]
    pub schema: Value,
}

impl ToolDefinition {
    /// Creates a tool definition with an empty description and schema.
    pub fn new(id: impl Into<ToolId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            schema: Value::Null,
        }
    }

    /// Sets the description, returning the definition.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Resolves and invokes external tools.
///
/// Both operations are async and opaque to the runtime: lookups may be
/// cached upstream, invocations may perform network I/O. Failures surface
/// as tool errors in the execution engine.
#[async_trait::async_trait]
pub trait ToolResolver: Send + Sync {
    /// Returns the tool with the given ID, or `None` if unknown.
    async fn get_tool(&self, id: &ToolId) -> WorkflowResult<Option<ToolDefinition>>;

    /// Invokes a tool with JSON arguments and returns its text output.
    async fn invoke(&self, tool: &ToolDefinition, args: &Value) -> WorkflowResult<String>;
}
