//! Node definition types.

use derive_builder::Builder;
use derive_more::{AsRef, Debug, Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display as StrumDisplay, EnumString};

use crate::provider::ToolId;

/// Unique identifier for a node within a workflow definition.
///
/// Node IDs are caller-supplied (typically by a visual editor, e.g.
/// `"node-1"`) and are only required to be unique within one definition.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into, AsRef)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether this ID is the reserved terminal marker.
    ///
    /// Connections may target `__end__` (or the legacy `END`) instead of a
    /// real node to mean "connect to the graph terminal".
    pub fn is_terminal(&self) -> bool {
        self.0 == "__end__" || self.0 == "END"
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// The kind of a workflow node.
///
/// This is a closed set: definitions carrying an unknown kind fail to
/// deserialize. The legacy `mcp-tool` spelling is accepted for [`Tool`].
///
/// [`Tool`]: NodeKind::Tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(StrumDisplay, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    /// Entry node, passes caller input through.
    Input,
    /// Exit node, passes accumulated state through.
    Output,
    /// Invokes an external tool resolved by ID.
    #[serde(alias = "mcp-tool")]
    Tool,
    /// Invokes an LLM completion.
    Llm,
    /// Applies a declarative data transform.
    Transform,
    /// Conditional routing marker; executes as passthrough.
    Condition,
}

impl NodeKind {
    /// Returns whether this is an input node.
    pub const fn is_input(&self) -> bool {
        matches!(self, NodeKind::Input)
    }

    /// Returns whether this is an output node.
    pub const fn is_output(&self) -> bool {
        matches!(self, NodeKind::Output)
    }

    /// Returns whether this is a tool node.
    pub const fn is_tool(&self) -> bool {
        matches!(self, NodeKind::Tool)
    }

    /// Returns whether this is an LLM node.
    pub const fn is_llm(&self) -> bool {
        matches!(self, NodeKind::Llm)
    }

    /// Returns whether this is a transform node.
    pub const fn is_transform(&self) -> bool {
        matches!(self, NodeKind::Transform)
    }

    /// Returns whether this is a condition node.
    pub const fn is_condition(&self) -> bool {
        matches!(self, NodeKind::Condition)
    }
}

/// Position of a node in the visual editor.
///
/// Carried through (de)serialization but inert at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// A workflow node definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(
    name = "NodeBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with")
)]
pub struct Node {
    /// Unique node ID within the definition.
    pub id: NodeId,
    /// The node kind.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Display label.
    #[serde(default)]
    #[builder(default)]
    pub label: String,
    /// Opaque configuration; its shape depends on the node kind.
    #[serde(default)]
    #[builder(default)]
    pub data: Map<String, Value>,
    /// Tool reference for tool nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub tool_id: Option<ToolId>,
    /// Position in the visual editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub position: Option<Position>,
}

impl Node {
    /// Creates a new node with the given ID and kind.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: String::new(),
            data: Map::new(),
            tool_id: None,
            position: None,
        }
    }

    /// Returns a builder for creating a node.
    pub fn builder() -> NodeBuilder {
        NodeBuilder::default()
    }

    /// Sets the opaque configuration, returning the node.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Sets the tool reference, returning the node.
    pub fn with_tool_id(mut self, tool_id: impl Into<ToolId>) -> Self {
        self.tool_id = Some(tool_id.into());
        self
    }
}
