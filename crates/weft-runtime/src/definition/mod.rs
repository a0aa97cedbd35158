//! Workflow definition types.
//!
//! This module contains serializable, frontend-friendly types for defining
//! workflows:
//! - [`WorkflowDefinition`]: the nodes + connections + state-schema body
//! - [`Node`] / [`NodeKind`] / [`NodeId`]: one step in the graph
//! - [`Connection`]: a directed edge between nodes
//! - [`AgentConfig`] / [`ChainConfig`]: engine-specific configuration
//! - [`validate`]: structural validation (accumulating, never failing hard)
//!
//! To execute a workflow, definitions are compiled into runtime form by
//! [`crate::engine::Engine`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod config;
mod connection;
mod node;
pub mod validate;

pub use config::{AgentConfig, AgentType, ChainConfig, ChainType};
pub use connection::{Connection, ConnectionBuilder, ConnectionId};
pub use node::{Node, NodeBuilder, NodeId, NodeKind, Position};
pub use validate::ValidationReport;

/// Serializable workflow definition.
///
/// This is the JSON-friendly representation of a workflow graph as authored
/// by a caller. It is validated by [`validate::validate_definition`] and
/// compiled by the engine; the definition itself enforces nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Nodes in the workflow. IDs must be unique.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Directed connections between nodes.
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// JSON-Schema-shaped description of the execution state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_schema: Option<Value>,
    /// Engine-specific configuration blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_config: Option<Value>,
    /// Visual-editor viewport; carried but inert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Value>,
}

impl WorkflowDefinition {
    /// Creates an empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the node with the given ID, if any.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Returns whether a node with the given ID exists.
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Returns the first node of the given kind, in definition order.
    pub fn first_of_kind(&self, kind: NodeKind) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == kind)
    }

    /// Returns whether any node of the given kind exists.
    pub fn has_kind(&self, kind: NodeKind) -> bool {
        self.first_of_kind(kind).is_some()
    }

    /// Returns an iterator over all nodes of the given kind.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// Adds a node, returning the definition for chaining.
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds a connection, returning the definition for chaining.
    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Sets the state schema, returning the definition for chaining.
    pub fn with_state_schema(mut self, schema: Value) -> Self {
        self.state_schema = Some(schema);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_serialization_round_trip() {
        let def = WorkflowDefinition::new()
            .with_node(Node::new("in", NodeKind::Input))
            .with_node(Node::new("out", NodeKind::Output))
            .with_connection(Connection::new("c1", "in", "out"));

        let json = serde_json::to_string(&def).unwrap();
        let back: WorkflowDefinition = serde_json::from_str(&json).unwrap();

        assert_eq!(def, back);
        assert_eq!(back.nodes.len(), 2);
        assert_eq!(back.connections.len(), 1);
    }

    #[test]
    fn test_first_of_kind_follows_definition_order() {
        let def = WorkflowDefinition::new()
            .with_node(Node::new("a", NodeKind::Llm))
            .with_node(Node::new("b", NodeKind::Llm));

        assert_eq!(def.first_of_kind(NodeKind::Llm).unwrap().id.as_str(), "a");
        assert!(def.first_of_kind(NodeKind::Condition).is_none());
    }
}
