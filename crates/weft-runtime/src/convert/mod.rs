//! Conversion of workflow definitions into engine-facing shapes.
//!
//! A [`WorkflowDefinition`] can be rendered three ways:
//! - [`to_execution_graph`]: the engine-neutral graph form consumed by the
//!   graph engine
//! - [`to_linear_chain`]: nodes in dependency order for the chain engine
//! - [`to_agent_spec`]: LLM/tool extraction for the agent engine
//!
//! [`detect_kind`] guesses which engine fits a definition. The heuristic is
//! best-effort and may misclassify; callers needing precision set the
//! workflow kind explicitly.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display as StrumDisplay, EnumString};

use crate::definition::{AgentType, ChainType, Node, NodeId, NodeKind, WorkflowDefinition};
use crate::provider::ToolId;

/// Which engine a workflow runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(StrumDisplay, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowKind {
    /// Full graph execution with per-node state propagation.
    Graph,
    /// Sequential chain execution.
    Chain,
    /// Single agent with tools.
    Agent,
}

/// A node in the engine-neutral execution graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node ID from the definition.
    pub id: NodeId,
    /// Normalized node kind.
    pub kind: NodeKind,
    /// Display label.
    pub label: String,
    /// Opaque node configuration.
    pub config: Map<String, Value>,
    /// Tool reference for tool nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<ToolId>,
}

impl From<&Node> for GraphNode {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            kind: node.kind,
            label: node.label.clone(),
            config: node.data.clone(),
            tool_id: node.tool_id.clone(),
        }
    }
}

/// A directed edge in the engine-neutral execution graph.
///
/// A terminal-marker target (see [`NodeId::is_terminal`]) means "connect to
/// the graph terminal" rather than to another node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node ID.
    pub source: NodeId,
    /// Target node ID or terminal marker.
    pub target: NodeId,
    /// Optional port on the source node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Optional port on the target node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

/// Engine-neutral execution graph derived from a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGraphConfig {
    /// Graph nodes, one per definition node.
    pub nodes: Vec<GraphNode>,
    /// Directed edges, one per definition connection.
    pub edges: Vec<GraphEdge>,
    /// State schema carried over from the definition.
    #[serde(default)]
    pub state_schema: Value,
}

/// Converts a definition into the engine-neutral execution graph.
///
/// Nodes map 1:1 (kinds are already normalized by deserialization) and each
/// connection becomes a directed edge.
pub fn to_execution_graph(def: &WorkflowDefinition) -> ExecutionGraphConfig {
    ExecutionGraphConfig {
        nodes: def.nodes.iter().map(GraphNode::from).collect(),
        edges: def
            .connections
            .iter()
            .map(|conn| GraphEdge {
                source: conn.source.clone(),
                target: conn.target.clone(),
                source_handle: conn.source_handle.clone(),
                target_handle: conn.target_handle.clone(),
            })
            .collect(),
        state_schema: def.state_schema.clone().unwrap_or_default(),
    }
}

/// Linear chain derived from a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
    /// Chain composition strategy.
    pub chain_type: ChainType,
    /// Nodes in dependency order.
    pub nodes: Vec<GraphNode>,
    /// Transform specs collected from transform nodes, keyed by node ID.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub transforms: Map<String, Value>,
}

/// Converts a definition into a linear chain via topological sort.
///
/// Kahn's algorithm: nodes with zero in-degree seed the queue; removing a
/// node enqueues any successor whose predecessors have all been emitted.
/// Nodes that never qualify (cycles or disconnected islands) are appended
/// at the end in definition order. That fallback is deliberately lenient:
/// definition validation is expected to have rejected cycles already.
pub fn to_linear_chain(def: &WorkflowDefinition) -> ChainSpec {
    let ordered = topological_order(def);

    let mut transforms = Map::new();
    for node in &ordered {
        if node.kind.is_transform() && !node.data.is_empty() {
            transforms.insert(node.id.to_string(), Value::Object(node.data.clone()));
        }
    }

    ChainSpec {
        chain_type: ChainType::Sequential,
        nodes: ordered.into_iter().map(GraphNode::from).collect(),
        transforms,
    }
}

fn topological_order(def: &WorkflowDefinition) -> Vec<&Node> {
    let ids: HashSet<&str> = def.nodes.iter().map(|n| n.id.as_str()).collect();
    let mut incoming: HashMap<&str, Vec<&str>> =
        def.nodes.iter().map(|n| (n.id.as_str(), Vec::new())).collect();
    let mut outgoing: HashMap<&str, Vec<&str>> =
        def.nodes.iter().map(|n| (n.id.as_str(), Vec::new())).collect();

    for conn in &def.connections {
        let (source, target) = (conn.source.as_str(), conn.target.as_str());
        if ids.contains(source) && ids.contains(target) {
            if let Some(targets) = outgoing.get_mut(source) {
                targets.push(target);
            }
            if let Some(sources) = incoming.get_mut(target) {
                sources.push(source);
            }
        }
    }

    let mut queue: VecDeque<&str> = def
        .nodes
        .iter()
        .filter(|n| incoming[n.id.as_str()].is_empty())
        .map(|n| n.id.as_str())
        .collect();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut result: Vec<&Node> = Vec::with_capacity(def.nodes.len());
    let node_map: HashMap<&str, &Node> = def.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        result.push(node_map[id]);

        for &target in &outgoing[id] {
            if incoming[target].iter().all(|source| visited.contains(source)) {
                queue.push_back(target);
            }
        }
    }

    // Leftovers (cyclic or unreachable) keep their definition order.
    for node in &def.nodes {
        if !visited.contains(node.id.as_str()) {
            result.push(node);
        }
    }

    result
}

/// Agent specification derived from a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Agent construction strategy.
    pub agent_type: AgentType,
    /// LLM configuration from the first LLM node.
    #[serde(default)]
    pub llm_config: Map<String, Value>,
    /// Tool IDs collected from tool nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolId>,
    /// System message from the first input node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

/// Converts a definition into an agent specification.
///
/// The first LLM node supplies the agent's LLM configuration, every tool
/// node with a reference contributes a tool, and the first input node may
/// carry a `system_message` in its data.
pub fn to_agent_spec(def: &WorkflowDefinition) -> AgentSpec {
    let llm_config = def
        .first_of_kind(NodeKind::Llm)
        .map(|n| n.data.clone())
        .unwrap_or_default();

    let tools = def
        .nodes_of_kind(NodeKind::Tool)
        .filter_map(|n| n.tool_id.clone())
        .collect();

    let system_message = def
        .first_of_kind(NodeKind::Input)
        .and_then(|n| n.data.get("system_message"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    AgentSpec {
        agent_type: AgentType::React,
        llm_config,
        tools,
        system_message,
    }
}

/// Guesses the engine kind for a definition.
///
/// Condition nodes force the graph engine; an LLM paired with tools and a
/// sparse connection set reads as an agent; denser connectivity than nodes
/// reads as a graph; everything else defaults to a chain.
pub fn detect_kind(def: &WorkflowDefinition) -> WorkflowKind {
    if def.has_kind(NodeKind::Condition) {
        return WorkflowKind::Graph;
    }

    if def.has_kind(NodeKind::Llm) && def.has_kind(NodeKind::Tool) {
        if def.connections.len() <= def.nodes.len() {
            return WorkflowKind::Agent;
        }
        return WorkflowKind::Chain;
    }

    if def.connections.len() > def.nodes.len() {
        return WorkflowKind::Graph;
    }

    WorkflowKind::Chain
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::definition::Connection;

    fn chain_definition() -> WorkflowDefinition {
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
            .with_node(Node::new("out", NodeKind::Output))
            .with_connection(Connection::new("c1", "in", "llm"))
            .with_connection(Connection::new("c2", "llm", "out"))
    }

    #[test]
    fn test_to_execution_graph_maps_nodes_and_edges() {
        let graph = to_execution_graph(&chain_definition());
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.nodes[1].kind, NodeKind::Llm);
        assert_eq!(graph.edges[0].source.as_str(), "in");
    }

    #[test]
    fn test_to_execution_graph_keeps_terminal_marker() {
        let def = WorkflowDefinition::new()
            .with_node(Node::new("a", NodeKind::Input))
            .with_connection(Connection::new("c1", "a", "__end__"));

        let graph = to_execution_graph(&def);
        assert!(graph.edges[0].target.is_terminal());
    }

    #[test]
    fn test_to_linear_chain_dependency_order() {
        // Declare out of order so the sort has to reorder.
        let def = WorkflowDefinition::new()
            .with_node(Node::new("out", NodeKind::Output))
            .with_node(Node::new("llm", NodeKind::Llm))
            .with_node(Node::new("in", NodeKind::Input))
            .with_connection(Connection::new("c1", "in", "llm"))
            .with_connection(Connection::new("c2", "llm", "out"));

        let chain = to_linear_chain(&def);
        let order: Vec<&str> = chain.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, ["in", "llm", "out"]);
        assert_eq!(chain.chain_type, ChainType::Sequential);
    }

    #[test]
    fn test_to_linear_chain_appends_leftovers_in_definition_order() {
        let def = WorkflowDefinition::new()
            .with_node(Node::new("in", NodeKind::Input))
            .with_node(Node::new("a", NodeKind::Transform))
            .with_node(Node::new("b", NodeKind::Transform))
            .with_connection(Connection::new("c1", "a", "b"))
            .with_connection(Connection::new("c2", "b", "a"));

        let chain = to_linear_chain(&def);
        let order: Vec<&str> = chain.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, ["in", "a", "b"]);
    }

    #[test]
    fn test_to_linear_chain_collects_transforms() {
        let def = WorkflowDefinition::new().with_node(
            Node::new("t", NodeKind::Transform)
                .with_data(json!({"transform": "uppercase"}).as_object().cloned().unwrap()),
        );

        let chain = to_linear_chain(&def);
        assert_eq!(chain.transforms["t"], json!({"transform": "uppercase"}));
    }

    #[test]
    fn test_to_agent_spec_extracts_llm_tools_and_system_message() {
        let def = WorkflowDefinition::new()
            .with_node(
                Node::new("in", NodeKind::Input).with_data(
                    json!({"system_message": "be helpful"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                ),
            )
            .with_node(
                Node::new("llm", NodeKind::Llm).with_data(
                    json!({"provider": "anthropic", "model": "claude-3"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                ),
            )
            .with_node(Node::new("t1", NodeKind::Tool).with_tool_id("search"))
            .with_node(Node::new("t2", NodeKind::Tool));

        let spec = to_agent_spec(&def);
        assert_eq!(spec.agent_type, AgentType::React);
        assert_eq!(spec.llm_config["provider"], json!("anthropic"));
        assert_eq!(spec.tools, vec![ToolId::from("search")]);
        assert_eq!(spec.system_message.as_deref(), Some("be helpful"));
    }

    #[test]
    fn test_detect_kind() {
        let condition = WorkflowDefinition::new().with_node(Node::new("c", NodeKind::Condition));
        assert_eq!(detect_kind(&condition), WorkflowKind::Graph);

        assert_eq!(detect_kind(&chain_definition()), WorkflowKind::Chain);

        let agent = WorkflowDefinition::new()
            .with_node(Node::new("llm", NodeKind::Llm))
            .with_node(Node::new("tool", NodeKind::Tool).with_tool_id("t"))
            .with_connection(Connection::new("c1", "llm", "tool"));
        assert_eq!(detect_kind(&agent), WorkflowKind::Agent);
    }
}
