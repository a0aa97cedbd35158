//! Structural validation of workflow definitions.
//!
//! Validation never fails hard: every function returns a
//! [`ValidationReport`] with accumulated errors, leaving severity to the
//! caller.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use super::{AgentConfig, ChainConfig, Connection, Node, WorkflowDefinition};
use crate::provider::LlmProvider;
use crate::schema;

/// Accumulated validation errors for a definition or config block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<String>,
}

impl ValidationReport {
    /// Creates an empty (valid) report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether no errors were recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the recorded errors.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Consumes the report and returns the recorded errors.
    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }

    /// Records an error.
    pub fn push(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Records every error from `errors`, prefixed with `prefix`.
    fn extend_prefixed(&mut self, prefix: &str, errors: impl IntoIterator<Item = String>) {
        self.errors
            .extend(errors.into_iter().map(|e| format!("{prefix}: {e}")));
    }
}

/// Validates a workflow definition.
///
/// Checks are accumulated rather than short-circuited: a definition with a
/// duplicate ID *and* a cycle reports both.
pub fn validate_definition(def: &WorkflowDefinition) -> ValidationReport {
    let mut report = ValidationReport::new();

    if def.nodes.is_empty() {
        report.push("workflow must have at least one node");
    }

    let mut seen = HashSet::new();
    if def.nodes.iter().any(|n| !seen.insert(n.id.as_str())) {
        report.push("duplicate node IDs found");
    }

    if has_cycle(def) {
        report.push("circular dependencies detected in workflow");
    }

    for node in &def.nodes {
        report.extend_prefixed(&format!("node {}", node.id), validate_node(node));
    }

    for conn in &def.connections {
        report.extend_prefixed(
            &format!("connection {}", conn.id),
            validate_connection(conn, def),
        );
    }

    report
}

/// Detects a directed cycle in the graph induced by the connections.
///
/// Depth-first search with a recursion stack, seeded from every unvisited
/// node so disconnected components are covered. Connections whose source
/// does not exist contribute no edges.
pub fn has_cycle(def: &WorkflowDefinition) -> bool {
    let mut adjacency: HashMap<&str, Vec<&str>> = def
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), Vec::new()))
        .collect();
    for conn in &def.connections {
        if let Some(targets) = adjacency.get_mut(conn.source.as_str()) {
            targets.push(conn.target.as_str());
        }
    }

    let mut visited = HashSet::new();
    let mut stack = HashSet::new();
    def.nodes.iter().any(|node| {
        !visited.contains(node.id.as_str())
            && visit(node.id.as_str(), &adjacency, &mut visited, &mut stack)
    })
}

fn visit<'a>(
    id: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    stack: &mut HashSet<&'a str>,
) -> bool {
    visited.insert(id);
    stack.insert(id);

    for &neighbor in adjacency.get(id).map(Vec::as_slice).unwrap_or_default() {
        if !visited.contains(neighbor) {
            if visit(neighbor, adjacency, visited, stack) {
                return true;
            }
        } else if stack.contains(neighbor) {
            return true;
        }
    }

    stack.remove(id);
    false
}

fn validate_node(node: &Node) -> Vec<String> {
    let mut errors = Vec::new();

    if node.id.as_str().is_empty() {
        errors.push("node ID is required".to_owned());
    }

    if node.kind.is_tool() && node.tool_id.is_none() {
        errors.push("tool node must reference a tool".to_owned());
    }

    if node.kind.is_llm() {
        let nested = node.data.get("llm").and_then(|v| v.as_object());
        let lookup = |key: &str| {
            nested
                .and_then(|llm| llm.get(key))
                .or_else(|| node.data.get(key))
                .and_then(|v| v.as_str())
                .is_some_and(|s| !s.is_empty())
        };
        if !lookup("provider") {
            errors.push("llm node must have provider configuration".to_owned());
        }
        if !lookup("model") {
            errors.push("llm node must have model configuration".to_owned());
        }
    }

    errors
}

fn validate_connection(conn: &Connection, def: &WorkflowDefinition) -> Vec<String> {
    let mut errors = Vec::new();

    if !def.contains_node(&conn.source) {
        errors.push(format!("source node '{}' not found", conn.source));
    }

    if !def.contains_node(&conn.target) && !conn.target.is_terminal() {
        errors.push(format!("target node '{}' not found", conn.target));
    }

    if conn.source == conn.target {
        errors.push("connection cannot connect a node to itself".to_owned());
    }

    errors
}

/// Validates an agent configuration block.
///
/// Agent and chain types are closed enums enforced at deserialization;
/// what remains is provider-set membership and field presence.
pub fn validate_agent_config(config: &AgentConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    if config.provider.is_empty() {
        report.push("LLM provider is required");
    } else if LlmProvider::from_str(&config.provider).is_err() {
        report.push(format!(
            "invalid LLM provider '{}'; valid providers: openai, anthropic",
            config.provider
        ));
    }

    if config.model.is_empty() {
        report.push("LLM model is required");
    }

    report
}

/// Validates a chain configuration block.
pub fn validate_chain_config(config: &ChainConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    if config.nodes.is_empty() {
        report.push("chain must have at least one node");
    }

    report
}

/// Validates the graph-engine configuration carried by a definition.
///
/// Currently this covers the state schema: it must be a structurally valid
/// schema document when present.
pub fn validate_graph_config(def: &WorkflowDefinition) -> ValidationReport {
    let mut report = ValidationReport::new();

    if let Some(state_schema) = &def.state_schema {
        if let Err(err) = schema::check_schema(state_schema) {
            report.push(format!("invalid state schema: {err}"));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::definition::{AgentType, ChainType, Node, NodeKind};

    fn llm_node(id: &str) -> Node {
        Node::new(id, NodeKind::Llm).with_data(
            json!({"provider": "openai", "model": "gpt-4"})
                .as_object()
                .cloned()
                .unwrap(),
        )
    }

    #[test]
    fn test_validate_empty_definition() {
        let report = validate_definition(&WorkflowDefinition::new());
        assert!(!report.is_valid());
        assert!(report.errors()[0].contains("at least one node"));
    }

    #[test]
    fn test_validate_duplicate_node_ids() {
        let def = WorkflowDefinition::new()
            .with_node(Node::new("a", NodeKind::Input))
            .with_node(Node::new("a", NodeKind::Output));

        let report = validate_definition(&def);
        assert!(!report.is_valid());
        assert!(report.errors().iter().any(|e| e.contains("duplicate")));
    }

    #[test]
    fn test_validate_cycle_detected_from_any_component() {
        // Disconnected node first so DFS has to visit multiple components.
        let def = WorkflowDefinition::new()
            .with_node(Node::new("lone", NodeKind::Input))
            .with_node(Node::new("a", NodeKind::Transform))
            .with_node(Node::new("b", NodeKind::Transform))
            .with_connection(Connection::new("c1", "a", "b"))
            .with_connection(Connection::new("c2", "b", "a"));

        assert!(has_cycle(&def));
        let report = validate_definition(&def);
        assert!(report.errors().iter().any(|e| e.contains("circular")));
    }

    #[test]
    fn test_validate_acyclic_chain() {
        let def = WorkflowDefinition::new()
            .with_node(Node::new("in", NodeKind::Input))
            .with_node(llm_node("llm"))
            .with_node(Node::new("out", NodeKind::Output))
            .with_connection(Connection::new("c1", "in", "llm"))
            .with_connection(Connection::new("c2", "llm", "out"));

        assert!(!has_cycle(&def));
        assert!(validate_definition(&def).is_valid());
    }

    #[test]
    fn test_validate_tool_node_requires_reference() {
        let def = WorkflowDefinition::new().with_node(Node::new("t", NodeKind::Tool));

        let report = validate_definition(&def);
        assert!(
            report
                .errors()
                .iter()
                .any(|e| e.contains("must reference a tool"))
        );
    }

    #[test]
    fn test_validate_llm_node_requires_provider_and_model() {
        let def = WorkflowDefinition::new().with_node(Node::new("l", NodeKind::Llm));

        let report = validate_definition(&def);
        assert!(report.errors().iter().any(|e| e.contains("provider")));
        assert!(report.errors().iter().any(|e| e.contains("model")));
    }

    #[test]
    fn test_validate_llm_node_nested_config() {
        let node = Node::new("l", NodeKind::Llm).with_data(
            json!({"llm": {"provider": "anthropic", "model": "claude-3"}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let def = WorkflowDefinition::new().with_node(node);

        assert!(validate_definition(&def).is_valid());
    }

    #[test]
    fn test_validate_connection_endpoints() {
        let def = WorkflowDefinition::new()
            .with_node(Node::new("a", NodeKind::Input))
            .with_connection(Connection::new("c1", "a", "missing"))
            .with_connection(Connection::new("c2", "a", "a"));

        let report = validate_definition(&def);
        assert!(report.errors().iter().any(|e| e.contains("not found")));
        assert!(report.errors().iter().any(|e| e.contains("itself")));
    }

    #[test]
    fn test_validate_connection_accepts_terminal_marker() {
        let def = WorkflowDefinition::new()
            .with_node(Node::new("a", NodeKind::Input))
            .with_connection(Connection::new("c1", "a", "__end__"));

        assert!(validate_definition(&def).is_valid());
    }

    #[test]
    fn test_validate_agent_config() {
        let mut config = AgentConfig {
            agent_type: AgentType::React,
            provider: "openai".into(),
            model: "gpt-4".into(),
            temperature: None,
            max_tokens: None,
            system_message: None,
            tools: vec![],
        };
        assert!(validate_agent_config(&config).is_valid());

        config.provider = "cohere".into();
        config.model = String::new();
        let report = validate_agent_config(&config);
        assert_eq!(report.errors().len(), 2);
    }

    #[test]
    fn test_validate_agent_config_claude_alias() {
        let config = AgentConfig {
            agent_type: AgentType::Conversational,
            provider: "claude".into(),
            model: "claude-3-opus".into(),
            temperature: None,
            max_tokens: None,
            system_message: None,
            tools: vec![],
        };
        assert!(validate_agent_config(&config).is_valid());
    }

    #[test]
    fn test_validate_chain_config() {
        let config = ChainConfig {
            chain_type: ChainType::Sequential,
            nodes: vec![],
            transforms: Default::default(),
        };
        assert!(!validate_chain_config(&config).is_valid());
    }

    #[test]
    fn test_validate_graph_config_bad_schema() {
        let def = WorkflowDefinition::new()
            .with_node(Node::new("a", NodeKind::Input))
            .with_state_schema(json!({"type": 42}));

        let report = validate_graph_config(&def);
        assert!(!report.is_valid());
    }
}
