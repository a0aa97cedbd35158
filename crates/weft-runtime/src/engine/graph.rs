//! Compiled execution graph.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;

use crate::WorkflowError;
use crate::convert::GraphNode;
use crate::definition::NodeId;

/// A workflow compiled into an executable directed acyclic graph.
///
/// Owned by the engine for the duration of a single execution and rebuilt
/// per execution; it is not reused across workflow edits. Terminal-marker
/// connections are recorded as terminal nodes rather than edges.
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    /// The underlying directed graph.
    graph: DiGraph<GraphNode, ()>,
    /// Mapping from node ID to petgraph index.
    node_indices: HashMap<NodeId, NodeIndex>,
    /// Reverse mapping from petgraph index to node ID.
    index_to_id: HashMap<NodeIndex, NodeId>,
    /// Designated entry node.
    entry: NodeId,
    /// State schema carried from the definition.
    state_schema: Value,
}

impl ExecutionGraph {
    pub(crate) fn new(
        graph: DiGraph<GraphNode, ()>,
        node_indices: HashMap<NodeId, NodeIndex>,
        entry: NodeId,
        state_schema: Value,
    ) -> Self {
        let index_to_id = node_indices.iter().map(|(k, v)| (*v, k.clone())).collect();
        Self {
            graph,
            node_indices,
            index_to_id,
            entry,
            state_schema,
        }
    }

    /// Returns the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the designated entry node.
    pub fn entry_point(&self) -> &NodeId {
        &self.entry
    }

    /// Returns the state schema carried from the definition.
    ///
    /// `Null` when the definition carried none (or an invalid one that was
    /// dropped at compile time).
    pub fn state_schema(&self) -> &Value {
        &self.state_schema
    }

    /// Returns a node by ID.
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.node_indices
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Returns an iterator over all nodes with their IDs.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// Returns the successors of a node.
    pub fn successors(&self, id: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.node_indices.get(id).into_iter().flat_map(|&idx| {
            self.graph
                .neighbors_directed(idx, Direction::Outgoing)
                .filter_map(|succ| self.index_to_id.get(&succ))
        })
    }

    /// Returns node IDs in execution (topological) order.
    ///
    /// Compilation already rejected cycles, so this only fails if the graph
    /// was mutated into an inconsistent form.
    pub fn execution_order(&self) -> Result<Vec<NodeId>, WorkflowError> {
        petgraph::algo::toposort(&self.graph, None)
            .map(|indices| {
                indices
                    .into_iter()
                    .filter_map(|idx| self.index_to_id.get(&idx).cloned())
                    .collect()
            })
            .map_err(|_| WorkflowError::execution("cycle detected in compiled graph"))
    }

    /// Returns a reference to the underlying petgraph.
    pub fn inner(&self) -> &DiGraph<GraphNode, ()> {
        &self.graph
    }
}
