//! Connection types linking nodes in a workflow definition.

use derive_builder::Builder;
use derive_more::{AsRef, Debug, Display, From, Into};
use serde::{Deserialize, Serialize};

use super::NodeId;

/// Unique identifier for a connection within a workflow definition.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into, AsRef)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Creates a connection ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A directed connection between two nodes.
///
/// Invariant (enforced by definition validation, not construction):
/// `source != target` and both endpoints reference existing node IDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(
    name = "ConnectionBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with")
)]
pub struct Connection {
    /// Unique connection ID within the definition.
    pub id: ConnectionId,
    /// Source node ID.
    pub source: NodeId,
    /// Target node ID, or the reserved terminal marker.
    pub target: NodeId,
    /// Optional port name on the source node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub source_handle: Option<String>,
    /// Optional port name on the target node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub target_handle: Option<String>,
}

impl Connection {
    /// Creates a new connection between two nodes.
    pub fn new(
        id: impl Into<ConnectionId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    /// Returns a builder for creating a connection.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::default()
    }
}
