//! Streaming execution events.

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::definition::NodeId;

/// A boxed stream of execution events.
pub type EventStream<'a> = BoxStream<'a, ExecutionEvent>;

/// One event in a streamed execution.
///
/// Executions emit one `running` event per completed node, then exactly one
/// terminal event: `completed`, `cancelled` (when the cancellation signal
/// was observed at a node boundary), or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// A node completed; carries that node's state delta.
    Running {
        /// The node that completed.
        node_id: NodeId,
        /// The partial state update the node produced.
        state: Map<String, Value>,
    },
    /// The whole graph completed.
    Completed,
    /// The execution was cancelled between nodes.
    Cancelled,
    /// A node failed; the stream ends here.
    Error {
        /// Human-readable failure description.
        error: String,
    },
}

impl ExecutionEvent {
    /// Returns whether this event ends the stream.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running { .. })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_event_serialization_tags_status() {
        let event = ExecutionEvent::Running {
            node_id: NodeId::from("n1"),
            state: json!({"output": 1}).as_object().cloned().unwrap(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], json!("running"));
        assert_eq!(value["node_id"], json!("n1"));

        let value = serde_json::to_value(ExecutionEvent::Completed).unwrap();
        assert_eq!(value, json!({"status": "completed"}));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(ExecutionEvent::Completed.is_terminal());
        assert!(ExecutionEvent::Cancelled.is_terminal());
        assert!(!ExecutionEvent::Running {
            node_id: NodeId::from("n"),
            state: Map::new()
        }
        .is_terminal());
    }
}
