//! Execution state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mutable state threaded through a graph execution.
///
/// A flat mapping from field name to value, seeded from state-schema
/// defaults and the caller's input. Nodes never mutate it in place: each
/// node returns a partial update and [`merged`] produces the next state,
/// so earlier snapshots (e.g. checkpoints) are never aliased.
///
/// [`merged`]: ExecutionState::merged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionState(Map<String, Value>);

impl ExecutionState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a state from schema defaults overlaid with the caller input
    /// under the `input` key.
    pub fn seed(defaults: Map<String, Value>, input: Value) -> Self {
        let mut fields = defaults;
        fields.insert("input".to_owned(), input);
        Self(fields)
    }

    /// Returns the value of a field, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the caller input, defaulting to an empty object.
    pub fn input(&self) -> Value {
        self.get("input").cloned().unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Returns a new state with `delta` shallow-merged over this one.
    pub fn merged(&self, delta: &Map<String, Value>) -> Self {
        let mut fields = self.0.clone();
        for (key, value) in delta {
            fields.insert(key.clone(), value.clone());
        }
        Self(fields)
    }

    /// Returns the underlying field map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the state and returns the field map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Returns the state as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for ExecutionState {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_seed_overlays_input() {
        let defaults = json!({"count": 0, "input": "stale"})
            .as_object()
            .cloned()
            .unwrap();
        let state = ExecutionState::seed(defaults, json!({"q": "hi"}));

        assert_eq!(state.get("count"), Some(&json!(0)));
        assert_eq!(state.input(), json!({"q": "hi"}));
    }

    #[test]
    fn test_merged_does_not_alias() {
        let state = ExecutionState::seed(Map::new(), json!("x"));
        let delta = json!({"output": "y"}).as_object().cloned().unwrap();
        let next = state.merged(&delta);

        assert!(state.get("output").is_none());
        assert_eq!(next.get("output"), Some(&json!("y")));
        assert_eq!(next.input(), json!("x"));
    }
}
