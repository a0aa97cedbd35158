//! Declarative data transforms.
//!
//! A [`TransformSpec`] names one of a fixed set of pure transforms, either
//! as a bare string (`"uppercase"`) or with configuration
//! (`{"type": "extract_field", "config": {"field": "name"}}`). [`apply`]
//! evaluates a spec against any JSON value and always produces a value:
//! unknown transform types and inapplicable inputs pass through unchanged.
//! That leniency is deliberate policy, not an error path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{TRACING_TARGET, WorkflowError, WorkflowResult};

/// A declarative transform specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformSpec {
    /// A bare transform name with no configuration.
    Named(String),
    /// A transform name with configuration.
    Configured {
        /// The transform type name.
        #[serde(rename = "type")]
        transform_type: String,
        /// Type-specific configuration.
        #[serde(default)]
        config: Map<String, Value>,
    },
}

impl TransformSpec {
    /// Creates a spec from a bare transform name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Creates a configured spec.
    pub fn configured(name: impl Into<String>, config: Map<String, Value>) -> Self {
        Self::Configured {
            transform_type: name.into(),
            config,
        }
    }

    /// Parses a spec from an arbitrary JSON value.
    ///
    /// This is the one place a transform can fail: a value that is neither
    /// a string nor a `{type, config}` object is a malformed spec.
    pub fn from_value(value: &Value) -> WorkflowResult<Self> {
        serde_json::from_value(value.clone()).map_err(WorkflowError::Serialization)
    }

    /// Returns the transform type name.
    pub fn transform_type(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Configured { transform_type, .. } => transform_type,
        }
    }

    fn config(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Named(_) => None,
            Self::Configured { config, .. } => Some(config),
        }
    }
}

/// Applies a transform spec to a value.
///
/// Total and pure: every input yields an output. Transforms that do not
/// apply to the input's shape (e.g. `filter` on a non-array) return the
/// input unchanged, as does an unknown transform type.
pub fn apply(input: &Value, spec: &TransformSpec) -> Value {
    let config = spec.config();
    let get = |key: &str| config.and_then(|c| c.get(key));
    let get_str = |key: &str| get(key).and_then(Value::as_str);

    match spec.transform_type() {
        "passthrough" | "identity" => input.clone(),

        "to_string" => Value::String(coerce_string(input)),

        "to_json" => match input {
            Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| input.clone()),
            Value::Null => Value::String("{}".to_owned()),
            other => Value::String(coerce_string(other)),
        },

        "extract_field" => match (get_str("field"), input) {
            (Some(field), Value::Object(fields)) => {
                fields.get(field).cloned().unwrap_or(Value::Null)
            }
            _ => input.clone(),
        },

        "set_field" => match (get_str("field"), input) {
            (Some(field), Value::Object(fields)) => {
                let mut result = fields.clone();
                result.insert(
                    field.to_owned(),
                    get("value").cloned().unwrap_or(Value::Null),
                );
                Value::Object(result)
            }
            _ => input.clone(),
        },

        "merge" => match (get("data").and_then(Value::as_object), input) {
            (Some(data), Value::Object(fields)) => {
                let mut result = fields.clone();
                for (key, value) in data {
                    result.insert(key.clone(), value.clone());
                }
                Value::Object(result)
            }
            _ => input.clone(),
        },

        "filter" => match (get_str("field"), input) {
            (Some(field), Value::Array(items)) => {
                let target = get("value").unwrap_or(&Value::Null);
                let kept = items
                    .iter()
                    .filter(|item| {
                        item.as_object()
                            .is_some_and(|obj| obj.get(field).unwrap_or(&Value::Null) == target)
                    })
                    .cloned()
                    .collect();
                Value::Array(kept)
            }
            _ => input.clone(),
        },

        "map" => match (get_str("field"), input) {
            (Some(field), Value::Array(items)) => {
                let projected = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(obj) => obj.get(field).cloned().unwrap_or(Value::Null),
                        other => other.clone(),
                    })
                    .collect();
                Value::Array(projected)
            }
            _ => input.clone(),
        },

        "uppercase" => Value::String(coerce_string(input).to_uppercase()),

        "lowercase" => Value::String(coerce_string(input).to_lowercase()),

        "trim" => Value::String(coerce_string(input).trim().to_owned()),

        "replace" => {
            let old = get_str("old").unwrap_or_default();
            let new = get_str("new").unwrap_or_default();
            Value::String(coerce_string(input).replace(old, new))
        }

        "split" => {
            let separator = get_str("separator").unwrap_or(" ");
            match input {
                Value::String(text) => Value::Array(
                    text.split(separator)
                        .map(|part| Value::String(part.to_owned()))
                        .collect(),
                ),
                other => Value::Array(vec![Value::String(coerce_string(other))]),
            }
        }

        "join" => {
            let separator = get_str("separator").unwrap_or(" ");
            match input {
                Value::Array(items) => Value::String(
                    items
                        .iter()
                        .map(coerce_string)
                        .collect::<Vec<_>>()
                        .join(separator),
                ),
                other => Value::String(coerce_string(other)),
            }
        }

        "length" => {
            let len = match input {
                Value::String(text) => text.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(fields) => fields.len(),
                _ => 0,
            };
            Value::from(len as u64)
        }

        "slice" => {
            let start = get("start").and_then(Value::as_i64).unwrap_or(0);
            let end = get("end").and_then(Value::as_i64);
            match input {
                Value::String(text) => {
                    let chars: Vec<char> = text.chars().collect();
                    let (lo, hi) = resolve_range(chars.len(), start, end);
                    Value::String(chars[lo..hi].iter().collect())
                }
                Value::Array(items) => {
                    let (lo, hi) = resolve_range(items.len(), start, end);
                    Value::Array(items[lo..hi].to_vec())
                }
                other => other.clone(),
            }
        }

        unknown => {
            tracing::warn!(
                target: TRACING_TARGET,
                transform_type = unknown,
                "Unknown transform type, using passthrough"
            );
            input.clone()
        }
    }
}

/// Coerces a value to a string: strings unwrap, everything else serializes.
fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Resolves Python-style slice bounds (negative indices count from the end,
/// out-of-range indices clamp) into a valid `lo..hi` range.
fn resolve_range(len: usize, start: i64, end: Option<i64>) -> (usize, usize) {
    let clamp = |index: i64| -> usize {
        let resolved = if index < 0 { index + len as i64 } else { index };
        resolved.clamp(0, len as i64) as usize
    };
    let lo = clamp(start);
    let hi = end.map(clamp).unwrap_or(len);
    (lo, hi.max(lo))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn configured(name: &str, config: Value) -> TransformSpec {
        TransformSpec::configured(name, config.as_object().cloned().unwrap())
    }

    #[test]
    fn test_passthrough_and_identity() {
        let input = json!({"a": 1});
        assert_eq!(apply(&input, &TransformSpec::named("passthrough")), input);
        assert_eq!(apply(&input, &TransformSpec::named("identity")), input);
    }

    #[test]
    fn test_uppercase_lowercase_trim() {
        assert_eq!(
            apply(&json!("hello"), &TransformSpec::named("uppercase")),
            json!("HELLO")
        );
        assert_eq!(
            apply(&json!("WORLD"), &TransformSpec::named("lowercase")),
            json!("world")
        );
        assert_eq!(
            apply(&json!("  padded  "), &TransformSpec::named("trim")),
            json!("padded")
        );
    }

    #[test]
    fn test_string_transforms_coerce_non_strings() {
        assert_eq!(
            apply(&json!(42), &TransformSpec::named("uppercase")),
            json!("42")
        );
    }

    #[test]
    fn test_to_json_parses_and_serializes() {
        assert_eq!(
            apply(&json!("{\"a\": 1}"), &TransformSpec::named("to_json")),
            json!({"a": 1})
        );
        // Invalid JSON strings pass through unchanged.
        assert_eq!(
            apply(&json!("not json"), &TransformSpec::named("to_json")),
            json!("not json")
        );
        assert_eq!(
            apply(&json!({"a": 1}), &TransformSpec::named("to_json")),
            json!("{\"a\":1}")
        );
        assert_eq!(
            apply(&Value::Null, &TransformSpec::named("to_json")),
            json!("{}")
        );
    }

    #[test]
    fn test_extract_and_set_field() {
        let spec = configured("extract_field", json!({"field": "name"}));
        assert_eq!(apply(&json!({"name": "weft"}), &spec), json!("weft"));
        assert_eq!(apply(&json!({"other": 1}), &spec), Value::Null);
        assert_eq!(apply(&json!("scalar"), &spec), json!("scalar"));

        let spec = configured("set_field", json!({"field": "tag", "value": "v1"}));
        assert_eq!(apply(&json!({"a": 1}), &spec), json!({"a": 1, "tag": "v1"}));
        assert_eq!(apply(&json!([1]), &spec), json!([1]));
    }

    #[test]
    fn test_merge_data_wins_on_conflict() {
        let spec = configured("merge", json!({"data": {"b": 2}}));
        assert_eq!(apply(&json!({"a": 1}), &spec), json!({"a": 1, "b": 2}));

        let spec = configured("merge", json!({"data": {"a": 9}}));
        assert_eq!(apply(&json!({"a": 1}), &spec), json!({"a": 9}));
    }

    #[test]
    fn test_filter_and_map() {
        let items = json!([
            {"kind": "a", "v": 1},
            {"kind": "b", "v": 2},
            {"kind": "a", "v": 3}
        ]);

        let spec = configured("filter", json!({"field": "kind", "value": "a"}));
        assert_eq!(
            apply(&items, &spec),
            json!([{"kind": "a", "v": 1}, {"kind": "a", "v": 3}])
        );

        let spec = configured("map", json!({"field": "v"}));
        assert_eq!(apply(&items, &spec), json!([1, 2, 3]));

        // Non-array input passes through.
        assert_eq!(apply(&json!("x"), &spec), json!("x"));
    }

    #[test]
    fn test_replace_split_join() {
        let spec = configured("replace", json!({"old": "o", "new": "0"}));
        assert_eq!(apply(&json!("foo"), &spec), json!("f00"));

        let spec = configured("split", json!({"separator": ","}));
        assert_eq!(apply(&json!("a,b,c"), &spec), json!(["a", "b", "c"]));
        assert_eq!(apply(&json!(7), &spec), json!(["7"]));

        let spec = configured("join", json!({"separator": "-"}));
        assert_eq!(apply(&json!(["a", "b"]), &spec), json!("a-b"));
    }

    #[test]
    fn test_length() {
        assert_eq!(apply(&json!("abc"), &TransformSpec::named("length")), json!(3));
        assert_eq!(apply(&json!([1, 2]), &TransformSpec::named("length")), json!(2));
        assert_eq!(
            apply(&json!({"a": 1}), &TransformSpec::named("length")),
            json!(1)
        );
        assert_eq!(apply(&json!(true), &TransformSpec::named("length")), json!(0));
    }

    #[test]
    fn test_slice_with_negative_indices() {
        let spec = configured("slice", json!({"start": 1, "end": 3}));
        assert_eq!(apply(&json!([0, 1, 2, 3]), &spec), json!([1, 2]));
        assert_eq!(apply(&json!("abcd"), &spec), json!("bc"));

        let spec = configured("slice", json!({"start": -2}));
        assert_eq!(apply(&json!([0, 1, 2, 3]), &spec), json!([2, 3]));

        // Degenerate ranges collapse to empty.
        let spec = configured("slice", json!({"start": 3, "end": 1}));
        assert_eq!(apply(&json!([0, 1, 2, 3]), &spec), json!([]));
    }

    #[test]
    fn test_unknown_type_is_passthrough() {
        let input = json!({"untouched": true});
        assert_eq!(apply(&input, &TransformSpec::named("reticulate")), input);
    }

    #[test]
    fn test_spec_from_value() {
        let spec = TransformSpec::from_value(&json!("uppercase")).unwrap();
        assert_eq!(spec.transform_type(), "uppercase");

        let spec =
            TransformSpec::from_value(&json!({"type": "merge", "config": {"data": {}}})).unwrap();
        assert_eq!(spec.transform_type(), "merge");

        assert!(TransformSpec::from_value(&json!(42)).is_err());
    }
}
