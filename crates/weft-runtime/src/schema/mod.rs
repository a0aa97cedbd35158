//! State-schema validation and default derivation.
//!
//! Workflow state schemas follow a JSON Schema (Draft-7-equivalent) subset:
//! `type`, `properties`, `required`, `items`, `enum`, and `default`. The
//! functions here check schema documents themselves, validate state values
//! against them, and derive default state from them. Unknown keywords are
//! ignored, matching standard JSON Schema behavior.

use serde_json::{Map, Value};
use thiserror::Error;

/// A schema or instance validation failure.
///
/// Carries the path of the violating schema location or instance value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {path}")]
pub struct SchemaError {
    /// JSON-pointer-style path of the violation (`$` for the root).
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl SchemaError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_owned(),
            message: message.into(),
        }
    }
}

const VALID_TYPES: [&str; 7] = [
    "object", "array", "string", "number", "integer", "boolean", "null",
];

/// Checks that `schema` is a structurally valid schema document.
///
/// An empty object (or `null`) is a valid schema with no constraints.
pub fn check_schema(schema: &Value) -> Result<(), SchemaError> {
    check_schema_at(schema, "$")
}

fn check_schema_at(schema: &Value, path: &str) -> Result<(), SchemaError> {
    let obj = match schema {
        Value::Null => return Ok(()),
        Value::Object(obj) => obj,
        // Draft-7 allows boolean schemas.
        Value::Bool(_) => return Ok(()),
        other => {
            return Err(SchemaError::new(
                path,
                format!("schema must be an object, got {}", type_name(other)),
            ));
        }
    };

    if let Some(ty) = obj.get("type") {
        check_type_keyword(ty, path)?;
    }

    if let Some(properties) = obj.get("properties") {
        let Some(props) = properties.as_object() else {
            return Err(SchemaError::new(path, "'properties' must be an object"));
        };
        for (name, sub) in props {
            check_schema_at(sub, &format!("{path}.{name}"))?;
        }
    }

    if let Some(required) = obj.get("required") {
        let Some(items) = required.as_array() else {
            return Err(SchemaError::new(path, "'required' must be an array"));
        };
        if items.iter().any(|v| !v.is_string()) {
            return Err(SchemaError::new(path, "'required' entries must be strings"));
        }
    }

    if let Some(items) = obj.get("items") {
        check_schema_at(items, &format!("{path}[]"))?;
    }

    if let Some(variants) = obj.get("enum") {
        if !variants.is_array() {
            return Err(SchemaError::new(path, "'enum' must be an array"));
        }
    }

    Ok(())
}

fn check_type_keyword(ty: &Value, path: &str) -> Result<(), SchemaError> {
    let valid = |name: &Value| {
        name.as_str()
            .is_some_and(|s| VALID_TYPES.contains(&s))
    };
    let ok = match ty {
        Value::String(_) => valid(ty),
        Value::Array(names) => !names.is_empty() && names.iter().all(valid),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(SchemaError::new(path, format!("invalid 'type' keyword: {ty}")))
    }
}

/// Validates `value` against `schema`.
///
/// On failure the error identifies the violating path and message. An empty
/// schema accepts everything.
pub fn validate_against(value: &Value, schema: &Value) -> Result<(), SchemaError> {
    validate_at(value, schema, "$")
}

fn validate_at(value: &Value, schema: &Value, path: &str) -> Result<(), SchemaError> {
    let obj = match schema {
        Value::Object(obj) => obj,
        Value::Bool(false) => return Err(SchemaError::new(path, "schema rejects all values")),
        _ => return Ok(()),
    };

    if let Some(ty) = obj.get("type") {
        let names: Vec<&str> = match ty {
            Value::String(s) => vec![s.as_str()],
            Value::Array(list) => list.iter().filter_map(Value::as_str).collect(),
            _ => vec![],
        };
        if !names.is_empty() && !names.iter().any(|name| matches_type(value, name)) {
            return Err(SchemaError::new(
                path,
                format!(
                    "expected type {}, got {}",
                    names.join(" or "),
                    type_name(value)
                ),
            ));
        }
    }

    if let Some(variants) = obj.get("enum").and_then(Value::as_array) {
        if !variants.contains(value) {
            return Err(SchemaError::new(path, "value is not one of the enum variants"));
        }
    }

    if let Value::Object(fields) = value {
        if let Some(required) = obj.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(name) {
                    return Err(SchemaError::new(
                        path,
                        format!("missing required property '{name}'"),
                    ));
                }
            }
        }

        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (name, sub) in props {
                if let Some(field) = fields.get(name) {
                    validate_at(field, sub, &format!("{path}.{name}"))?;
                }
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (value, obj.get("items")) {
        for (index, item) in items.iter().enumerate() {
            validate_at(item, item_schema, &format!("{path}[{index}]"))?;
        }
    }

    Ok(())
}

fn matches_type(value: &Value, name: &str) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Derives default state from a schema's `properties`.
///
/// An explicit `default` wins; otherwise the property's declared type picks
/// a zero value (objects recurse). Properties without a recognized type and
/// without a default are omitted. The derivation is idempotent: applying it
/// to a schema always yields the same mapping.
pub fn defaults(schema: &Value) -> Map<String, Value> {
    let mut state = Map::new();

    let Some(props) = schema.get("properties").and_then(Value::as_object) else {
        return state;
    };

    for (name, prop) in props {
        if let Some(default) = prop.get("default") {
            state.insert(name.clone(), default.clone());
            continue;
        }
        match prop.get("type").and_then(Value::as_str) {
            Some("object") if prop.get("properties").is_some() => {
                state.insert(name.clone(), Value::Object(defaults(prop)));
            }
            Some("array") => {
                state.insert(name.clone(), Value::Array(Vec::new()));
            }
            Some("string") => {
                state.insert(name.clone(), Value::String(String::new()));
            }
            Some("number") | Some("integer") => {
                state.insert(name.clone(), Value::from(0));
            }
            Some("boolean") => {
                state.insert(name.clone(), Value::Bool(false));
            }
            _ => {}
        }
    }

    state
}
