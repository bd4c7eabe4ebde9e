use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{JsonMapError, Result};
use crate::value::{DecodedValue, Mapping};

pub const SCHEMA_DRAFT: &str = "http://json-schema.org/draft-07/schema#";

/// Describes the shape of a sample document. Every key present in an
/// object is listed as required; arrays take their item schema from the
/// first element.
pub fn infer_schema(value: &DecodedValue) -> Value {
    let mut schema = infer_node(value);
    if let Value::Object(root) = &mut schema {
        root.insert("$schema".to_string(), Value::String(SCHEMA_DRAFT.to_string()));
    }
    schema
}

fn infer_node(value: &DecodedValue) -> Value {
    match value {
        DecodedValue::Null => json!({"type": "null"}),
        DecodedValue::Boolean(_) => json!({"type": "boolean"}),
        DecodedValue::Number(number) if number.is_i64() || number.is_u64() => {
            json!({"type": "integer"})
        }
        DecodedValue::Number(_) => json!({"type": "number"}),
        DecodedValue::String(_) => json!({"type": "string"}),
        DecodedValue::Sequence(items) => match items.first() {
            Some(first) => json!({"type": "array", "items": infer_node(first)}),
            None => json!({"type": "array"}),
        },
        DecodedValue::Mapping(map) => {
            let properties: Map<String, Value> = map
                .iter()
                .map(|(key, child)| (key.clone(), infer_node(child)))
                .collect();
            let required: Vec<Value> = map.keys().cloned().map(Value::String).collect();
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
            })
        }
    }
}

/// Violation messages in the validator's order, each prefixed with the
/// JSON pointer of the offending value. An empty list means valid.
pub fn validate(instance: &DecodedValue, schema: &Value) -> Result<Vec<String>> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|err| JsonMapError::Schema(format!("invalid schema: {err}")))?;
    let instance = Value::from(instance);

    let violations: Vec<String> = validator
        .iter_errors(&instance)
        .map(|err| {
            let location = err.instance_path.to_string();
            let location = if location.is_empty() { "/".to_string() } else { location };
            format!("{location}: {err}")
        })
        .collect();

    debug!(violations = violations.len(), "validated document against schema");
    Ok(violations)
}

/// Builds a sample document that satisfies the common parts of `schema`:
/// `const`, `enum`, `default`, `type`, `properties`, `items` and the first
/// branch of `anyOf`/`oneOf`/`allOf`.
pub fn mock_from_schema(schema: &Value) -> Result<DecodedValue> {
    match schema {
        Value::Object(_) | Value::Bool(true) => Ok(mock_node(schema)),
        Value::Bool(false) => Err(JsonMapError::Schema(
            "schema `false` accepts no value".to_string(),
        )),
        other => Err(JsonMapError::Schema(format!(
            "schema must be an object or boolean, got {}",
            DecodedValue::from(other).type_name()
        ))),
    }
}

fn declared_type(schema: &Map<String, Value>) -> Option<&str> {
    match schema.get("type")? {
        Value::String(kind) => Some(kind.as_str()),
        Value::Array(kinds) => kinds
            .iter()
            .filter_map(Value::as_str)
            .find(|kind| *kind != "null")
            .or(Some("null")),
        _ => None,
    }
}

fn mock_node(schema: &Value) -> DecodedValue {
    let Value::Object(schema) = schema else {
        return DecodedValue::Null;
    };

    if let Some(constant) = schema.get("const") {
        return DecodedValue::from(constant);
    }
    if let Some(first) = schema.get("enum").and_then(Value::as_array).and_then(|e| e.first()) {
        return DecodedValue::from(first);
    }
    if let Some(default) = schema.get("default") {
        return DecodedValue::from(default);
    }
    for combinator in ["anyOf", "oneOf", "allOf"] {
        if let Some(first) = schema
            .get(combinator)
            .and_then(Value::as_array)
            .and_then(|branches| branches.first())
        {
            return mock_node(first);
        }
    }

    let kind = declared_type(schema).or_else(|| {
        if schema.contains_key("properties") {
            Some("object")
        } else if schema.contains_key("items") {
            Some("array")
        } else {
            None
        }
    });

    match kind {
        Some("string") => DecodedValue::String("mock_string".to_string()),
        Some("number" | "integer") => DecodedValue::Number(42.into()),
        Some("boolean") => DecodedValue::Boolean(true),
        Some("array") => DecodedValue::Sequence(
            schema.get("items").map(mock_node).into_iter().collect(),
        ),
        Some("object") => {
            let object: Mapping = schema
                .get("properties")
                .and_then(Value::as_object)
                .map(|properties| {
                    properties
                        .iter()
                        .map(|(key, property)| (key.clone(), mock_node(property)))
                        .collect()
                })
                .unwrap_or_default();
            DecodedValue::Mapping(object)
        }
        _ => DecodedValue::Null,
    }
}
