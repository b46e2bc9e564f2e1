//! Payload sanitization over JSON values

use serde_json::{Map, Value};

use crate::sanitize_input;

/// How arrays inside a payload are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrayPolicy {
    /// Strings and objects inside arrays are sanitized like any other field
    #[default]
    Recurse,
    /// Arrays are copied untouched
    PassThrough,
}

/// Return a sanitized copy of `value`. Strings go through
/// [`sanitize_input`], objects are walked, numbers/booleans/null are copied.
pub fn sanitize_value(value: &Value, arrays: ArrayPolicy) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_input(Some(s))),
        Value::Object(map) => Value::Object(sanitize_map(map, arrays)),
        Value::Array(items) => match arrays {
            ArrayPolicy::Recurse => Value::Array(items.iter().map(|v| sanitize_value(v, arrays)).collect()),
            ArrayPolicy::PassThrough => value.clone(),
        },
        Value::Number(_) | Value::Bool(_) | Value::Null => value.clone(),
    }
}

fn sanitize_map(map: &Map<String, Value>, arrays: ArrayPolicy) -> Map<String, Value> {
    map.iter()
        .map(|(key, v)| (key.clone(), sanitize_value(v, arrays)))
        .collect()
}

/// Sanitize every string field of an object, recursing into nested objects
/// and arrays.
pub fn sanitize_object(map: &Map<String, Value>) -> Map<String, Value> {
    sanitize_map(map, ArrayPolicy::default())
}
