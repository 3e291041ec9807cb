//! Decoding of loosely-typed management payloads
//!
//! Attribute reads come back as untyped JSON. Every caller-facing shape
//! is validated here explicitly; a payload that does not match yields a
//! `ShapeMismatch` naming the attribute and the expected shape.

use std::collections::HashMap;

use serde_json::Value;

use crate::utils::ManagementError;

/// JSON kind name used in shape-mismatch errors
fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(attribute: &'static str, expected: &'static str, found: &Value) -> ManagementError {
    ManagementError::ShapeMismatch {
        attribute,
        expected,
        found: kind(found),
    }
}

/// Decode an attribute value as a string-to-string map
pub fn string_map(
    attribute: &'static str,
    value: &Value,
) -> Result<HashMap<String, String>, ManagementError> {
    let entries = value
        .as_object()
        .ok_or_else(|| mismatch(attribute, "a string map", value))?;

    let mut map = HashMap::with_capacity(entries.len());
    for (key, entry) in entries {
        let text = entry
            .as_str()
            .ok_or_else(|| mismatch(attribute, "a string map", entry))?;
        map.insert(key.clone(), text.to_string());
    }
    Ok(map)
}

/// Decode an attribute value as a list of strings
pub fn string_list(attribute: &'static str, value: &Value) -> Result<Vec<String>, ManagementError> {
    let entries = value
        .as_array()
        .ok_or_else(|| mismatch(attribute, "a string list", value))?;

    let mut list = Vec::with_capacity(entries.len());
    for entry in entries {
        let text = entry
            .as_str()
            .ok_or_else(|| mismatch(attribute, "a string list", entry))?;
        list.push(text.to_string());
    }
    Ok(list)
}

/// Length of an attribute value that is a list of any element type
pub fn list_len(attribute: &'static str, value: &Value) -> Result<usize, ManagementError> {
    value
        .as_array()
        .map(Vec::len)
        .ok_or_else(|| mismatch(attribute, "a list", value))
}
