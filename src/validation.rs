//! Shape checks for operation batches arriving as untyped JSON.
//!
//! Everything here runs before a single byte is written, so a malformed batch
//! never needs a rollback.

use crate::error::{Result, StateError};
use serde_json::Value;

/// Checks that `value` is an array of `{ "path": <string>, "content": <any> }`
/// objects and returns the elements.
pub fn validate_operations(value: Value) -> Result<Vec<Value>> {
    let operations = match value {
        Value::Array(operations) => operations,
        other => {
            return Err(StateError::InvalidOperations(format!(
                "expected an array of operations, found {}",
                kind_of(&other)
            )));
        }
    };

    for (index, op) in operations.iter().enumerate() {
        validate_operation(index, op)?;
    }

    Ok(operations)
}

fn validate_operation(index: usize, op: &Value) -> Result<()> {
    let fields = op.as_object().ok_or_else(|| {
        StateError::InvalidOperations(format!(
            "operation {index} must be an object, found {}",
            kind_of(op)
        ))
    })?;

    let path = match fields.get("path") {
        Some(Value::String(path)) if !path.is_empty() => path,
        Some(Value::String(_)) => {
            return Err(StateError::InvalidOperations(format!(
                "operation {index} has an empty `path`"
            )));
        }
        Some(other) => {
            return Err(StateError::InvalidOperations(format!(
                "operation {index} has a non-string `path` ({})",
                kind_of(other)
            )));
        }
        None => {
            return Err(StateError::InvalidOperations(format!(
                "operation {index} is missing the `path` property"
            )));
        }
    };

    if !fields.contains_key("content") {
        return Err(StateError::MissingContentProperty {
            index,
            path: path.clone(),
        });
    }

    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
