//! JSON state file helpers built on the atomic primitives.
//!
//! State files are pretty-printed UTF-8 JSON with a trailing newline. An empty
//! file reads as `null`, which every [`Transform`] treats as `{}`.

use crate::error::{Result, StateError};
use crate::fs::{Content, UpdateOptions, WriteOptions, WriteRequest, atomic_update, atomic_write};
use crate::fs::{Encoding, multi_write};

use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

/// Serializes a state document the way it is stored on disk.
pub fn to_json_text(value: &Value) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    text.push('\n');
    text
}

fn parse_json(text: &str, path: &Path) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| StateError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Reads a JSON state file.
pub fn read_json(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let text = crate::fs::read_text(path, Encoding::Utf8)?;
    parse_json(&text, path)
}

/// Reads a JSON state file, treating a missing file as `null`.
fn read_json_or_null(path: &Path) -> Result<Value> {
    match fs::metadata(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Value::Null),
        _ => read_json(path),
    }
}

/// Atomically writes a JSON state file.
pub fn write_json(path: impl AsRef<Path>, value: &Value, mode: Option<u32>) -> Result<()> {
    let options = WriteOptions {
        mode,
        ..WriteOptions::default()
    };
    atomic_write(path, to_json_text(value), &options)
}

/// Atomic read-modify-write of a JSON state file.
///
/// `update_fn` returning `Ok(None)` fails with `EmptyUpdateResult`; a parse
/// error in the current file fails before `update_fn` runs.
pub fn update_json<F>(path: impl AsRef<Path>, update_fn: F, create_if_missing: bool) -> Result<()>
where
    F: FnOnce(Value) -> anyhow::Result<Option<Value>>,
{
    let path = path.as_ref();
    let options = UpdateOptions::new().create_if_missing(create_if_missing);

    // Parse errors must surface as themselves, not as a failed update.
    let mut parse_error = None;
    let result = atomic_update(
        path,
        |content| {
            let text = content.as_text().unwrap_or_default();
            match parse_json(text, path) {
                Ok(value) => {
                    Ok(update_fn(value)?.map(|next| Content::Text(to_json_text(&next))))
                }
                Err(e) => {
                    parse_error = Some(e);
                    Err(anyhow::anyhow!("unparseable state file"))
                }
            }
        },
        &options,
    );

    match parse_error {
        Some(e) => Err(e),
        None => result,
    }
}

/// A named update function applied to a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// `set:KEY=VALUE`
    Set { key: String, value: Value },
    /// `remove:KEY`
    Remove { key: String },
    /// `merge:{...}` shallow-merges an object.
    Merge(Map<String, Value>),
    /// `append:KEY=VALUE` pushes onto an array, creating it if absent.
    Append { key: String, value: Value },
}

/// Parses a CLI value: JSON when it parses, otherwise a plain string.
fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn split_assignment(verb: &str, arg: &str) -> Result<(String, Value)> {
    let (key, value) = arg.split_once('=').ok_or_else(|| {
        StateError::Other(anyhow::anyhow!("'{verb}' expects KEY=VALUE, got '{arg}'"))
    })?;
    if key.is_empty() {
        return Err(StateError::Other(anyhow::anyhow!("'{verb}' needs a key")));
    }
    Ok((key.to_string(), parse_value(value)))
}

impl FromStr for Transform {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        let (verb, arg) = s.split_once(':').unwrap_or((s, ""));

        match verb {
            "set" => {
                let (key, value) = split_assignment(verb, arg)?;
                Ok(Transform::Set { key, value })
            }
            "append" => {
                let (key, value) = split_assignment(verb, arg)?;
                Ok(Transform::Append { key, value })
            }
            "remove" if !arg.is_empty() => Ok(Transform::Remove {
                key: arg.to_string(),
            }),
            "remove" => Err(StateError::Other(anyhow::anyhow!("'remove' needs a key"))),
            "merge" => match serde_json::from_str(arg) {
                Ok(Value::Object(map)) => Ok(Transform::Merge(map)),
                _ => Err(StateError::Other(anyhow::anyhow!(
                    "'merge' expects a JSON object, got '{arg}'"
                ))),
            },
            other => Err(StateError::NotAFunction(other.to_string())),
        }
    }
}

impl Transform {
    /// Applies the transform. The document must be an object (or `null`).
    pub fn apply(&self, document: Value) -> anyhow::Result<Value> {
        let mut object = match document {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => anyhow::bail!("state document is not a JSON object: {other}"),
        };

        match self {
            Transform::Set { key, value } => {
                object.insert(key.clone(), value.clone());
            }
            Transform::Remove { key } => {
                object.remove(key);
            }
            Transform::Merge(patch) => {
                object.extend(patch.clone());
            }
            Transform::Append { key, value } => {
                match object.entry(key.clone()).or_insert_with(|| Value::Array(Vec::new())) {
                    Value::Array(items) => items.push(value.clone()),
                    _ => anyhow::bail!("'{key}' is not an array"),
                }
            }
        }

        Ok(Value::Object(object))
    }
}

/// Applies `transforms` in order as one atomic update.
pub fn apply_transforms(
    path: impl AsRef<Path>,
    transforms: &[Transform],
    create_if_missing: bool,
) -> Result<()> {
    update_json(
        path,
        |document| {
            transforms
                .iter()
                .try_fold(document, |doc, transform| transform.apply(doc))
                .map(Some)
        },
        create_if_missing,
    )
}

fn into_object(value: Value, path: &Path) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(StateError::Other(anyhow::anyhow!(
            "{} does not hold a JSON object",
            path.display()
        ))),
    }
}

/// Moves the record `key` from the object in `from` to the object in `to`.
///
/// Both files are written in one transaction. `to` may be missing or empty.
pub fn move_record(from: impl AsRef<Path>, to: impl AsRef<Path>, key: &str) -> Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());

    let mut source = into_object(read_json(from)?, from)?;
    let record = source.remove(key).ok_or_else(|| StateError::RecordNotFound {
        path: from.to_path_buf(),
        key: key.to_string(),
    })?;

    let mut destination = into_object(read_json_or_null(to)?, to)?;
    destination.insert(key.to_string(), record);

    log::debug!(
        "Moving record '{}' from {} to {}",
        key,
        from.display(),
        to.display()
    );

    multi_write([
        WriteRequest::new(from, to_json_text(&Value::Object(source))),
        WriteRequest::new(to, to_json_text(&Value::Object(destination))),
    ])
}
