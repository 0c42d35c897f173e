//! Operation batches: JSON documents describing a multi-file write.
//!
//! ```json
//! [
//!   { "path": "state/pending.json", "content": {} },
//!   { "path": "state/notes.txt", "content": "done", "encoding": "utf-16le", "mode": "0600" }
//! ]
//! ```

use crate::error::{Result, StateError};
use crate::fs::{Content, Encoding, WriteOptions, WriteRequest, parse_mode};
use crate::ops::json::to_json_text;
use crate::validation::validate_operations;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct OperationSpec {
    path: PathBuf,
    content: Value,
    #[serde(default)]
    encoding: Option<Encoding>,
    #[serde(default, deserialize_with = "deserialize_mode")]
    mode: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeSpec {
    Bits(u32),
    Octal(String),
}

fn deserialize_mode<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<ModeSpec>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ModeSpec::Bits(bits)) if bits <= 0o7777 => Ok(Some(bits)),
        Some(ModeSpec::Bits(bits)) => Err(serde::de::Error::custom(format!(
            "mode {bits} is out of range"
        ))),
        Some(ModeSpec::Octal(text)) => parse_mode(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl OperationSpec {
    fn into_request(self) -> WriteRequest {
        let content = match self.content {
            Value::String(text) => Content::Text(text),
            other => Content::Text(to_json_text(&other)),
        };

        WriteRequest::new(self.path, content).with_options(WriteOptions {
            encoding: self.encoding.unwrap_or_default(),
            mode: self.mode,
        })
    }
}

/// Builds write requests from an already parsed batch.
///
/// The whole batch is validated before any request is produced.
pub fn requests_from_value(value: Value) -> Result<Vec<WriteRequest>> {
    validate_operations(value)?
        .into_iter()
        .enumerate()
        .map(|(index, op)| {
            serde_json::from_value::<OperationSpec>(op)
                .map(OperationSpec::into_request)
                .map_err(|e| StateError::InvalidOperations(format!("operation {index}: {e}")))
        })
        .collect()
}

/// Parses batch text read from `source`.
pub fn parse_batch(text: &str, source: &Path) -> Result<Vec<WriteRequest>> {
    let value: Value = serde_json::from_str(text).map_err(|e| StateError::Json {
        path: source.to_path_buf(),
        source: e,
    })?;
    requests_from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_and_json_content() {
        let requests = requests_from_value(json!([
            { "path": "a.txt", "content": "plain" },
            { "path": "b.json", "content": { "step": 2 } },
        ]))
        .unwrap();

        assert_eq!(requests[0].content, Content::Text("plain".into()));
        assert_eq!(
            requests[1].content,
            Content::Text("{\n  \"step\": 2\n}\n".into())
        );
    }

    #[test]
    fn test_encoding_and_mode() {
        let requests = requests_from_value(json!([
            { "path": "a", "content": "x", "encoding": "utf-16le", "mode": "0600" },
            { "path": "b", "content": "y", "mode": 420 },
        ]))
        .unwrap();

        assert_eq!(requests[0].options.encoding, Encoding::Utf16Le);
        assert_eq!(requests[0].options.mode, Some(0o600));
        assert_eq!(requests[1].options.encoding, Encoding::Utf8);
        assert_eq!(requests[1].options.mode, Some(0o644));
    }

    #[test]
    fn test_bad_encoding_is_invalid_operations() {
        let result = requests_from_value(json!([
            { "path": "a", "content": "x", "encoding": "klingon" },
        ]));
        assert!(matches!(
            result,
            Err(StateError::InvalidOperations(msg)) if msg.contains("klingon")
        ));
    }

    #[test]
    fn test_bad_mode_is_invalid_operations() {
        let result = requests_from_value(json!([{ "path": "a", "content": "x", "mode": "rwx" }]));
        assert!(matches!(result, Err(StateError::InvalidOperations(_))));
    }

    #[test]
    fn test_malformed_operation_rejects_whole_batch() {
        let result = requests_from_value(json!([
            { "path": "a", "content": "x" },
            { "path": "b" },
        ]));
        assert!(matches!(
            result,
            Err(StateError::MissingContentProperty { index: 1, .. })
        ));
    }

    #[test]
    fn test_non_array_batch_is_invalid_operations() {
        let result = requests_from_value(json!({ "path": "a", "content": "x" }));
        assert!(matches!(result, Err(StateError::InvalidOperations(_))));
    }

    #[test]
    fn test_unparseable_batch_text() {
        let result = parse_batch("[{", Path::new("batch.json"));
        assert!(matches!(result, Err(StateError::Json { .. })));
    }
}
