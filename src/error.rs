//! Error types for atomic-state.
//!
//! All operations return `Result<T>` which aliases `Result<T, StateError>`.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fs::Encoding;

/// Errors from atomic write, update and transaction operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Target's parent directory does not exist. Nothing was touched.
    #[error("Parent directory does not exist: {}", .0.display())]
    ParentDirectoryMissing(PathBuf),

    /// Update target does not exist and `create_if_missing` was not set.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Named update function could not be resolved.
    #[error("'{0}' is not a known update function")]
    NotAFunction(String),

    /// Update function produced no value. Nothing was written.
    #[error("Update function returned no content for {}", .0.display())]
    EmptyUpdateResult(PathBuf),

    /// Update function failed. Nothing was written.
    #[error("Update function failed for {}: {source}", path.display())]
    UpdateFunctionFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Operation batch is malformed.
    #[error("Invalid operations: {0}")]
    InvalidOperations(String),

    /// Operation in a batch has no `content` property.
    #[error("Operation {index} ({path}) is missing the `content` property")]
    MissingContentProperty { index: usize, path: String },

    /// Text cannot be represented in the requested encoding.
    #[error("Cannot encode {ch:?} as {encoding}")]
    Encode { encoding: Encoding, ch: char },

    /// File content is not valid in the requested encoding.
    #[error("Content of {} is not valid {encoding}", path.display())]
    Decode { path: PathBuf, encoding: Encoding },

    /// JSON state file could not be parsed.
    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Record key missing from a JSON state file.
    #[error("Record '{key}' not found in {}", path.display())]
    RecordNotFound { path: PathBuf, key: String },

    /// Advisory lock is held by another process.
    #[error("State is locked by another process: {}", .0.display())]
    Locked(PathBuf),

    /// Rollback after a failed transaction left some paths unrestored.
    #[error("Rollback failed after error ({source}): {}", join_failures(.failures))]
    RollbackFailed {
        #[source]
        source: Box<StateError>,
        failures: Vec<RollbackFailure>,
    },

    /// File system operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StateError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        StateError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Renders the error followed by every cause its message does not already
    /// include, one `Caused by:` line each.
    pub fn report(&self) -> String {
        let mut report = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let text = cause.to_string();
            if !report.contains(&text) {
                report.push_str("\n  Caused by: ");
                report.push_str(&text);
            }
            source = std::error::Error::source(cause);
        }
        report
    }

    /// Returns `true` for errors raised before the filesystem was touched.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            StateError::ParentDirectoryMissing(_)
                | StateError::NotAFunction(_)
                | StateError::InvalidOperations(_)
                | StateError::MissingContentProperty { .. }
        )
    }
}

/// A path that could not be restored during rollback.
#[derive(Debug)]
pub struct RollbackFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for RollbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

fn join_failures(failures: &[RollbackFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for atomic-state operations.
pub type Result<T> = std::result::Result<T, StateError>;
