//! All-or-nothing multi-file writes with snapshot rollback.
//!
//! Coordinates several atomic writes that must succeed or fail as a unit,
//! e.g. moving a record from a "pending" state file to a "resolved" one.
//!
//! ## Execution Guarantees
//!
//! - **Atomicity**: Every write is applied, or every touched path is restored
//! - **Ordering**: Writes are applied in staging order; rollback runs in reverse
//! - **Validation**: Staged requests are checked before any mutation
//! - **Creation undo**: Files the transaction created are deleted on rollback
//!
//! ## Phases
//!
//! 1. **Build**: Stage requests via `write()` or `stage()`
//! 2. **Validate**: Check every request before touching disk
//! 3. **Execute**: Snapshot each target, then atomically write it
//! 4. **Rollback** (on failure): Restore snapshots in LIFO order
//!
//! ## Example
//!
//! ```no_run
//! # use atomic_state::fs::Transaction;
//! # fn example() -> atomic_state::Result<()> {
//! let mut txn = Transaction::new(false);
//!
//! txn.write("pending.json", "{}")?;
//! txn.write("resolved.json", "{\"task-1\": \"done\"}")?;
//!
//! txn.commit()?; // Both files change, or neither does
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, RollbackFailure, StateError};
use crate::fs::atomic::{atomic_write, existing_mode, resolve_target};
use crate::fs::content::{Content, WriteOptions};

use colored::Colorize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A single file change: the unit of work inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub path: PathBuf,
    pub content: Content,
    pub options: WriteOptions,
}

impl WriteRequest {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<Content>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            options: WriteOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }
}

/// State of one path captured immediately before it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub path: PathBuf,
    pub existed_before: bool,
    pub previous_content: Option<Vec<u8>>,
    pub previous_mode: Option<u32>,
}

impl Snapshot {
    /// Captures the current content (or absence) of `path`.
    pub fn capture(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(content) => Ok(Self {
                path: path.to_path_buf(),
                existed_before: true,
                previous_content: Some(content),
                previous_mode: existing_mode(path)?,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self {
                path: path.to_path_buf(),
                existed_before: false,
                previous_content: None,
                previous_mode: None,
            }),
            Err(e) => Err(StateError::io(path, e)),
        }
    }

    /// Puts the path back the way it was captured.
    pub fn restore(&self) -> Result<()> {
        match &self.previous_content {
            Some(content) if self.existed_before => {
                let options = WriteOptions {
                    mode: self.previous_mode,
                    ..WriteOptions::default()
                };
                atomic_write(&self.path, content.clone(), &options)
            }
            _ => match fs::remove_file(resolve_target(&self.path)) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StateError::io(&self.path, e)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    /// Staging requests.
    Building,
    /// All requests applied.
    Committed,
    /// A request failed and every applied request was restored.
    RolledBack,
    /// Validation or rollback failed.
    Failed,
}

/// Transaction coordinating multiple atomic writes.
///
/// Must be explicitly committed. If dropped without committing, logs a warning
/// but doesn't touch disk (since nothing was applied).
///
/// ## Dry-Run Mode
///
/// When `dry_run = true`, requests are validated but not executed.
#[must_use = "Transaction must be committed"]
pub struct Transaction {
    requests: Vec<WriteRequest>,
    dry_run: bool,
    state: TransactionState,
    applied: Vec<Snapshot>,
}

impl Transaction {
    /// Creates a new transaction.
    pub fn new(dry_run: bool) -> Self {
        Self {
            requests: Vec::new(),
            dry_run,
            state: TransactionState::Building,
            applied: Vec::new(),
        }
    }

    /// Creates a transaction with `requests` already staged.
    pub fn from_requests(requests: impl IntoIterator<Item = WriteRequest>) -> Self {
        let mut txn = Self::new(false);
        txn.requests.extend(requests);
        txn
    }

    /// Stages a write with default options.
    pub fn write(&mut self, path: impl Into<PathBuf>, content: impl Into<Content>) -> Result<()> {
        self.stage(WriteRequest::new(path, content))
    }

    /// Stages a write request. Not executed until `commit()`.
    pub fn stage(&mut self, request: WriteRequest) -> Result<()> {
        if self.state != TransactionState::Building {
            return Err(StateError::Other(anyhow::anyhow!(
                "Cannot modify transaction after commit"
            )));
        }

        log::debug!("Staging write for: {}", request.path.display());
        if self.dry_run {
            log::info!("Would write: {}", request.path.display());
        }

        self.requests.push(request);
        Ok(())
    }

    /// Validates all staged requests.
    ///
    /// Checks:
    /// - Every request names a file, not an empty path
    /// - Text content is representable in its encoding
    fn validate(&self) -> Result<()> {
        for (index, request) in self.requests.iter().enumerate() {
            if request.path.file_name().is_none() {
                return Err(StateError::InvalidOperations(format!(
                    "operation {index} has no file name: '{}'",
                    request.path.display()
                )));
            }

            if let Content::Text(text) = &request.content {
                request.options.encoding.encode(text)?;
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Returns true if successfully committed.
    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    /// Returns true if a failed commit was fully undone.
    pub fn is_rolled_back(&self) -> bool {
        self.state == TransactionState::RolledBack
    }

    /// Returns human-readable preview of staged writes.
    pub fn preview(&self) -> Vec<String> {
        self.requests
            .iter()
            .map(|request| {
                let verb = if request.path.exists() {
                    "Update"
                } else {
                    "Create"
                };
                format!("{verb}: {}", request.path.display())
            })
            .collect()
    }

    /// Applies every staged request, rolling back on the first failure.
    ///
    /// On failure the original error is returned once rollback has finished.
    /// If rollback itself could not restore some paths, the error is
    /// [`StateError::RollbackFailed`] wrapping the original error.
    pub fn commit(&mut self) -> Result<()> {
        if self.state != TransactionState::Building {
            return Err(StateError::Other(anyhow::anyhow!(
                "Transaction already committed"
            )));
        }

        if let Err(e) = self.validate() {
            self.state = TransactionState::Failed;
            return Err(e);
        }

        if self.dry_run {
            self.state = TransactionState::Committed;
            return Ok(());
        }

        for index in 0..self.requests.len() {
            if let Err(e) = self.apply(index) {
                log::debug!("Write {} failed, rolling back: {}", index, e);
                return Err(self.rollback(e));
            }
        }

        self.applied.clear();
        self.state = TransactionState::Committed;
        Ok(())
    }

    fn apply(&mut self, index: usize) -> Result<()> {
        let request = &self.requests[index];
        let snapshot = Snapshot::capture(&request.path)?;

        atomic_write(&request.path, request.content.clone(), &request.options)?;

        log::debug!("Applied: {}", request.path.display());
        self.applied.push(snapshot);
        Ok(())
    }

    /// Restores applied snapshots in LIFO order and returns the error to report.
    ///
    /// Every snapshot is attempted even if an earlier restore fails.
    fn rollback(&mut self, cause: StateError) -> StateError {
        let mut failures = Vec::new();

        while let Some(snapshot) = self.applied.pop() {
            match snapshot.restore() {
                Ok(()) => log::debug!("Restored: {}", snapshot.path.display()),
                Err(e) => {
                    log::error!("Failed to restore {}: {}", snapshot.path.display(), e);
                    failures.push(RollbackFailure {
                        path: snapshot.path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            self.state = TransactionState::RolledBack;
            log::info!("Rollback completed");
            cause
        } else {
            self.state = TransactionState::Failed;
            StateError::RollbackFailed {
                source: Box::new(cause),
                failures,
            }
        }
    }

    /// Prints a summary of the transaction to stdout.
    ///
    /// Paths are relative to `root` with forward slashes.
    pub fn print_summary(&self, root: &Path) {
        if self.requests.is_empty() {
            println!("\n{}", "No changes needed".yellow());
            return;
        }

        let display_path = |path: &Path| -> String {
            let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
            relative.to_string_lossy().replace('\\', "/")
        };

        if self.dry_run {
            println!("\n{}", "DRY RUN - No changes will be made".yellow().bold());
        } else {
            println!("\n{}", "Changes applied:".green().bold());
        }

        for request in &self.requests {
            let path = display_path(&request.path);
            let size = format!("({} bytes)", request.content.len());
            if self.dry_run {
                println!("   • {} {}", path.dimmed(), size.dimmed());
            } else {
                println!("   {} {} {}", "✓".green(), path, size.dimmed());
            }
        }

        println!();
        let stats = self.stats();
        if self.dry_run {
            println!(
                "{} {} will be written. Run without {} to apply.",
                stats.total.to_string().cyan().bold(),
                if stats.total > 1 { "files" } else { "file" },
                "--dry-run".cyan()
            );
        } else {
            println!(
                "{} Successfully wrote {} file{}",
                "✓".green().bold(),
                stats.total,
                if stats.total == 1 { "" } else { "s" }
            );
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Building && !self.requests.is_empty() && !self.dry_run
        {
            log::warn!("Transaction dropped without commit");
        }
    }
}

/// Statistics about staged writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStats {
    pub files_created: usize,
    pub files_updated: usize,
    pub total: usize,
}

impl Transaction {
    /// Returns write statistics based on what currently exists on disk.
    pub fn stats(&self) -> TransactionStats {
        let files_updated = self
            .requests
            .iter()
            .filter(|request| request.path.exists())
            .count();

        TransactionStats {
            files_created: self.requests.len() - files_updated,
            files_updated,
            total: self.requests.len(),
        }
    }
}

/// Applies `requests` as one all-or-nothing unit.
///
/// An empty list succeeds without touching disk.
pub fn multi_write(requests: impl IntoIterator<Item = WriteRequest>) -> Result<()> {
    Transaction::from_requests(requests).commit()
}
