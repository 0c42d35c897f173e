//! Single-file atomic primitives.
//!
//! ## Guarantees
//!
//! - **No torn writes**: content goes to a temp file in the target's own
//!   directory, is flushed and synced, then renamed over the target
//! - **Clean failure**: any error before the rename removes the temp file and
//!   leaves the target exactly as it was
//! - **Last rename wins**: concurrent writers to one path never interleave;
//!   the survivor is the complete content of one of them
//! - **Symlinks survive**: writing through a symlink replaces the file it
//!   points to and leaves the link in place

use crate::error::{Result, StateError};
use crate::fs::content::{Content, DEFAULT_MODE, Encoding, UpdateOptions, WriteOptions};

use std::borrow::Cow;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Atomically replaces (or creates) `path` with `content`.
///
/// The parent directory must already exist; otherwise this fails with
/// [`StateError::ParentDirectoryMissing`] before anything is created.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: impl Into<Content>,
    options: &WriteOptions,
) -> Result<()> {
    let target = resolve_target(path.as_ref());
    let path: &Path = &target;
    let content = content.into();

    let parent = parent_dir(path);
    if !parent.is_dir() {
        return Err(StateError::ParentDirectoryMissing(parent.to_path_buf()));
    }

    let bytes = content.to_bytes(options.encoding)?;
    let mode = match options.mode {
        Some(mode) => Some(mode),
        None => existing_mode(path)?,
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| StateError::io(path, ErrorKind::InvalidInput.into()))?
        .to_string_lossy();

    // Dropping `temp` on any early return deletes the temp file.
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| StateError::io(path, e))?;

    log::debug!("Writing {} bytes via {}", bytes.len(), temp.path().display());

    temp.write_all(&bytes)
        .and_then(|_| temp.flush())
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| StateError::io(temp.path(), e))?;

    set_mode(temp.as_file(), mode.unwrap_or(DEFAULT_MODE))
        .map_err(|e| StateError::io(path, e))?;

    temp.persist(path).map_err(|e| StateError::io(path, e.error))?;

    sync_dir(parent);
    log::debug!("Committed: {}", path.display());
    Ok(())
}

/// Reads `path`, applies `update_fn`, and atomically writes the result.
///
/// The update function receives the current content decoded with
/// `options.encoding` (raw bytes when `None`). Returning `Ok(None)` fails with
/// [`StateError::EmptyUpdateResult`]; returning `Err` fails with
/// [`StateError::UpdateFunctionFailed`]. Neither touches the file.
pub fn atomic_update<F>(
    path: impl AsRef<Path>,
    update_fn: F,
    options: &UpdateOptions,
) -> Result<()>
where
    F: FnOnce(Content) -> anyhow::Result<Option<Content>>,
{
    let path = path.as_ref();
    let current = read_current(path, options)?;
    let outcome = update_fn(current);
    commit_update(path, outcome, options)
}

/// Reads and decodes the current content of an update target.
pub(crate) fn read_current(path: &Path, options: &UpdateOptions) -> Result<Content> {
    match fs::read(path) {
        Ok(bytes) => options.decode(bytes, path),
        Err(e) if e.kind() == ErrorKind::NotFound && options.create_if_missing => {
            log::debug!("{} missing, starting from empty content", path.display());
            options.decode(Vec::new(), path)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(StateError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(StateError::io(path, e)),
    }
}

/// Turns an update function's outcome into a write, or into the matching error.
pub(crate) fn commit_update(
    path: &Path,
    outcome: anyhow::Result<Option<Content>>,
    options: &UpdateOptions,
) -> Result<()> {
    match outcome {
        Ok(Some(content)) => atomic_write(path, content, &options.write_options()),
        Ok(None) => Err(StateError::EmptyUpdateResult(path.to_path_buf())),
        Err(source) => Err(StateError::UpdateFunctionFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Reads `path` decoded with `encoding`.
pub fn read_text(path: impl AsRef<Path>, encoding: Encoding) -> Result<String> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => StateError::FileNotFound(path.to_path_buf()),
        _ => StateError::io(path, e),
    })?;
    encoding.decode(&bytes, path)
}

/// Directory a temp file for `path` must live in. A bare file name lives in `.`.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// The file a write to `path` lands in. A symlink is followed, so the rename
/// replaces its target instead of the link. A dangling link resolves to the
/// path it names.
pub(crate) fn resolve_target(path: &Path) -> Cow<'_, Path> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => fs::canonicalize(path)
            .or_else(|_| fs::read_link(path).map(|link| parent_dir(path).join(link)))
            .map(Cow::Owned)
            .unwrap_or(Cow::Borrowed(path)),
        _ => Cow::Borrowed(path),
    }
}

/// Permission bits of an existing file, `None` if it does not exist.
pub(crate) fn existing_mode(path: &Path) -> Result<Option<u32>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(mode_of(&metadata))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StateError::io(path, e)),
    }
}

#[cfg(unix)]
fn mode_of(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        DEFAULT_MODE
    }
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(file: &fs::File, mode: u32) -> std::io::Result<()> {
    let mut perms = file.metadata()?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    file.set_permissions(perms)
}

/// Makes the rename itself durable. Best-effort.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        log::warn!("Could not sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
