//! Async versions of the atomic primitives.
//!
//! Blocking filesystem work runs on tokio's blocking pool. A write task that
//! has started always runs to completion: dropping the returned future never
//! leaves a torn file or a half-applied transaction behind.

use crate::error::{Result, StateError};
use crate::fs::atomic::{self, commit_update, read_current};
use crate::fs::content::{Content, Encoding, UpdateOptions, WriteOptions};
use crate::fs::transaction::{self, WriteRequest};

use std::future::Future;
use std::path::PathBuf;

async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| StateError::Other(anyhow::anyhow!("blocking file task failed: {e}")))?
}

/// See [`atomic::atomic_write`].
pub async fn atomic_write(
    path: impl Into<PathBuf>,
    content: impl Into<Content>,
    options: WriteOptions,
) -> Result<()> {
    let path = path.into();
    let content = content.into();
    blocking(move || atomic::atomic_write(&path, content, &options)).await
}

/// See [`atomic::atomic_update`]; the update function may suspend.
///
/// The file is read, then the update future is awaited on the caller's task,
/// then the result is written. A failing or empty update never writes.
pub async fn atomic_update<F, Fut>(
    path: impl Into<PathBuf>,
    update_fn: F,
    options: UpdateOptions,
) -> Result<()>
where
    F: FnOnce(Content) -> Fut,
    Fut: Future<Output = anyhow::Result<Option<Content>>>,
{
    let path = path.into();

    let read_path = path.clone();
    let current = blocking(move || read_current(&read_path, &options)).await?;

    let outcome = update_fn(current).await;

    blocking(move || commit_update(&path, outcome, &options)).await
}

/// [`atomic_update`] with a synchronous update function.
pub async fn atomic_update_with<F>(
    path: impl Into<PathBuf>,
    update_fn: F,
    options: UpdateOptions,
) -> Result<()>
where
    F: FnOnce(Content) -> anyhow::Result<Option<Content>> + Send + 'static,
{
    let path = path.into();
    blocking(move || atomic::atomic_update(&path, update_fn, &options)).await
}

/// See [`transaction::multi_write`].
pub async fn multi_write(requests: Vec<WriteRequest>) -> Result<()> {
    blocking(move || transaction::multi_write(requests)).await
}

/// Reads `path` decoded with `encoding`.
pub async fn read_text(path: impl Into<PathBuf>, encoding: Encoding) -> Result<String> {
    let path = path.into();
    blocking(move || atomic::read_text(&path, encoding)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_async_write_and_read() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("state.json");

        atomic_write(&file, "{\"step\":1}", WriteOptions::new())
            .await
            .unwrap();

        let text = read_text(&file, Encoding::Utf8).await.unwrap();
        assert_eq!(text, "{\"step\":1}");
    }

    #[tokio::test]
    async fn test_async_update_awaits_transform() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("log.txt");
        fs::write(&file, "a").unwrap();

        atomic_update(
            &file,
            |c| async move {
                tokio::task::yield_now().await;
                let next = format!("{}b", c.as_text().unwrap_or_default());
                Ok::<_, anyhow::Error>(Some(Content::from(next)))
            },
            UpdateOptions::new(),
        )
        .await
        .unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "ab");
    }

    #[tokio::test]
    async fn test_async_update_rejection_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("state.json");
        fs::write(&file, "keep").unwrap();

        let failed = atomic_update(
            &file,
            |_| async { Err::<Option<Content>, _>(anyhow::anyhow!("rejected")) },
            UpdateOptions::new(),
        )
        .await;
        assert!(matches!(failed, Err(StateError::UpdateFunctionFailed { .. })));

        let empty = atomic_update(
            &file,
            |_| async { Ok::<_, anyhow::Error>(None::<Content>) },
            UpdateOptions::new(),
        )
        .await;
        assert!(matches!(empty, Err(StateError::EmptyUpdateResult(_))));

        assert_eq!(fs::read_to_string(&file).unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_async_update_with_sync_transform() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("n.txt");

        atomic_update_with(
            &file,
            |_| Ok(Some("7".into())),
            UpdateOptions::new().create_if_missing(true),
        )
        .await
        .unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "7");
    }

    #[tokio::test]
    async fn test_async_multi_write_rolls_back() {
        let temp = TempDir::new().unwrap();
        let f1 = temp.path().join("f1.json");
        let f2 = temp.path().join("missing").join("f2.json");
        fs::write(&f1, "C1").unwrap();

        let result = multi_write(vec![
            WriteRequest::new(&f1, "A"),
            WriteRequest::new(&f2, "B"),
        ])
        .await;

        assert!(matches!(result, Err(StateError::ParentDirectoryMissing(_))));
        assert_eq!(fs::read_to_string(&f1).unwrap(), "C1");
        assert!(!f2.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_async_writes_never_tear() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("race.json");
        let contents: Vec<String> = (0..16)
            .map(|i| format!("{i:02}").repeat(8 * 1024))
            .collect();

        let handles: Vec<_> = contents
            .iter()
            .cloned()
            .map(|content| tokio::spawn(atomic_write(file.clone(), content, WriteOptions::new())))
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let survivor = fs::read_to_string(&file).unwrap();
        assert!(contents.contains(&survivor));
    }
}
