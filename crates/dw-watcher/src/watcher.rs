//! Filesystem watcher with async update streaming.
//!
//! This module provides the [`FsWatcher`] type that bridges the synchronous
//! `notify` crate to the async tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                  Blocking Thread (spawn_blocking)              │
//! │  ┌───────────────────┐   ┌──────────┐   ┌──────────────────┐  │
//! │  │ RecommendedWatcher│ → │ decode() │ → │ PathFilter       │  │
//! │  │ (notify, raw)     │   │ (kinds)  │   │ (ignore list)    │  │
//! │  └───────────────────┘   └──────────┘   └────────┬─────────┘  │
//! └───────────────────────────────────────────────────│────────────┘
//!                                       blocking_send │
//!                                                     ▼
//! ┌────────────────────────────────────────────────────────────────┐
//! │                  Async Runtime (tokio)                         │
//! │  ┌───────────────────┐   ┌────────────────────┐                │
//! │  │ FsWatcher         │   │ mpsc::Receiver     │ → event pump   │
//! │  │ (shutdown ctrl)   │   │ (WatchUpdate)      │                │
//! │  └───────────────────┘   └────────────────────┘                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The raw (undebounced) watcher is deliberate: debouncing erases the
//! distinction between creations, modifications, and deletions, and the
//! downstream merge table needs exactly that distinction. Burst collapsing
//! happens there instead, per path and loss-free.

use camino::{Utf8Path, Utf8PathBuf};
use dw_core::{PathEvent, WatchConfig};
use notify::{RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::decode::{decode, Decoded};
use crate::error::WatchError;
use crate::filter::PathFilter;

/// One update from the watcher stream.
#[derive(Debug)]
pub enum WatchUpdate {
    /// A decoded, filtered filesystem event.
    Event(PathEvent),

    /// The OS event queue overflowed; the consumer must treat its view of
    /// the filesystem as stale.
    Lagged,
}

/// A filesystem watcher that streams updates to an async context.
///
/// `FsWatcher` manages a background thread running the `notify` watcher.
/// Decoded events are filtered and sent through a tokio mpsc channel for
/// consumption in async code.
///
/// # Lifecycle
///
/// 1. **Creation**: `FsWatcher::new()` validates the path, creates
///    channels, and spawns a blocking task with the notify watcher.
/// 2. **Reception**: use `recv()` or `try_recv()` to receive updates.
/// 3. **Shutdown**: call `shutdown()` for graceful shutdown, or drop the
///    watcher; dropping sends the shutdown signal without awaiting.
///
/// # Examples
///
/// ```no_run
/// use dw_watcher::{AcceptAllFilter, FsWatcher, WatchUpdate};
/// use dw_core::WatchConfig;
/// use camino::Utf8Path;
///
/// # async fn example() -> Result<(), dw_watcher::WatchError> {
/// let config = WatchConfig::default();
/// let mut watcher = FsWatcher::new(
///     Utf8Path::new("/srv/data"),
///     &config,
///     AcceptAllFilter,
/// ).await?;
///
/// while let Some(update) = watcher.recv().await {
///     match update {
///         WatchUpdate::Event(event) => println!("{}: {}", event.kind, event.path),
///         WatchUpdate::Lagged => eprintln!("event queue overflowed"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct FsWatcher {
    /// Shutdown signal sender; `None` after shutdown is initiated.
    shutdown_tx: Option<oneshot::Sender<()>>,

    /// Handle to the blocking watcher task, awaited during shutdown.
    task_handle: Option<JoinHandle<Result<(), WatchError>>>,

    /// Update receiver for async consumption.
    update_rx: mpsc::Receiver<WatchUpdate>,

    /// The path being watched.
    watch_path: Utf8PathBuf,
}

impl std::fmt::Debug for FsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsWatcher")
            .field("watch_path", &self.watch_path)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FsWatcher {
    /// Creates a new watcher for the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to watch (must exist)
    /// * `config` - Watch configuration (recursive mode, channel capacity)
    /// * `filter` - Filter deciding which paths produce events
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the path does not exist and
    /// [`WatchError::Notify`] if the watcher fails to initialize.
    #[allow(clippy::unused_async)] // Async for API consistency with shutdown()
    pub async fn new<F: PathFilter>(
        path: &Utf8Path,
        config: &WatchConfig,
        filter: F,
    ) -> Result<Self, WatchError> {
        if !path.exists() {
            return Err(WatchError::path_not_found(path));
        }

        let watch_path = path.canonicalize_utf8().map_err(WatchError::Io)?;

        let (update_tx, update_rx) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task_path = watch_path.clone();
        let recursive = config.recursive;

        let task_handle = tokio::task::spawn_blocking(move || {
            run_watcher_loop(task_path, recursive, update_tx, shutdown_rx, filter)
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
            update_rx,
            watch_path,
        })
    }

    /// Receives the next update asynchronously.
    ///
    /// Returns `None` when the watcher has been shut down or the channel
    /// is closed.
    pub async fn recv(&mut self) -> Option<WatchUpdate> {
        self.update_rx.recv().await
    }

    /// Tries to receive an update without blocking.
    ///
    /// # Errors
    ///
    /// Returns `TryRecvError::Empty` when no update is queued and
    /// `TryRecvError::Disconnected` after shutdown.
    pub fn try_recv(&mut self) -> Result<WatchUpdate, mpsc::error::TryRecvError> {
        self.update_rx.try_recv()
    }

    /// Returns a mutable reference to the update receiver.
    ///
    /// Useful for `tokio::select!` loops.
    pub fn updates(&mut self) -> &mut mpsc::Receiver<WatchUpdate> {
        &mut self.update_rx
    }

    /// Returns the path being watched.
    #[must_use]
    pub fn watch_path(&self) -> &Utf8Path {
        &self.watch_path
    }

    /// Returns `true` if the watcher is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Gracefully shuts down the watcher.
    ///
    /// Sends the shutdown signal and awaits the blocking task.
    ///
    /// # Errors
    ///
    /// Returns any error from the watcher thread, or
    /// [`WatchError::ChannelClosed`] if the thread panicked.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // Ignore error if receiver is already dropped
            let _ = tx.send(());
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => result?,
                Err(_join_error) => return Err(WatchError::ChannelClosed),
            }
        }

        Ok(())
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Drop is sync; the task stops when it sees the signal.
    }
}

/// Runs the notify watcher in a blocking context until shutdown.
#[allow(clippy::needless_pass_by_value)] // Path must be owned for the blocking task lifetime
fn run_watcher_loop<F: PathFilter>(
    path: Utf8PathBuf,
    recursive: bool,
    update_tx: mpsc::Sender<WatchUpdate>,
    shutdown_rx: oneshot::Receiver<()>,
    filter: F,
) -> Result<(), WatchError> {
    let tx = update_tx;
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => match decode(event) {
                Decoded::Lagged => {
                    if tx.blocking_send(WatchUpdate::Lagged).is_err() {
                        tracing::debug!("update channel closed, stopping watcher");
                    }
                }
                Decoded::Changes(events) => {
                    for event in events {
                        if !filter.should_process(&event.path) {
                            tracing::trace!(path = %event.path, "filtered out event");
                            continue;
                        }
                        if tx.blocking_send(WatchUpdate::Event(event)).is_err() {
                            tracing::debug!("update channel closed, stopping watcher");
                            break;
                        }
                    }
                }
            },
            Err(error) => {
                tracing::warn!(error = %error, "watcher backend error");
            }
        }
    })?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };

    watcher.watch(path.as_std_path(), mode)?;

    tracing::info!(path = %path, recursive, "filesystem watcher started");

    // Block until the shutdown signal arrives
    let _ = shutdown_rx.blocking_recv();

    tracing::info!(path = %path, "filesystem watcher stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AcceptAllFilter;
    use dw_core::ChangeKind;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_temp_dir() -> TempDir {
        TempDir::new().expect("Failed to create temp directory")
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");

        let watcher = FsWatcher::new(path, &WatchConfig::default(), AcceptAllFilter).await;
        assert!(watcher.is_ok());
        assert!(watcher.expect("Watcher should be created").is_running());
    }

    #[tokio::test]
    async fn test_watcher_path_not_found() {
        let path = Utf8Path::new("/nonexistent/path/that/does/not/exist");

        let result = FsWatcher::new(path, &WatchConfig::default(), AcceptAllFilter).await;
        match result {
            Err(WatchError::PathNotFound(_)) => {}
            other => panic!("Expected PathNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_watcher_shutdown() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");

        let watcher = FsWatcher::new(path, &WatchConfig::default(), AcceptAllFilter)
            .await
            .expect("Failed to create watcher");

        assert!(watcher.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_watcher_receives_create_event() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");

        let mut watcher = FsWatcher::new(path, &WatchConfig::default(), AcceptAllFilter)
            .await
            .expect("Failed to create watcher");

        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, "hello").expect("Failed to write file");

        let update = tokio::time::timeout(Duration::from_secs(2), watcher.recv()).await;

        watcher.shutdown().await.expect("Shutdown failed");

        // Timing-dependent; only assert when the event arrived
        if let Ok(Some(WatchUpdate::Event(event))) = update {
            assert!(event.path.as_str().contains("test.txt"));
            assert!(matches!(
                event.kind,
                ChangeKind::Created | ChangeKind::Modified
            ));
        }
    }

    #[tokio::test]
    async fn test_watch_path_is_canonical() {
        let temp_dir = create_temp_dir();
        let path = Utf8Path::from_path(temp_dir.path()).expect("Invalid path");

        let watcher = FsWatcher::new(path, &WatchConfig::default(), AcceptAllFilter)
            .await
            .expect("Failed to create watcher");

        assert!(!watcher.watch_path().as_str().is_empty());
    }
}
