//! Event source with async event streaming.
//!
//! This module provides [`EventSource`], which bridges the synchronous
//! `notify` watcher to the tokio runtime for one watched directory.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 notify backend thread                        │
//! │  ┌───────────────────┐   blocking_send   ┌────────────────┐  │
//! │  │ RecommendedWatcher│ ────────────────► │ raw channel    │  │
//! │  └───────────────────┘                   │ (1024)         │  │
//! └──────────────────────────────────────────┴───────┬────────┴──┘
//!                                                    │
//!                                                    ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 Async Runtime (tokio)                        │
//! │  ┌──────────────────┐   classify + filter   ┌─────────────┐  │
//! │  │ translation task │ ────────────────────► │ FileEvent   │  │
//! │  │ (select! cancel) │                       │ channel     │  │
//! │  └──────────────────┘                       └─────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use hc_watcher::{AcceptAllFilter, EventSource};
//! use hc_core::WatchConfig;
//! use camino::Utf8Path;
//!
//! # async fn example() -> Result<(), hc_watcher::WatchError> {
//! let mut source = EventSource::new(
//!     Utf8Path::new("/home/me/homecloud"),
//!     &WatchConfig::default(),
//!     AcceptAllFilter,
//! )?;
//!
//! let mut events = source.start()?;
//! while let Some(event) = events.recv().await {
//!     println!("{} {}", event.kind.label(), event.path);
//! }
//!
//! source.stop().await;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use hc_core::{FileEvent, WatchConfig};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::events::classify_event;
use crate::filter::FileFilter;
use crate::stats::{WatchHealth, WatchStats, WatchStatsSnapshot};

/// Capacity of the channel between the notify thread and the translation task.
///
/// When full, the notify thread blocks until the task catches up.
const RAW_CHANNEL_CAPACITY: usize = 1024;

/// Capacity of the typed event channel handed to the consumer.
const EVENT_CHANNEL_CAPACITY: usize = 100;

type RawEvent = notify::Result<notify::Event>;

/// Resources owned while the source is running.
struct Running {
    watcher: RecommendedWatcher,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Watches one directory and streams typed [`FileEvent`]s.
///
/// # Lifecycle
///
/// 1. **Creation**: [`new()`](Self::new) validates and canonicalizes the
///    path. Nothing is registered yet.
/// 2. **Start**: [`start()`](Self::start) registers the directory with the
///    OS facility and returns the event receiver. A second call fails with
///    [`WatchError::AlreadyRunning`].
/// 3. **Stop**: [`stop()`](Self::stop) cancels the translation task, drops
///    the OS watcher, and joins the task. Stopping twice is a no-op, and a
///    stopped source may be started again.
pub struct EventSource {
    watch_path: Utf8PathBuf,
    recursive: bool,
    filter: Arc<dyn FileFilter>,
    stats: Arc<WatchStats>,
    running: Option<Running>,
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("watch_path", &self.watch_path)
            .field("recursive", &self.recursive)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl EventSource {
    /// Creates an event source for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the path doesn't exist,
    /// [`WatchError::NotADirectory`] if it is not a directory, or
    /// [`WatchError::Io`] if it cannot be canonicalized.
    pub fn new<F: FileFilter>(
        path: &Utf8Path,
        config: &WatchConfig,
        filter: F,
    ) -> Result<Self, WatchError> {
        if !path.exists() {
            return Err(WatchError::path_not_found(path));
        }
        if !path.is_dir() {
            return Err(WatchError::not_a_directory(path));
        }

        let watch_path = path.canonicalize_utf8()?;

        Ok(Self {
            watch_path,
            recursive: config.recursive,
            filter: Arc::new(filter),
            stats: Arc::new(WatchStats::new()),
            running: None,
        })
    }

    /// Registers the directory and starts the translation task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::AlreadyRunning`] if the source is running, or
    /// [`WatchError::Notify`] if the watcher cannot be created or the
    /// directory cannot be registered.
    pub fn start(&mut self) -> Result<mpsc::Receiver<FileEvent>, WatchError> {
        if self.running.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        let (raw_tx, raw_rx) = mpsc::channel::<RawEvent>(RAW_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let callback_stats = Arc::clone(&self.stats);
        let mut watcher = notify::recommended_watcher(move |res: RawEvent| {
            callback_stats.increment_raw();
            // The receiver is gone once the translation task has stopped.
            let _ = raw_tx.blocking_send(res);
        })?;

        let mode = if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(self.watch_path.as_std_path(), mode)?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(translate_loop(
            raw_rx,
            event_tx,
            Arc::clone(&self.filter),
            Arc::clone(&self.stats),
            cancel.clone(),
        ));

        tracing::info!(path = %self.watch_path, recursive = self.recursive, "Event source started");

        self.running = Some(Running {
            watcher,
            cancel,
            task,
        });
        Ok(event_rx)
    }

    /// Stops the source and waits for the translation task to finish.
    ///
    /// Does nothing if the source is not running.
    pub async fn stop(&mut self) {
        let Some(Running {
            watcher,
            cancel,
            task,
        }) = self.running.take()
        else {
            return;
        };

        cancel.cancel();
        drop(watcher);

        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Event translation task ended abnormally");
        }

        tracing::info!(path = %self.watch_path, "Event source stopped");
    }

    /// Returns `true` between a successful [`start()`](Self::start) and
    /// [`stop()`](Self::stop).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Returns the canonical path being watched.
    #[must_use]
    pub fn watch_path(&self) -> &Utf8Path {
        &self.watch_path
    }

    /// Returns the source health.
    #[must_use]
    pub fn health(&self) -> WatchHealth {
        self.stats.health()
    }

    /// Returns a snapshot of the source counters.
    #[must_use]
    pub fn stats(&self) -> WatchStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        // Drop is sync: cancel and let the task wind down on its own.
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}

/// Converts raw notifications into typed events until cancelled.
///
/// Ends quietly when the cancellation token fires, the raw channel closes,
/// or the consumer drops its receiver.
async fn translate_loop(
    mut raw_rx: mpsc::Receiver<RawEvent>,
    event_tx: mpsc::Sender<FileEvent>,
    filter: Arc<dyn FileFilter>,
    stats: Arc<WatchStats>,
    cancel: CancellationToken,
) {
    loop {
        let raw = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            raw = raw_rx.recv() => match raw {
                Some(raw) => raw,
                None => break,
            },
        };

        let event = match raw {
            Ok(event) => event,
            Err(error) => {
                stats.increment_errors();
                tracing::warn!(error = %error, "File watcher error");
                continue;
            }
        };

        let classified = classify_event(event);
        if classified.is_empty() {
            stats.increment_filtered();
            continue;
        }

        for (kind, path) in classified {
            let Some(path) = to_utf8(path) else {
                stats.increment_filtered();
                continue;
            };

            if !filter.should_process(&path) {
                tracing::trace!(path = %path, "Filtered out file event");
                stats.increment_filtered();
                continue;
            }

            let event = FileEvent::new(kind, path);
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                sent = event_tx.send(event) => {
                    if sent.is_err() {
                        tracing::debug!("Event receiver dropped, stopping translation");
                        return;
                    }
                    stats.increment_delivered();
                }
            }
        }
    }
}

fn to_utf8(path: PathBuf) -> Option<Utf8PathBuf> {
    match Utf8PathBuf::try_from(path) {
        Ok(path) => Some(path),
        Err(e) => {
            let err = WatchError::non_utf8_path(e.into_path_buf());
            tracing::warn!(error = %err, "Skipping file event");
            None
        }
    }
}
