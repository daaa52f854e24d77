//! The sync engine.
//!
//! [`SyncEngine`] ties the pieces together: it scans the watch directory,
//! consumes [`FileEvent`]s from an [`EventSource`], keeps the authoritative
//! [`RecordStore`], and drives one transition task per changed path through
//! NOT_SYNCED, SYNCING and SYNCED (or ERROR), publishing every snapshot on
//! the [`StatusBus`].
//!
//! # Architecture
//!
//! ```text
//!  EventSource ──► dispatch loop ──► RecordStore (RwLock)
//!                       │                  ▲
//!                       ▼                  │ generation-checked updates
//!              TransitionRegistry ──► transition task ──► Uploader
//!                                          │
//!                                          ▼
//!                                      StatusBus ──► subscriber
//! ```
//!
//! # Shutdown
//!
//! [`SyncEngine::stop`] cancels the run token, stops the event source, and
//! joins the dispatch loop and every transition task before returning. No
//! task publishes after `stop()` completes.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use hc_core::{Config, ConfigError, FileEvent, FileEventKind, FileRecord, SyncStatus};
use hc_watcher::{EventSource, IgnoreFilter, WatchHealth};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::bus::{StatusBus, StatusReceiver};
use crate::error::{ScanError, SyncError};
use crate::registry::TransitionRegistry;
use crate::scan::{ScanReport, Scanner};
use crate::stats::{EngineStats, SyncStats};
use crate::store::{Generation, Lifecycle, RecordStore, StatusCounts};
use crate::upload::{SimulatedUploader, UploadOutcome, Uploader, upload_with_retry};

/// State shared between the engine handle, the dispatch loop, and the
/// transition tasks.
struct Shared {
    config: Config,
    store: RecordStore,
    bus: StatusBus,
    stats: EngineStats,
    uploader: Arc<dyn Uploader>,
    backoff: Backoff,
}

/// Resources owned while the engine is running.
struct Run {
    cancel: CancellationToken,
    source: EventSource,
    registry: Arc<TransitionRegistry>,
    dispatch: JoinHandle<()>,
}

/// Watches one directory and tracks the sync status of everything in it.
///
/// # Examples
///
/// ```no_run
/// use hc_core::Config;
/// use hc_sync::SyncEngine;
///
/// # async fn example() -> Result<(), hc_sync::SyncError> {
/// let engine = SyncEngine::new(Config::default())?;
/// let Some(mut updates) = engine.subscribe() else {
///     return Ok(());
/// };
///
/// engine.start().await?;
/// while let Some(record) = updates.recv().await {
///     println!("{} {}", record.status, record.path);
/// }
/// engine.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct SyncEngine {
    shared: Arc<Shared>,
    run: Mutex<Option<Run>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("lifecycle", &self.lifecycle())
            .field("records", &self.shared.store.len())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Creates a stopped engine using the [`SimulatedUploader`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self, SyncError> {
        let uploader = Arc::new(SimulatedUploader::from_config(&config.sync));
        Self::with_uploader(config, uploader)
    }

    /// Creates a stopped engine that hands changed files to `uploader`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the configuration is invalid.
    pub fn with_uploader(config: Config, uploader: Arc<dyn Uploader>) -> Result<Self, SyncError> {
        config.validate()?;

        let shared = Shared {
            store: RecordStore::new(),
            bus: StatusBus::new(&config.status_bus),
            stats: EngineStats::new(),
            uploader,
            backoff: Backoff::from_config(&config.sync),
            config,
        };

        Ok(Self {
            shared: Arc::new(shared),
            run: Mutex::new(None),
        })
    }

    /// Scans the directory and starts consuming events.
    ///
    /// The initial scan completes before the event source is registered.
    /// On failure the engine is left stopped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] unless the engine is stopped,
    /// or the scan, filter, or event source error that aborted the start.
    pub async fn start(&self) -> Result<(), SyncError> {
        self.shared.store.begin_start()?;

        match self.launch().await {
            Ok(run) => {
                *self.run.lock() = Some(run);
                self.shared.store.finish_start();
                tracing::info!(
                    root = %self.run_root().unwrap_or_default(),
                    records = self.shared.store.len(),
                    overflow = ?self.shared.bus.policy(),
                    "Sync engine started"
                );
                Ok(())
            }
            Err(e) => {
                self.shared.store.abort_start();
                tracing::warn!(error = %e, "Sync engine failed to start");
                Err(e)
            }
        }
    }

    async fn launch(&self) -> Result<Run, SyncError> {
        let shared = &self.shared;
        let root = resolve_root(&shared.config)?;
        let filter = Arc::new(IgnoreFilter::new(
            &root,
            shared.config.ignore_patterns.as_slice(),
        )?);
        tracing::debug!(root = %root, patterns = filter.len(), "Ignore patterns compiled");

        let report = scanner(&shared.config, &root, Arc::clone(&filter))?
            .scan_blocking()
            .await?;
        shared.stats.increment_scans();
        shared.stats.add_scan_errors(report.errors);
        shared.store.replace_all(report.records);

        let mut source = EventSource::new(&root, &shared.config.watch, filter)?;
        let events = source.start()?;

        let cancel = CancellationToken::new();
        let registry = Arc::new(TransitionRegistry::new(cancel.clone()));
        let dispatch = tokio::spawn(dispatch_loop(
            Arc::clone(shared),
            Arc::clone(&registry),
            events,
            cancel.clone(),
        ));

        Ok(Run {
            cancel,
            source,
            registry,
            dispatch,
        })
    }

    /// Stops the engine and waits for every task to finish.
    ///
    /// A no-op unless the engine is running.
    pub async fn stop(&self) {
        if !self.shared.store.begin_stop() {
            return;
        }

        let run = self.run.lock().take();
        if let Some(mut run) = run {
            run.cancel.cancel();
            run.source.stop().await;
            if let Err(e) = run.dispatch.await {
                tracing::warn!(error = %e, "Dispatch loop ended abnormally");
            }
            run.registry.shutdown().await;
        }

        self.shared.store.finish_stop();
        tracing::info!("Sync engine stopped");
    }

    /// Takes the status receiver. Returns `None` after the first call.
    pub fn subscribe(&self) -> Option<StatusReceiver> {
        self.shared.bus.subscribe()
    }

    /// Returns deep copies of all top-level records, sorted by path.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FileRecord> {
        self.shared.store.snapshot()
    }

    /// Returns a deep copy of the record for `path`, top-level or nested.
    #[must_use]
    pub fn get(&self, path: &Utf8Path) -> Option<FileRecord> {
        self.shared.store.get(path)
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.store.lifecycle()
    }

    /// Returns the number of transition tasks currently registered.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.run.lock().as_ref().map_or(0, |run| run.registry.len())
    }

    /// Returns record counts by status.
    #[must_use]
    pub fn status_counts(&self) -> StatusCounts {
        self.shared.store.status_counts()
    }

    /// Returns a snapshot of the engine and bus counters.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.snapshot(self.shared.bus.stats())
    }

    /// Returns the event source health, or `None` while not running.
    #[must_use]
    pub fn watch_health(&self) -> Option<WatchHealth> {
        self.run.lock().as_ref().map(|run| run.source.health())
    }

    /// Returns the canonical directory being watched, or `None` while not
    /// running.
    #[must_use]
    pub fn run_root(&self) -> Option<Utf8PathBuf> {
        self.run
            .lock()
            .as_ref()
            .map(|run| run.source.watch_path().to_owned())
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().take() {
            run.cancel.cancel();
        }
    }
}

/// Runs one initial scan of the configured directory without starting an
/// engine.
///
/// # Errors
///
/// Returns a [`SyncError`] if the directory is missing or an ignore pattern
/// is invalid.
pub async fn scan_once(config: &Config) -> Result<ScanReport, SyncError> {
    let root = resolve_root(config)?;
    let filter = Arc::new(IgnoreFilter::new(&root, config.ignore_patterns.as_slice())?);
    Ok(scanner(config, &root, filter)?.scan_blocking().await?)
}

fn scanner(
    config: &Config,
    root: &Utf8Path,
    filter: Arc<IgnoreFilter>,
) -> Result<Scanner, ScanError> {
    Ok(Scanner::new(root)?
        .with_follow_links(config.watch.follow_links)
        .with_checksums(config.sync.compute_checksums)
        .with_ignore(filter))
}

/// Returns the canonical form of the first configured watch directory, so
/// scanned paths and event paths share one spelling.
fn resolve_root(config: &Config) -> Result<Utf8PathBuf, SyncError> {
    let dir = config
        .watch_dir()
        .ok_or_else(|| ConfigError::invalid_option("watchDirs", "no watch directory configured"))?;

    if !dir.exists() {
        return Err(ScanError::RootNotFound(dir.to_owned()).into());
    }
    if !dir.is_dir() {
        return Err(ScanError::RootNotADirectory(dir.to_owned()).into());
    }
    dir.canonicalize_utf8()
        .map_err(|e| ScanError::metadata(dir, e).into())
}

async fn dispatch_loop(
    shared: Arc<Shared>,
    registry: Arc<TransitionRegistry>,
    mut events: mpsc::Receiver<FileEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        shared.stats.increment_events();
        tracing::debug!(kind = event.kind.label(), path = %event.path, "Dispatching file event");

        match event.kind {
            FileEventKind::Created | FileEventKind::Modified => {
                handle_change(&shared, &registry, event, &cancel).await;
            }
            FileEventKind::Deleted => handle_delete(&shared, &registry, event.path, &cancel).await,
            FileEventKind::Renamed => {
                shared.stats.increment_renames();
                // Destination if it exists now, source otherwise.
                if tokio::fs::try_exists(&event.path).await.unwrap_or(false) {
                    handle_change(&shared, &registry, event, &cancel).await;
                } else {
                    handle_delete(&shared, &registry, event.path, &cancel).await;
                }
            }
        }
    }

    tracing::debug!("Dispatch loop exited");
}

async fn handle_change(
    shared: &Arc<Shared>,
    registry: &TransitionRegistry,
    event: FileEvent,
    cancel: &CancellationToken,
) {
    shared.stats.increment_changes();
    let path = event.path;

    let (record, generation) = shared.store.apply_change(&path, event.timestamp);
    registry.cancel(&path).await;
    shared.bus.publish(record, cancel).await;

    let task_shared = Arc::clone(shared);
    let task_path = path.clone();
    registry
        .replace(path, move |token| {
            transition(task_shared, task_path, generation, token)
        })
        .await;
}

async fn handle_delete(
    shared: &Shared,
    registry: &TransitionRegistry,
    path: Utf8PathBuf,
    cancel: &CancellationToken,
) {
    let removed = shared.store.remove(&path);
    registry.cancel(&path).await;

    if removed {
        shared.stats.increment_deletes();
        shared.bus.publish(FileRecord::removed(path), cancel).await;
    } else {
        shared.stats.increment_untracked_deletes();
        tracing::trace!(path = %path, "Ignoring delete of untracked path");
    }
}

/// Drives one path from NOT_SYNCED to SYNCED or ERROR.
///
/// Every store update is conditional on `generation`, so a task overtaken
/// by a newer change or a delete stops without touching the record.
async fn transition(
    shared: Arc<Shared>,
    path: Utf8PathBuf,
    generation: Generation,
    token: CancellationToken,
) {
    let Some(syncing) = shared.store.set_status(&path, generation, SyncStatus::Syncing) else {
        return;
    };
    shared.bus.publish(syncing.clone(), &token).await;

    let outcome = upload_with_retry(
        shared.uploader.as_ref(),
        &syncing,
        shared.backoff,
        shared.config.sync.max_retries,
        &token,
    )
    .await;

    let status = match outcome {
        UploadOutcome::Uploaded => SyncStatus::Synced,
        UploadOutcome::Failed(e) => {
            tracing::warn!(path = %path, error = %e, "Upload failed");
            SyncStatus::Error
        }
        UploadOutcome::Cancelled => return,
    };

    let Some(done) = shared.store.set_status(&path, generation, status) else {
        return;
    };
    match status {
        SyncStatus::Synced => shared.stats.increment_uploads(),
        _ => shared.stats.increment_upload_failures(),
    }
    shared.bus.publish(done, &token).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(dir: &Utf8Path) -> Config {
        let mut config = Config::default();
        config.set_watch_dir(dir.to_owned());
        config.sync.upload_latency_ms = 1;
        config
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.status_bus.capacity = 0;
        assert!(matches!(SyncEngine::new(config), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_new_engine_is_stopped() {
        let engine = SyncEngine::new(Config::default()).unwrap();
        assert_eq!(engine.lifecycle(), Lifecycle::Stopped);
        assert_eq!(engine.in_flight(), 0);
        assert!(engine.watch_health().is_none());
        assert!(engine.snapshot().is_empty());
    }

    #[test]
    fn test_subscribe_once() {
        let engine = SyncEngine::new(Config::default()).unwrap();
        assert!(engine.subscribe().is_some());
        assert!(engine.subscribe().is_none());
    }

    #[tokio::test]
    async fn test_start_missing_root_stays_stopped() {
        let temp = tempfile::tempdir().unwrap();
        let missing = Utf8Path::from_path(temp.path()).unwrap().join("missing");
        let engine = SyncEngine::new(config_for(&missing)).unwrap();

        let err = engine.start().await.unwrap_err();
        assert!(matches!(err, SyncError::Scan(ScanError::RootNotFound(_))));
        assert_eq!(engine.lifecycle(), Lifecycle::Stopped);
        assert_eq!(engine.stats().scans, 0);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let engine = SyncEngine::new(Config::default()).unwrap();
        engine.stop().await;
        assert_eq!(engine.lifecycle(), Lifecycle::Stopped);
    }

    #[tokio::test]
    async fn test_scan_once_uses_ignore_patterns() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        std::fs::write(root.join("keep.txt"), b"keep").unwrap();
        std::fs::write(root.join("skip.tmp"), b"skip").unwrap();

        let report = scan_once(&config_for(root)).await.unwrap();
        let names: Vec<_> = report
            .sorted_records()
            .iter()
            .filter_map(|r| r.file_name().map(str::to_owned))
            .collect();
        assert_eq!(names, vec!["keep.txt".to_owned()]);
    }
}
