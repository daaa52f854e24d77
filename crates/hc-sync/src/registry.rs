//! Path-keyed registry of in-flight transition tasks.
//!
//! At most one transition task runs per path. Registering a new task for a
//! path cancels and joins the previous one first, so a path's snapshots are
//! never interleaved across two tasks.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use futures_util::future::join_all;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Entry {
    id: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

type EntryMap = FxHashMap<Utf8PathBuf, Entry>;

/// Tracks one cancelable task per path.
///
/// Every task receives a child token of the registry's run token, so
/// cancelling the run token cancels them all.
pub struct TransitionRegistry {
    run: CancellationToken,
    entries: Arc<Mutex<EntryMap>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for TransitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionRegistry")
            .field("in_flight", &self.len())
            .finish_non_exhaustive()
    }
}

impl TransitionRegistry {
    /// Creates a registry whose tasks are children of `run`.
    #[must_use]
    pub fn new(run: CancellationToken) -> Self {
        Self {
            run,
            entries: Arc::new(Mutex::new(EntryMap::default())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Cancels and joins the task for `path`, then spawns `task` in its place.
    ///
    /// `task` is called with the new entry's cancellation token. The spawned
    /// task removes its own entry when it finishes.
    pub async fn replace<F, Fut>(&self, path: Utf8PathBuf, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel(&path).await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.run.child_token();
        let work = task(token.clone());

        let entries = Arc::clone(&self.entries);
        let key = path.clone();

        // Spawn under the lock so the task cannot deregister before it is
        // registered.
        let mut guard = self.entries.lock();
        let handle = tokio::spawn(async move {
            work.await;
            let mut entries = entries.lock();
            if entries.get(&key).is_some_and(|e| e.id == id) {
                entries.remove(&key);
            }
        });
        if let Some(stale) = guard.insert(path, Entry { id, token, handle }) {
            stale.token.cancel();
        }
    }

    /// Cancels and joins the task for `path`, if any.
    ///
    /// Returns `true` if a task was registered.
    pub async fn cancel(&self, path: &Utf8Path) -> bool {
        let entry = self.entries.lock().remove(path);
        match entry {
            Some(entry) => {
                entry.token.cancel();
                join(path, entry.handle).await;
                true
            }
            None => false,
        }
    }

    /// Cancels and joins every registered task.
    pub async fn shutdown(&self) {
        let entries: Vec<_> = self.entries.lock().drain().collect();
        for (_, entry) in &entries {
            entry.token.cancel();
        }

        join_all(
            entries
                .into_iter()
                .map(|(path, entry)| async move { join(&path, entry.handle).await }),
        )
        .await;
    }

    /// Returns `true` if a task is registered for `path`.
    #[must_use]
    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.entries.lock().contains_key(path)
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no tasks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn join(path: &Utf8Path, handle: JoinHandle<()>) {
    match handle.await {
        Err(e) if !e.is_cancelled() => {
            tracing::warn!(path = %path, error = %e, "Transition task ended abnormally");
        }
        _ => {}
    }
}
