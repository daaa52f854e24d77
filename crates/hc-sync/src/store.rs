//! Authoritative in-memory record state.
//!
//! [`RecordStore`] holds the engine lifecycle and the path-keyed record map
//! behind one `parking_lot::RwLock`. Mutations take the write lock, reads
//! take the read lock, and every value leaving the store is a deep copy.
//! No method holds the lock across an `.await`.
//!
//! # Generations
//!
//! Every change assigns the record a fresh generation. A transition task
//! carries the generation it was started for and may only mutate the record
//! while that generation is current, so a task overtaken by a newer change
//! or a delete becomes a no-op.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use hc_core::{FileRecord, SyncStatus};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::scan::RecordMap;

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Not running. The only state from which `start()` proceeds.
    #[default]
    Stopped,
    /// Scanning and registering the event source.
    Starting,
    /// Consuming events.
    Running,
    /// Cancelling and joining tasks.
    Stopping,
}

impl Lifecycle {
    /// Returns the lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Generation a change was registered under.
pub type Generation = u64;

#[derive(Debug)]
struct Tracked {
    record: FileRecord,
    generation: Generation,
}

#[derive(Debug, Default)]
struct State {
    lifecycle: Lifecycle,
    records: FxHashMap<Utf8PathBuf, Tracked>,
    next_generation: Generation,
}

impl State {
    fn bump(&mut self) -> Generation {
        self.next_generation += 1;
        self.next_generation
    }

    /// Finds `path` either at top level or nested in its parent.
    fn find(&self, path: &Utf8Path) -> Option<&FileRecord> {
        if let Some(tracked) = self.records.get(path) {
            return Some(&tracked.record);
        }
        let (parent, name) = split(path)?;
        self.records.get(parent)?.record.child(name)
    }

    /// Removes the nested copy of `path` from its parent, if any.
    fn remove_nested(&mut self, path: &Utf8Path) -> Option<FileRecord> {
        let (parent, name) = split(path)?;
        self.records.get_mut(parent)?.record.remove_child(name)
    }
}

fn split(path: &Utf8Path) -> Option<(&Utf8Path, &str)> {
    Some((path.parent()?, path.file_name()?))
}

/// Counts of top-level and nested records by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    /// Records awaiting upload.
    pub not_synced: usize,
    /// Records being uploaded.
    pub syncing: usize,
    /// Records in sync.
    pub synced: usize,
    /// Records whose upload failed.
    pub error: usize,
}

impl StatusCounts {
    fn add(&mut self, status: SyncStatus) {
        match status {
            SyncStatus::NotSynced => self.not_synced += 1,
            SyncStatus::Syncing => self.syncing += 1,
            SyncStatus::Synced => self.synced += 1,
            SyncStatus::Error => self.error += 1,
        }
    }

    /// Returns the total number of records counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.not_synced + self.syncing + self.synced + self.error
    }
}

/// Lifecycle plus path-keyed records under one lock.
#[derive(Debug, Default)]
pub struct RecordStore {
    state: RwLock<State>,
}

impl RecordStore {
    /// Creates an empty, stopped store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.state.read().lifecycle
    }

    /// Moves `Stopped` to `Starting`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] from any other state.
    pub fn begin_start(&self) -> Result<(), SyncError> {
        let mut state = self.state.write();
        if state.lifecycle != Lifecycle::Stopped {
            return Err(SyncError::AlreadyRunning);
        }
        state.lifecycle = Lifecycle::Starting;
        Ok(())
    }

    /// Replaces every record with the scan result.
    pub fn replace_all(&self, records: RecordMap) {
        let mut state = self.state.write();
        let generation = state.bump();
        state.records = records
            .into_iter()
            .map(|(path, record)| (path, Tracked { record, generation }))
            .collect();
    }

    /// Moves `Starting` to `Running`.
    pub fn finish_start(&self) {
        self.set_lifecycle(Lifecycle::Running);
    }

    /// Returns a failed start to `Stopped`.
    pub fn abort_start(&self) {
        self.set_lifecycle(Lifecycle::Stopped);
    }

    /// Moves `Running` to `Stopping`. Returns `false` from any other state.
    pub fn begin_stop(&self) -> bool {
        let mut state = self.state.write();
        if state.lifecycle != Lifecycle::Running {
            return false;
        }
        state.lifecycle = Lifecycle::Stopping;
        true
    }

    /// Moves `Stopping` to `Stopped`.
    pub fn finish_stop(&self) {
        self.set_lifecycle(Lifecycle::Stopped);
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        self.state.write().lifecycle = lifecycle;
    }

    /// Replaces the record for `path` with a fresh not-synced record.
    ///
    /// A nested copy of `path` in its parent is pruned, so the path ends up
    /// with exactly one, top-level, record. Returns a copy of the new record
    /// and its generation.
    pub fn apply_change(
        &self,
        path: &Utf8Path,
        timestamp: DateTime<Utc>,
    ) -> (FileRecord, Generation) {
        let mut state = self.state.write();
        state.remove_nested(path);

        let generation = state.bump();
        let record = FileRecord::changed(path.to_owned(), timestamp);
        let snapshot = record.clone();
        state
            .records
            .insert(path.to_owned(), Tracked { record, generation });
        (snapshot, generation)
    }

    /// Stops tracking `path`. Returns `false` if it was not tracked.
    pub fn remove(&self, path: &Utf8Path) -> bool {
        let mut state = self.state.write();
        state.records.remove(path).is_some() || state.remove_nested(path).is_some()
    }

    /// Applies `update` to the record if `generation` is still current.
    ///
    /// Returns a copy of the updated record, or `None` if the record was
    /// removed or replaced since.
    pub fn update_if_current<F>(
        &self,
        path: &Utf8Path,
        generation: Generation,
        update: F,
    ) -> Option<FileRecord>
    where
        F: FnOnce(&mut FileRecord),
    {
        let mut state = self.state.write();
        let tracked = state.records.get_mut(path)?;
        if tracked.generation != generation {
            return None;
        }
        update(&mut tracked.record);
        Some(tracked.record.clone())
    }

    /// Sets the status of a current record.
    pub fn set_status(
        &self,
        path: &Utf8Path,
        generation: Generation,
        status: SyncStatus,
    ) -> Option<FileRecord> {
        self.update_if_current(path, generation, |record| {
            record.status = status;
            if status == SyncStatus::Synced {
                record.last_synced = Some(Utc::now());
            }
        })
    }

    /// Returns deep copies of all top-level records, sorted by path.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FileRecord> {
        let mut records: Vec<_> = self
            .state
            .read()
            .records
            .values()
            .map(|t| t.record.clone())
            .collect();
        records.sort_unstable_by(|a, b| a.path.cmp(&b.path));
        records
    }

    /// Returns a deep copy of the record for `path`, top-level or nested.
    #[must_use]
    pub fn get(&self, path: &Utf8Path) -> Option<FileRecord> {
        self.state.read().find(path).cloned()
    }

    /// Returns `true` if `path` is tracked, top-level or nested.
    #[must_use]
    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.state.read().find(path).is_some()
    }

    /// Returns the number of top-level records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Counts every record, nested children included, by status.
    #[must_use]
    pub fn status_counts(&self) -> StatusCounts {
        let state = self.state.read();
        let mut counts = StatusCounts::default();
        for tracked in state.records.values() {
            counts.add(tracked.record.status);
            for child in tracked.record.children.values() {
                counts.add(child.status);
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::build_tree;

    fn scanned(path: &str, is_dir: bool) -> FileRecord {
        let now = Utc::now();
        FileRecord::scanned(Utf8PathBuf::from(path), is_dir, 1, now, now)
    }

    fn seeded() -> RecordStore {
        let store = RecordStore::new();
        store.replace_all(build_tree(vec![
            scanned("/w/a.txt", false),
            scanned("/w/docs", true),
            scanned("/w/docs/b.txt", false),
        ]));
        store
    }

    #[test]
    fn test_lifecycle_transitions() {
        let store = RecordStore::new();
        assert_eq!(store.lifecycle(), Lifecycle::Stopped);
        assert!(!store.begin_stop());

        store.begin_start().unwrap();
        assert_eq!(store.lifecycle(), Lifecycle::Starting);
        assert!(matches!(store.begin_start(), Err(SyncError::AlreadyRunning)));

        store.finish_start();
        assert!(matches!(store.begin_start(), Err(SyncError::AlreadyRunning)));
        assert!(store.begin_stop());
        assert!(!store.begin_stop());

        store.finish_stop();
        assert!(store.begin_start().is_ok());
    }

    #[test]
    fn test_abort_start_allows_retry() {
        let store = RecordStore::new();
        store.begin_start().unwrap();
        store.abort_start();
        assert!(store.begin_start().is_ok());
    }

    #[test]
    fn test_snapshot_is_sorted_and_isolated() {
        let store = seeded();
        let mut snapshot = store.snapshot();

        let paths: Vec<_> = snapshot.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/w/a.txt", "/w/docs"]);

        snapshot[1].children.clear();
        assert!(store.get(Utf8Path::new("/w/docs/b.txt")).is_some());
    }

    #[test]
    fn test_get_finds_nested_child() {
        let store = seeded();
        let b = store.get(Utf8Path::new("/w/docs/b.txt")).unwrap();
        assert_eq!(b.status, SyncStatus::Synced);
        assert!(store.get(Utf8Path::new("/w/missing")).is_none());
    }

    #[test]
    fn test_change_prunes_nested_copy() {
        let store = seeded();
        let (record, _) = store.apply_change(Utf8Path::new("/w/docs/b.txt"), Utc::now());

        assert_eq!(record.status, SyncStatus::NotSynced);
        let docs = store.get(Utf8Path::new("/w/docs")).unwrap();
        assert!(!docs.is_tracked_child("b.txt"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_change_replaces_wholesale() {
        let store = seeded();
        let (record, _) = store.apply_change(Utf8Path::new("/w/docs"), Utc::now());

        assert_eq!(record.size, 0);
        assert!(record.children.is_empty());
        assert!(record.last_synced.is_none());
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let store = RecordStore::new();
        let path = Utf8Path::new("/w/a.txt");

        let (_, first) = store.apply_change(path, Utc::now());
        let (_, second) = store.apply_change(path, Utc::now());
        assert_ne!(first, second);

        assert!(store.set_status(path, first, SyncStatus::Syncing).is_none());
        let updated = store.set_status(path, second, SyncStatus::Synced).unwrap();
        assert_eq!(updated.status, SyncStatus::Synced);
        assert!(updated.last_synced.is_some());
    }

    #[test]
    fn test_removed_record_rejects_updates() {
        let store = RecordStore::new();
        let path = Utf8Path::new("/w/a.txt");
        let (_, generation) = store.apply_change(path, Utc::now());

        assert!(store.remove(path));
        assert!(store.set_status(path, generation, SyncStatus::Synced).is_none());
        assert!(!store.contains(path));
    }

    #[test]
    fn test_remove_nested_and_untracked() {
        let store = seeded();
        assert!(store.remove(Utf8Path::new("/w/docs/b.txt")));
        assert!(!store.contains(Utf8Path::new("/w/docs/b.txt")));
        assert!(!store.remove(Utf8Path::new("/w/never-seen.txt")));
    }

    #[test]
    fn test_status_counts() {
        let store = seeded();
        store.apply_change(Utf8Path::new("/w/new.txt"), Utc::now());

        let counts = store.status_counts();
        assert_eq!(counts.synced, 3);
        assert_eq!(counts.not_synced, 1);
        assert_eq!(counts.total(), 4);
    }
}
