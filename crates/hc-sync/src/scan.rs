//! Initial directory scan.
//!
//! This module provides [`Scanner`], which walks the watch directory with
//! the `ignore` crate and builds the initial record map.
//!
//! # Nesting
//!
//! The record tree is built in two passes so the result does not depend on
//! walk order:
//!
//! 1. Every entry below the root becomes a [`FileRecord`].
//! 2. Each file whose parent directory has a record is moved into that
//!    parent's children. Directories, root-level files, and files whose
//!    parent was skipped stay top-level.
//!
//! ```text
//! /watch/a.txt          ─► top-level
//! /watch/docs           ─► top-level
//! /watch/docs/b.txt     ─► /watch/docs.children["b.txt"]
//! /watch/docs/img       ─► top-level
//! /watch/docs/img/c.png ─► /watch/docs/img.children["c.png"]
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use hc_sync::Scanner;
//! use camino::Utf8Path;
//!
//! let report = Scanner::new(Utf8Path::new("/home/me/homecloud"))?
//!     .with_checksums(true)
//!     .scan();
//!
//! println!("{} records, {} errors", report.records.len(), report.errors);
//! # Ok::<(), hc_sync::ScanError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use hc_core::{FileRecord, file_checksum};
use hc_watcher::IgnoreFilter;
use ignore::WalkBuilder;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::ScanError;

/// Path-keyed record map produced by a scan.
pub type RecordMap = FxHashMap<Utf8PathBuf, FileRecord>;

/// Result of a completed scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Top-level records keyed by path, with files nested in their parents.
    pub records: RecordMap,
    /// Number of files found.
    pub files: usize,
    /// Number of directories found.
    pub directories: usize,
    /// Entries skipped because of walk, metadata, or UTF-8 errors.
    pub errors: usize,
    /// Files whose checksum could not be computed.
    pub checksum_errors: usize,
    /// Wall time spent scanning.
    pub elapsed: Duration,
}

impl ScanReport {
    /// Returns the top-level records sorted by path.
    #[must_use]
    pub fn sorted_records(&self) -> Vec<&FileRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_unstable_by(|a, b| a.path.cmp(&b.path));
        records
    }

    /// Returns the total number of records, nested children included.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.records.values().map(|r| 1 + r.child_count()).sum()
    }
}

/// Walks a directory tree and builds its initial records.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: Utf8PathBuf,
    follow_links: bool,
    compute_checksums: bool,
    ignore: Option<Arc<IgnoreFilter>>,
}

impl Scanner {
    /// Creates a scanner rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::RootNotFound`] or [`ScanError::RootNotADirectory`]
    /// if the root is unusable.
    pub fn new(root: &Utf8Path) -> Result<Self, ScanError> {
        if !root.exists() {
            return Err(ScanError::RootNotFound(root.to_owned()));
        }
        if !root.is_dir() {
            return Err(ScanError::RootNotADirectory(root.to_owned()));
        }

        Ok(Self {
            root: root.to_owned(),
            follow_links: false,
            compute_checksums: false,
            ignore: None,
        })
    }

    /// Configures whether symbolic links are followed.
    #[must_use]
    pub const fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Configures whether file checksums are computed.
    #[must_use]
    pub const fn with_checksums(mut self, compute: bool) -> Self {
        self.compute_checksums = compute;
        self
    }

    /// Skips entries matched by `filter`. Ignored directories are pruned.
    #[must_use]
    pub fn with_ignore(mut self, filter: Arc<IgnoreFilter>) -> Self {
        self.ignore = Some(filter);
        self
    }

    /// Runs the scan on the current thread.
    ///
    /// Per-entry errors are logged and counted; the walk continues.
    pub fn scan(&self) -> ScanReport {
        let started = Instant::now();
        let synced_at = Utc::now();

        let (mut records, errors) = self.collect_records(synced_at);
        let checksum_errors = if self.compute_checksums {
            fill_checksums(&mut records)
        } else {
            0
        };

        let directories = records.iter().filter(|r| r.is_directory).count();
        let files = records.len() - directories;
        let records = build_tree(records);

        let report = ScanReport {
            records,
            files,
            directories,
            errors,
            checksum_errors,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            root = %self.root,
            files = report.files,
            directories = report.directories,
            errors = report.errors,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Initial scan complete"
        );
        report
    }

    /// Runs the scan on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Task`] if the blocking task panics.
    pub async fn scan_blocking(self) -> Result<ScanReport, ScanError> {
        tokio::task::spawn_blocking(move || self.scan())
            .await
            .map_err(|e| ScanError::Task(e.to_string()))
    }

    /// Pass 1: one flat record per entry below the root.
    fn collect_records(&self, synced_at: DateTime<Utc>) -> (Vec<FileRecord>, usize) {
        let mut records = Vec::new();
        let mut errors = 0;

        for result in self.build_walker() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    report_skipped(&ScanError::Walk(e));
                    errors += 1;
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let Some(path) = Utf8Path::from_path(entry.path()) else {
                report_skipped(&ScanError::NonUtf8Path(entry.path().to_owned()));
                errors += 1;
                continue;
            };

            match self.record_for(path, synced_at) {
                Ok(record) => records.push(record),
                Err(e) => {
                    report_skipped(&e);
                    errors += 1;
                }
            }
        }

        (records, errors)
    }

    fn record_for(
        &self,
        path: &Utf8Path,
        synced_at: DateTime<Utc>,
    ) -> Result<FileRecord, ScanError> {
        let metadata = if self.follow_links {
            std::fs::metadata(path)
        } else {
            std::fs::symlink_metadata(path)
        }
        .map_err(|e| ScanError::metadata(path, e))?;

        let last_modified = metadata
            .modified()
            .map_or(synced_at, DateTime::<Utc>::from);

        Ok(FileRecord::scanned(
            path.to_owned(),
            metadata.is_dir(),
            metadata.len(),
            last_modified,
            synced_at,
        ))
    }

    fn build_walker(&self) -> ignore::Walk {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .follow_links(self.follow_links)
            .threads(1);

        if let Some(filter) = &self.ignore {
            let filter = Arc::clone(filter);
            builder.filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                Utf8Path::from_path(entry.path())
                    .is_none_or(|path| !filter.is_ignored(path, is_dir))
            });
        }

        builder.build()
    }
}

/// Pass 2: nests each file under its parent directory's record.
///
/// Lookups go straight to the parent path, so the input order does not
/// matter.
///
/// # Examples
///
/// ```
/// use hc_sync::build_tree;
/// use hc_core::FileRecord;
/// use camino::{Utf8Path, Utf8PathBuf};
/// use chrono::Utc;
///
/// let now = Utc::now();
/// let records = vec![
///     FileRecord::scanned(Utf8PathBuf::from("/w/docs/b.txt"), false, 1, now, now),
///     FileRecord::scanned(Utf8PathBuf::from("/w/docs"), true, 0, now, now),
/// ];
///
/// let tree = build_tree(records);
/// assert_eq!(tree.len(), 1);
/// assert!(tree[Utf8Path::new("/w/docs")].is_tracked_child("b.txt"));
/// ```
#[must_use]
pub fn build_tree(records: Vec<FileRecord>) -> RecordMap {
    let (directories, files): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|r| r.is_directory);

    let mut map = RecordMap::default();
    map.reserve(directories.len() + files.len());
    for dir in directories {
        map.insert(dir.path.clone(), dir);
    }

    for file in files {
        let parent = file
            .parent()
            .filter(|p| map.get(*p).is_some_and(|r| r.is_directory))
            .map(Utf8Path::to_owned);

        match parent.and_then(|p| map.get_mut(&p)) {
            Some(dir) => {
                if let Some(unnamed) = dir.insert_child(file) {
                    map.insert(unnamed.path.clone(), unnamed);
                }
            }
            None => {
                map.insert(file.path.clone(), file);
            }
        }
    }

    map
}

/// Computes checksums for every file in parallel. Returns the failure count.
fn fill_checksums(records: &mut [FileRecord]) -> usize {
    let failures = AtomicUsize::new(0);

    records
        .par_iter_mut()
        .filter(|r| !r.is_directory)
        .for_each(|record| match file_checksum(&record.path) {
            Ok(digest) => record.checksum = Some(digest),
            Err(e) => {
                tracing::warn!(path = %record.path, error = %e, "Failed to checksum file");
                failures.fetch_add(1, Ordering::Relaxed);
            }
        });

    failures.into_inner()
}

fn report_skipped(error: &ScanError) {
    match error.path() {
        Some(path) => tracing::warn!(path = %path, error = %error, "Skipping entry during scan"),
        None => tracing::warn!(error = %error, "Skipping entry during scan"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hc_core::SyncStatus;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().canonicalize().unwrap()).unwrap();
        fs::write(root.join("a.txt"), "0123456789").unwrap();
        fs::create_dir(root.join("docs")).unwrap();
        fs::write(root.join("docs").join("b.txt"), "abc").unwrap();
        (dir, root)
    }

    fn record(path: &str, is_dir: bool) -> FileRecord {
        let now = Utc::now();
        FileRecord::scanned(Utf8PathBuf::from(path), is_dir, 0, now, now)
    }

    #[test]
    fn test_scanner_root_not_found() {
        let result = Scanner::new(Utf8Path::new("/nonexistent/scan/root"));
        assert!(matches!(result, Err(ScanError::RootNotFound(_))));
    }

    #[test]
    fn test_scanner_root_not_a_directory() {
        let (_dir, root) = fixture();
        let result = Scanner::new(&root.join("a.txt"));
        assert!(matches!(result, Err(ScanError::RootNotADirectory(_))));
    }

    #[test]
    fn test_scan_nests_files_under_parent() {
        let (_dir, root) = fixture();
        let report = Scanner::new(&root).unwrap().scan();

        assert_eq!(report.files, 2);
        assert_eq!(report.directories, 1);
        assert_eq!(report.errors, 0);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.total_records(), 3);

        let a = &report.records[&root.join("a.txt")];
        assert_eq!(a.size, 10);
        assert_eq!(a.status, SyncStatus::Synced);
        assert!(a.is_downloaded);
        assert!(a.last_synced.is_some());

        let docs = &report.records[&root.join("docs")];
        assert!(docs.is_directory);
        assert_eq!(docs.child("b.txt").map(|b| b.size), Some(3));
        assert!(!report.records.contains_key(&root.join("docs").join("b.txt")));
    }

    #[test]
    fn test_scan_excludes_root() {
        let (_dir, root) = fixture();
        let report = Scanner::new(&root).unwrap().scan();
        assert!(!report.records.contains_key(&root));
    }

    #[test]
    fn test_scan_includes_hidden_files() {
        let (_dir, root) = fixture();
        fs::write(root.join(".hidden"), "h").unwrap();

        let report = Scanner::new(&root).unwrap().scan();
        assert!(report.records.contains_key(&root.join(".hidden")));
    }

    #[test]
    fn test_scan_with_checksums() {
        let (_dir, root) = fixture();
        let report = Scanner::new(&root).unwrap().with_checksums(true).scan();

        let docs = &report.records[&root.join("docs")];
        assert!(docs.checksum.is_none());
        assert_eq!(
            docs.child("b.txt").and_then(|b| b.checksum.as_deref()),
            Some("900150983cd24fb0d6963f7d28e17f72")
        );
        assert_eq!(report.checksum_errors, 0);
    }

    #[test]
    fn test_scan_applies_ignore_patterns() {
        let (_dir, root) = fixture();
        fs::write(root.join("partial.tmp"), "x").unwrap();
        fs::create_dir(root.join("cache")).unwrap();
        fs::write(root.join("cache").join("blob"), "x").unwrap();

        let filter = IgnoreFilter::new(&root, &["*.tmp", "cache/"]).unwrap();
        let report = Scanner::new(&root)
            .unwrap()
            .with_ignore(Arc::new(filter))
            .scan();

        assert!(!report.records.contains_key(&root.join("partial.tmp")));
        assert!(!report.records.contains_key(&root.join("cache")));
        assert!(!report.records.contains_key(&root.join("cache").join("blob")));
        assert!(report.records.contains_key(&root.join("a.txt")));
    }

    #[test]
    fn test_sorted_records() {
        let (_dir, root) = fixture();
        let report = Scanner::new(&root).unwrap().scan();
        let paths: Vec<_> = report.sorted_records().iter().map(|r| r.path.clone()).collect();
        assert_eq!(paths, vec![root.join("a.txt"), root.join("docs")]);
    }

    #[tokio::test]
    async fn test_scan_blocking() {
        let (_dir, root) = fixture();
        let report = Scanner::new(&root).unwrap().scan_blocking().await.unwrap();
        assert_eq!(report.records.len(), 2);
    }

    #[test]
    fn test_build_tree_is_order_independent() {
        let forward = vec![
            record("/w/docs", true),
            record("/w/docs/b.txt", false),
            record("/w/a.txt", false),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        for records in [forward, reversed] {
            let tree = build_tree(records);
            assert_eq!(tree.len(), 2);
            assert!(tree[Utf8Path::new("/w/docs")].is_tracked_child("b.txt"));
            assert!(tree.contains_key(Utf8Path::new("/w/a.txt")));
        }
    }

    #[test]
    fn test_build_tree_keeps_directories_top_level() {
        let tree = build_tree(vec![
            record("/w/docs", true),
            record("/w/docs/img", true),
            record("/w/docs/img/c.png", false),
        ]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[Utf8Path::new("/w/docs")].child_count(), 0);
        assert!(tree[Utf8Path::new("/w/docs/img")].is_tracked_child("c.png"));
    }

    #[test]
    fn test_build_tree_orphan_file_stays_top_level() {
        let tree = build_tree(vec![record("/w/skipped/orphan.txt", false)]);
        assert!(tree.contains_key(Utf8Path::new("/w/skipped/orphan.txt")));
    }
}
