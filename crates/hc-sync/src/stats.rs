//! Engine statistics with atomic counters.
//!
//! Counters use relaxed ordering; they are informational and are read with
//! [`EngineStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::bus::BusStats;

/// Atomic counters for one engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    events: AtomicU64,
    changes: AtomicU64,
    deletes: AtomicU64,
    untracked_deletes: AtomicU64,
    renames: AtomicU64,
    uploads: AtomicU64,
    upload_failures: AtomicU64,
    scans: AtomicU64,
    scan_errors: AtomicU64,
}

macro_rules! increment {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            #[doc = concat!("Increments the `", stringify!($field), "` counter.")]
            #[inline]
            pub fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl EngineStats {
    /// Creates a new [`EngineStats`] with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    increment! {
        increment_events => events,
        increment_changes => changes,
        increment_deletes => deletes,
        increment_untracked_deletes => untracked_deletes,
        increment_renames => renames,
        increment_uploads => uploads,
        increment_upload_failures => upload_failures,
        increment_scans => scans,
    }

    /// Adds the skipped-entry count of a completed scan.
    #[inline]
    pub fn add_scan_errors(&self, errors: usize) {
        self.scan_errors
            .fetch_add(u64::try_from(errors).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot, including the bus counters.
    ///
    /// # Examples
    ///
    /// ```
    /// use hc_sync::{BusStats, EngineStats};
    ///
    /// let stats = EngineStats::new();
    /// stats.increment_events();
    /// stats.increment_changes();
    ///
    /// let snap = stats.snapshot(BusStats::default());
    /// assert_eq!(snap.events, 1);
    /// assert_eq!(snap.changes, 1);
    /// ```
    #[must_use]
    pub fn snapshot(&self, bus: BusStats) -> SyncStats {
        SyncStats {
            events: self.events.load(Ordering::Relaxed),
            changes: self.changes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            untracked_deletes: self.untracked_deletes.load(Ordering::Relaxed),
            renames: self.renames.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            upload_failures: self.upload_failures.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
            scan_errors: self.scan_errors.load(Ordering::Relaxed),
            bus,
        }
    }
}

/// Point-in-time engine statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    /// Events consumed from the event source.
    pub events: u64,
    /// Events handled as changes.
    pub changes: u64,
    /// Events handled as deletes of tracked paths.
    pub deletes: u64,
    /// Deletes of paths that were never tracked.
    pub untracked_deletes: u64,
    /// Rename events received.
    pub renames: u64,
    /// Uploads that reached SYNCED.
    pub uploads: u64,
    /// Uploads that ended in ERROR.
    pub upload_failures: u64,
    /// Initial scans run.
    pub scans: u64,
    /// Entries skipped across all scans.
    pub scan_errors: u64,
    /// Status bus counters.
    pub bus: BusStats,
}
