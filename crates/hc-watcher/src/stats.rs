//! Event source counters and health.
//!
//! [`WatchStats`] is shared between the notify callback thread and the
//! translation task. Counters use relaxed atomics; they are informational.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters for one event source.
#[derive(Debug, Default)]
pub struct WatchStats {
    /// Raw notifications received from the OS facility.
    raw: AtomicU64,
    /// Typed events delivered to the consumer.
    delivered: AtomicU64,
    /// Events dropped by classification or the path filter.
    filtered: AtomicU64,
    /// OS-level errors reported by the facility.
    errors: AtomicU64,
}

impl WatchStats {
    /// Creates a new [`WatchStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the raw notification counter.
    #[inline]
    pub fn increment_raw(&self) {
        self.raw.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the delivered event counter.
    #[inline]
    pub fn increment_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the filtered event counter.
    #[inline]
    pub fn increment_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the OS error counter.
    #[inline]
    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of all counters.
    ///
    /// # Examples
    ///
    /// ```
    /// use hc_watcher::WatchStats;
    ///
    /// let stats = WatchStats::new();
    /// stats.increment_raw();
    /// stats.increment_delivered();
    ///
    /// let snap = stats.snapshot();
    /// assert_eq!(snap.raw, 1);
    /// assert_eq!(snap.delivered, 1);
    /// ```
    #[must_use]
    pub fn snapshot(&self) -> WatchStatsSnapshot {
        WatchStatsSnapshot {
            raw: self.raw.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Returns the health implied by the current error count.
    #[must_use]
    pub fn health(&self) -> WatchHealth {
        match self.errors.load(Ordering::Relaxed) {
            0 => WatchHealth::Healthy,
            errors => WatchHealth::Degraded { errors },
        }
    }
}

/// Point-in-time view of [`WatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchStatsSnapshot {
    /// Raw notifications received.
    pub raw: u64,
    /// Typed events delivered.
    pub delivered: u64,
    /// Events dropped before delivery.
    pub filtered: u64,
    /// OS-level errors.
    pub errors: u64,
}

/// Health of an event source.
///
/// OS errors never reach the engine as events; they surface here instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum WatchHealth {
    /// No OS errors have been reported.
    #[default]
    Healthy,
    /// The facility reported errors; some changes may have been missed.
    Degraded {
        /// Number of errors reported so far.
        errors: u64,
    },
}

impl WatchHealth {
    /// Returns `true` if no errors have been reported.
    #[inline]
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl std::fmt::Display for WatchHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => f.write_str("healthy"),
            Self::Degraded { errors } => write!(f, "degraded ({errors} errors)"),
        }
    }
}
