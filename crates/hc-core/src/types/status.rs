//! Synchronization status types.
//!
//! This module provides the [`SyncStatus`] enum for tracking where a file is
//! in its local synchronization lifecycle.

use serde::{Deserialize, Serialize};

/// The synchronization status of a tracked file.
///
/// A path moves through `NotSynced → Syncing → Synced`. `Error` is assigned
/// when an upload keeps failing after every retry.
///
/// # Examples
///
/// ```
/// use hc_core::SyncStatus;
///
/// let status = SyncStatus::Syncing;
/// assert!(!status.is_terminal());
/// assert_eq!(status.to_string(), "Syncing");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// The file changed locally and has not been uploaded yet.
    ///
    /// Also carried by the removal sentinel published after a delete.
    #[default]
    NotSynced,

    /// An upload is in flight.
    Syncing,

    /// The local content is in sync.
    Synced,

    /// The upload failed after all retries.
    Error,
}

impl SyncStatus {
    /// Returns `true` if no further transition is expected without a new event.
    ///
    /// # Examples
    ///
    /// ```
    /// use hc_core::SyncStatus;
    ///
    /// assert!(SyncStatus::Synced.is_terminal());
    /// assert!(SyncStatus::Error.is_terminal());
    /// assert!(!SyncStatus::NotSynced.is_terminal());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Synced | Self::Error)
    }

    /// Returns a human-readable label for this status.
    ///
    /// # Examples
    ///
    /// ```
    /// use hc_core::SyncStatus;
    ///
    /// assert_eq!(SyncStatus::NotSynced.label(), "Not synced");
    /// assert_eq!(SyncStatus::Synced.label(), "Synced");
    /// ```
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotSynced => "Not synced",
            Self::Syncing => "Syncing",
            Self::Synced => "Synced",
            Self::Error => "Error",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
