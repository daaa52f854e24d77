//! Filesystem change events.
//!
//! A [`FileEvent`] is produced by the event source for every classified OS
//! notification and consumed exactly once by the sync engine.
//!
//! # Event Flow
//!
//! ```text
//! OS notification
//!        │
//!        ▼
//!   classification (Create > Write > Remove > Rename)
//!        │
//!        ▼
//!   FileEvent sent to the engine
//! ```

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of change a [`FileEvent`] reports.
///
/// # Examples
///
/// ```
/// use hc_core::FileEventKind;
///
/// assert!(FileEventKind::Created.is_change());
/// assert!(FileEventKind::Modified.is_change());
/// assert!(!FileEventKind::Deleted.is_change());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileEventKind {
    /// A file or directory appeared.
    Created,
    /// Content or metadata changed. Also the fallback for unclassified events.
    Modified,
    /// A file or directory was removed.
    Deleted,
    /// One side of a rename: either the old or the new name.
    Renamed,
}

impl FileEventKind {
    /// Returns `true` for kinds routed to change handling.
    #[inline]
    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(self, Self::Created | Self::Modified)
    }

    /// Returns the wire label for this kind.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Renamed => "RENAMED",
        }
    }
}

/// A classified filesystem change for one path.
///
/// The path is absolute and UTF-8. The timestamp is wall-clock UTC at the
/// moment the notification was translated, so it can be stored as a record's
/// last-modified time.
///
/// # Examples
///
/// ```
/// use hc_core::{FileEvent, FileEventKind};
/// use camino::Utf8PathBuf;
///
/// let event = FileEvent::new(FileEventKind::Created, Utf8PathBuf::from("/watch/a.txt"));
/// assert_eq!(event.file_name(), Some("a.txt"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: FileEventKind,

    /// Absolute path the event refers to.
    pub path: Utf8PathBuf,

    /// When the event was received.
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    /// Creates an event stamped with the current time.
    #[inline]
    #[must_use]
    pub fn new(kind: FileEventKind, path: Utf8PathBuf) -> Self {
        Self {
            kind,
            path,
            timestamp: Utc::now(),
        }
    }

    /// Creates an event with a specific timestamp.
    ///
    /// Useful for testing or when replaying events.
    #[inline]
    #[must_use]
    pub const fn with_timestamp(
        kind: FileEventKind,
        path: Utf8PathBuf,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            path,
            timestamp,
        }
    }

    /// Returns the file name without the directory path.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_event_kind_routing() {
        assert!(FileEventKind::Created.is_change());
        assert!(FileEventKind::Modified.is_change());
        assert!(!FileEventKind::Deleted.is_change());
        assert!(!FileEventKind::Renamed.is_change());
    }

    #[test]
    fn test_event_kind_labels_match_wire() {
        for kind in [
            FileEventKind::Created,
            FileEventKind::Modified,
            FileEventKind::Deleted,
            FileEventKind::Renamed,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.label()));
        }
    }

    #[test]
    fn test_file_event_shape() {
        let event = FileEvent::with_timestamp(
            FileEventKind::Created,
            Utf8PathBuf::from("/watch/new.txt"),
            fixed_time(),
        );

        insta::assert_json_snapshot!(event, @r#"
        {
          "type": "CREATED",
          "path": "/watch/new.txt",
          "timestamp": "2024-01-01T00:00:00Z"
        }
        "#);
    }

    #[test]
    fn test_file_event_deserialize() {
        let json = r#"{"type":"DELETED","path":"/watch/x","timestamp":"2024-01-01T00:00:00Z"}"#;
        let event: FileEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, FileEventKind::Deleted);
        assert_eq!(event.path, Utf8PathBuf::from("/watch/x"));
        assert_eq!(event.timestamp, fixed_time());
    }
}
