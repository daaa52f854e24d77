//! Tracked file records.
//!
//! A [`FileRecord`] is the in-memory synchronization state of one filesystem
//! entry. Records are plain owned values: cloning one copies its children
//! too, so a snapshot handed to a subscriber never shares state with the
//! engine's live map.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::SyncStatus;

/// The record format version written by this crate.
pub const RECORD_VERSION: u64 = 1;

/// Seconds from the Unix epoch to `0001-01-01T00:00:00Z`.
const ZERO_TIME_SECS: i64 = -62_135_596_800;

/// The timestamp written for an unset time: `0001-01-01T00:00:00Z`.
fn zero_time() -> DateTime<Utc> {
    DateTime::from_timestamp(ZERO_TIME_SECS, 0).unwrap_or_default()
}

// Writes an absent timestamp as the zero time and reads the zero time back as `None`.
mod unset_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::zero_time;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.unwrap_or_else(zero_time).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Option::<DateTime<Utc>>::deserialize(deserializer)?;
        Ok(value.filter(|time| *time != zero_time()))
    }
}

/// Synchronization state of a tracked file or directory.
///
/// # Children
///
/// Directory records produced by the initial scan carry their direct file
/// children in [`children`](Self::children), keyed by file name. Nested
/// directories are tracked as their own top-level records.
///
/// # Examples
///
/// ```
/// use hc_core::{FileRecord, SyncStatus};
/// use camino::Utf8PathBuf;
/// use chrono::Utc;
///
/// let record = FileRecord::changed(Utf8PathBuf::from("/watch/a.txt"), Utc::now());
/// assert_eq!(record.status, SyncStatus::NotSynced);
/// assert!(record.is_downloaded);
/// assert_eq!(record.size, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Absolute path of the entry. Unique key of the record.
    pub path: Utf8PathBuf,

    /// Current synchronization status.
    pub status: SyncStatus,

    /// Last modification time (filesystem mtime or event time).
    pub last_modified: DateTime<Utc>,

    /// Size in bytes. Zero for records built from events.
    pub size: u64,

    /// Whether the content is present locally.
    pub is_downloaded: bool,

    /// Whether the entry is a directory.
    pub is_directory: bool,

    /// Record format version.
    pub version: u64,

    /// Hex-encoded MD5 of the content, when computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// When the entry was last confirmed in sync. Always serialized; `None`
    /// is written as `0001-01-01T00:00:00Z`.
    #[serde(default, with = "unset_time")]
    pub last_synced: Option<DateTime<Utc>>,

    /// Direct file children of a directory, keyed by file name.
    #[serde(
        rename = "filesContent",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub children: BTreeMap<String, FileRecord>,
}

impl FileRecord {
    /// Builds a record for an entry found by the initial scan.
    ///
    /// Scanned entries are considered in sync as of `synced_at`.
    #[must_use]
    pub fn scanned(
        path: Utf8PathBuf,
        is_directory: bool,
        size: u64,
        last_modified: DateTime<Utc>,
        synced_at: DateTime<Utc>,
    ) -> Self {
        Self {
            path,
            status: SyncStatus::Synced,
            last_modified,
            size,
            is_downloaded: true,
            is_directory,
            version: RECORD_VERSION,
            checksum: None,
            last_synced: Some(synced_at),
            children: BTreeMap::new(),
        }
    }

    /// Builds the record that replaces a path's state after a change event.
    ///
    /// Any previous size, checksum, or children are intentionally absent: the
    /// record is replaced wholesale, not merged.
    #[must_use]
    pub fn changed(path: Utf8PathBuf, timestamp: DateTime<Utc>) -> Self {
        Self {
            path,
            status: SyncStatus::NotSynced,
            last_modified: timestamp,
            size: 0,
            is_downloaded: true,
            is_directory: false,
            version: RECORD_VERSION,
            checksum: None,
            last_synced: None,
            children: BTreeMap::new(),
        }
    }

    /// Builds the terminal sentinel published when a path stops being tracked.
    ///
    /// Carries only the path and [`SyncStatus::NotSynced`]; both timestamps
    /// are unset.
    #[must_use]
    pub fn removed(path: Utf8PathBuf) -> Self {
        Self {
            path,
            status: SyncStatus::NotSynced,
            last_modified: zero_time(),
            size: 0,
            is_downloaded: false,
            is_directory: false,
            version: 0,
            checksum: None,
            last_synced: None,
            children: BTreeMap::new(),
        }
    }

    /// Returns `true` for the sentinel built by [`removed`](Self::removed).
    #[inline]
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.version == 0
    }

    /// Returns the final path component.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }

    /// Returns the parent directory path.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Utf8Path> {
        self.path.parent()
    }

    /// Sets the checksum, returning the updated record.
    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Nests `child` under this record, keyed by its file name.
    ///
    /// Returns the previous child with the same name, if any. A child with no
    /// file name is rejected and handed back.
    pub fn insert_child(&mut self, child: Self) -> Option<Self> {
        match child.file_name().map(str::to_owned) {
            Some(name) => self.children.insert(name, child),
            None => Some(child),
        }
    }

    /// Returns the nested child with the given file name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.get(name)
    }

    /// Returns `true` if a child with the given file name is nested here.
    #[inline]
    #[must_use]
    pub fn is_tracked_child(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// Removes and returns the nested child with the given file name.
    pub fn remove_child(&mut self, name: &str) -> Option<Self> {
        self.children.remove(name)
    }

    /// Returns the number of nested children.
    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
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
    fn test_changed_record_defaults() {
        let record = FileRecord::changed(Utf8PathBuf::from("/watch/a.txt"), fixed_time());
        assert_eq!(record.status, SyncStatus::NotSynced);
        assert_eq!(record.last_modified, fixed_time());
        assert_eq!(record.version, RECORD_VERSION);
        assert!(record.is_downloaded);
        assert!(!record.is_directory);
        assert!(record.checksum.is_none());
        assert!(record.children.is_empty());
    }

    #[test]
    fn test_scanned_record_is_synced() {
        let record = FileRecord::scanned(
            Utf8PathBuf::from("/watch/a.txt"),
            false,
            10,
            fixed_time(),
            fixed_time(),
        );
        assert_eq!(record.status, SyncStatus::Synced);
        assert_eq!(record.size, 10);
        assert_eq!(record.last_synced, Some(fixed_time()));
    }

    #[test]
    fn test_insert_and_remove_child() {
        let mut dir = FileRecord::scanned(
            Utf8PathBuf::from("/watch/docs"),
            true,
            0,
            fixed_time(),
            fixed_time(),
        );
        let child = FileRecord::scanned(
            Utf8PathBuf::from("/watch/docs/b.txt"),
            false,
            3,
            fixed_time(),
            fixed_time(),
        );

        assert!(dir.insert_child(child).is_none());
        assert_eq!(dir.child_count(), 1);
        assert_eq!(dir.child("b.txt").map(|c| c.size), Some(3));
        assert!(dir.is_tracked_child("b.txt"));
        assert!(!dir.is_tracked_child("c.txt"));

        let removed = dir.remove_child("b.txt");
        assert!(removed.is_some());
        assert_eq!(dir.child_count(), 0);
    }

    #[test]
    fn test_clone_is_isolated() {
        let mut dir = FileRecord::scanned(
            Utf8PathBuf::from("/watch/docs"),
            true,
            0,
            fixed_time(),
            fixed_time(),
        );
        dir.insert_child(FileRecord::changed(
            Utf8PathBuf::from("/watch/docs/b.txt"),
            fixed_time(),
        ));

        let snapshot = dir.clone();
        dir.remove_child("b.txt");

        assert_eq!(snapshot.child_count(), 1);
        assert_eq!(dir.child_count(), 0);
    }

    #[test]
    fn test_removed_sentinel() {
        let record = FileRecord::removed(Utf8PathBuf::from("/watch/gone.txt"));
        assert_eq!(record.status, SyncStatus::NotSynced);
        assert_eq!(record.path.as_str(), "/watch/gone.txt");
        assert!(!record.is_downloaded);
        assert!(record.is_removed());
        assert!(!FileRecord::changed(record.path.clone(), fixed_time()).is_removed());
    }

    #[test]
    fn test_record_shape() {
        let mut dir = FileRecord::scanned(
            Utf8PathBuf::from("/watch/docs"),
            true,
            0,
            fixed_time(),
            fixed_time(),
        );
        dir.insert_child(
            FileRecord::scanned(
                Utf8PathBuf::from("/watch/docs/b.txt"),
                false,
                3,
                fixed_time(),
                fixed_time(),
            )
            .with_checksum("900150983cd24fb0d6963f7d28e17f72"),
        );

        insta::assert_json_snapshot!(dir, @r#"
        {
          "path": "/watch/docs",
          "status": "SYNCED",
          "lastModified": "2024-01-01T00:00:00Z",
          "size": 0,
          "isDownloaded": true,
          "isDirectory": true,
          "version": 1,
          "lastSynced": "2024-01-01T00:00:00Z",
          "filesContent": {
            "b.txt": {
              "path": "/watch/docs/b.txt",
              "status": "SYNCED",
              "lastModified": "2024-01-01T00:00:00Z",
              "size": 3,
              "isDownloaded": true,
              "isDirectory": false,
              "version": 1,
              "checksum": "900150983cd24fb0d6963f7d28e17f72",
              "lastSynced": "2024-01-01T00:00:00Z"
            }
          }
        }
        "#);
    }

    #[test]
    fn test_changed_record_shape() {
        let record = FileRecord::changed(Utf8PathBuf::from("/watch/a.txt"), fixed_time());

        insta::assert_json_snapshot!(record, @r#"
        {
          "path": "/watch/a.txt",
          "status": "NOT_SYNCED",
          "lastModified": "2024-01-01T00:00:00Z",
          "size": 0,
          "isDownloaded": true,
          "isDirectory": false,
          "version": 1,
          "lastSynced": "0001-01-01T00:00:00Z"
        }
        "#);
    }

    #[test]
    fn test_removed_record_shape() {
        let record = FileRecord::removed(Utf8PathBuf::from("/watch/a.txt"));

        insta::assert_json_snapshot!(record, @r#"
        {
          "path": "/watch/a.txt",
          "status": "NOT_SYNCED",
          "lastModified": "0001-01-01T00:00:00Z",
          "size": 0,
          "isDownloaded": false,
          "isDirectory": false,
          "version": 0,
          "lastSynced": "0001-01-01T00:00:00Z"
        }
        "#);
    }

    #[test]
    fn test_zero_time_reads_back_as_unset() {
        assert_eq!(zero_time().to_rfc3339(), "0001-01-01T00:00:00+00:00");

        let json = r#"{"path":"/watch/a.txt","status":"SYNCED","lastModified":"2024-01-01T00:00:00Z","size":1,"isDownloaded":true,"isDirectory":false,"version":1,"lastSynced":"0001-01-01T00:00:00Z"}"#;
        let parsed: FileRecord = serde_json::from_str(json).unwrap();
        assert!(parsed.last_synced.is_none());

        let removed = FileRecord::removed(Utf8PathBuf::from("/watch/a.txt"));
        let parsed: FileRecord =
            serde_json::from_str(&serde_json::to_string(&removed).unwrap()).unwrap();
        assert_eq!(parsed, removed);
    }

    #[test]
    fn test_record_round_trip_through_json() {
        let record = FileRecord::changed(Utf8PathBuf::from("/watch/a.txt"), fixed_time());
        let json = serde_json::to_string(&record).unwrap();
        let parsed: FileRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
    }
}
