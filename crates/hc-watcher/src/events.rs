//! Classification of raw `notify` events.
//!
//! The host facility reports richer kinds than the engine needs. This module
//! folds them into the four [`FileEventKind`]s.
//!
//! # Event Flow
//!
//! ```text
//! notify::Event (kind + paths)
//!        │
//!        ▼
//!   classify(kind)          Create > Write > Remove > Rename > Modified
//!        │
//!        ▼
//!   one (kind, path) per reported path
//!        │
//!        ▼
//!   UTF-8 check + filter, then FileEvent
//! ```

use std::path::PathBuf;

use hc_core::FileEventKind;
use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};
use smallvec::SmallVec;

/// Classified changes extracted from one raw event.
///
/// Almost every raw event carries one or two paths, so this stays on the
/// stack.
pub type ClassifiedPaths = SmallVec<[(FileEventKind, PathBuf); 2]>;

/// Maps a raw notify event kind to a [`FileEventKind`].
///
/// Precedence is Create, then Write, then Remove, then Rename; anything that
/// is none of those is reported as [`FileEventKind::Modified`]. Returns
/// `None` for kinds dropped at the source:
///
/// - every access notification, close-after-write included (the write
///   itself already arrives as `Modify(Data)`)
/// - `Modify(Name(Both))`, because the backend also reports the `From` and
///   `To` halves separately
///
/// # Examples
///
/// ```
/// use hc_watcher::classify;
/// use hc_core::FileEventKind;
/// use notify::EventKind;
/// use notify::event::{CreateKind, RemoveKind};
///
/// assert_eq!(classify(&EventKind::Create(CreateKind::File)), Some(FileEventKind::Created));
/// assert_eq!(classify(&EventKind::Remove(RemoveKind::Any)), Some(FileEventKind::Deleted));
/// ```
#[must_use]
pub fn classify(kind: &EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Created),
        EventKind::Modify(ModifyKind::Data(_)) => Some(FileEventKind::Modified),
        EventKind::Remove(_) => Some(FileEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) | EventKind::Access(_) => None,
        EventKind::Modify(ModifyKind::Name(_)) => Some(FileEventKind::Renamed),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(FileEventKind::Modified),
    }
}

/// Splits a raw event into one classified entry per reported path.
///
/// Returns an empty list if the kind is dropped at the source.
#[must_use]
pub fn classify_event(event: notify::Event) -> ClassifiedPaths {
    let Some(kind) = classify(&event.kind) else {
        tracing::trace!(kind = ?event.kind, "Dropping unclassified event kind");
        return SmallVec::new();
    };

    event.paths.into_iter().map(|path| (kind, path)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, AccessMode, CreateKind, DataChange, MetadataKind, RemoveKind};

    fn raw(kind: EventKind, paths: &[&str]) -> notify::Event {
        paths
            .iter()
            .fold(notify::Event::new(kind), |event, p| event.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_classify_create() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(FileEventKind::Created)
        );
        assert_eq!(
            classify(&EventKind::Create(CreateKind::Folder)),
            Some(FileEventKind::Created)
        );
    }

    #[test]
    fn test_classify_write() {
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(FileEventKind::Modified)
        );
    }

    #[test]
    fn test_classify_close_after_write_is_dropped() {
        // One write reports Modify(Data) and then Close(Write); only the first counts.
        let kinds = [
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            EventKind::Access(AccessKind::Close(AccessMode::Write)),
        ];
        let classified: Vec<_> = kinds.iter().filter_map(classify).collect();
        assert_eq!(classified, vec![FileEventKind::Modified]);
    }

    #[test]
    fn test_classify_remove() {
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File)),
            Some(FileEventKind::Deleted)
        );
    }

    #[test]
    fn test_classify_rename_halves() {
        for mode in [RenameMode::From, RenameMode::To, RenameMode::Any, RenameMode::Other] {
            assert_eq!(
                classify(&EventKind::Modify(ModifyKind::Name(mode))),
                Some(FileEventKind::Renamed)
            );
        }
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            None
        );
    }

    #[test]
    fn test_classify_reads_are_dropped() {
        assert_eq!(classify(&EventKind::Access(AccessKind::Read)), None);
        assert_eq!(
            classify(&EventKind::Access(AccessKind::Open(AccessMode::Read))),
            None
        );
        assert_eq!(
            classify(&EventKind::Access(AccessKind::Close(AccessMode::Read))),
            None
        );
    }

    #[test]
    fn test_classify_fallback_is_modified() {
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            Some(FileEventKind::Modified)
        );
        assert_eq!(classify(&EventKind::Any), Some(FileEventKind::Modified));
        assert_eq!(classify(&EventKind::Other), Some(FileEventKind::Modified));
    }

    #[test]
    fn test_classify_event_one_entry_per_path() {
        let event = raw(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/watch/old.txt"],
        );
        let classified = classify_event(event);
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].0, FileEventKind::Renamed);
        assert_eq!(classified[0].1, PathBuf::from("/watch/old.txt"));

        let event = raw(EventKind::Remove(RemoveKind::Any), &["/watch/a", "/watch/b"]);
        let classified = classify_event(event);
        assert_eq!(classified.len(), 2);
        assert!(classified.iter().all(|(k, _)| *k == FileEventKind::Deleted));
        assert!(!classified.spilled());
    }

    #[test]
    fn test_classify_event_dropped_kind_is_empty() {
        let event = raw(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/watch/old.txt", "/watch/new.txt"],
        );
        assert!(classify_event(event).is_empty());
    }
}
