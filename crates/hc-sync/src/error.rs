//! Error types for the hc-sync crate.
//!
//! - [`ScanError`] - initial directory scan failures
//! - [`UploadError`] - failures reported by an [`Uploader`](crate::Uploader)
//! - [`SyncError`] - engine lifecycle failures, wrapping the others

use camino::Utf8PathBuf;
use hc_core::ConfigError;
use hc_watcher::WatchError;

/// Errors that can occur during the initial scan.
///
/// # Error Recovery Strategy
///
/// - **Root errors** ([`ScanError::RootNotFound`], [`ScanError::RootNotADirectory`]): Fatal
/// - **Walk errors** ([`ScanError::Walk`]): Log warning, skip entry, continue scan
/// - **Metadata errors** ([`ScanError::Metadata`]): Log warning, skip entry, continue scan
/// - **Non-UTF-8 paths** ([`ScanError::NonUtf8Path`]): Log warning, skip entry, continue scan
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The scan root does not exist.
    #[error("scan root does not exist: {0}")]
    RootNotFound(Utf8PathBuf),

    /// The scan root is not a directory.
    #[error("scan root is not a directory: {0}")]
    RootNotADirectory(Utf8PathBuf),

    /// The walker failed to read a directory entry.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] ignore::Error),

    /// Failed to read an entry's metadata.
    #[error("failed to read metadata for {path}: {source}")]
    Metadata {
        /// The entry whose metadata couldn't be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// The blocking scan task panicked or was cancelled.
    #[error("scan task failed: {0}")]
    Task(String),
}

impl ScanError {
    /// Creates a new [`ScanError::Metadata`] error.
    #[inline]
    pub fn metadata(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Metadata {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the scan can continue past this error.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Walk(_) | Self::Metadata { .. } | Self::NonUtf8Path(_)
        )
    }

    /// Returns `true` if this error aborts the scan.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::RootNotFound(path)
            | Self::RootNotADirectory(path)
            | Self::Metadata { path, .. } => Some(path),
            Self::Walk(_) | Self::NonUtf8Path(_) | Self::Task(_) => None,
        }
    }
}

/// Errors reported by an uploader.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The transfer failed and may succeed if retried.
    #[error("upload of {path} failed: {reason}")]
    Transient {
        /// The file being uploaded.
        path: Utf8PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The transfer can never succeed.
    #[error("upload of {path} rejected: {reason}")]
    Rejected {
        /// The file being uploaded.
        path: Utf8PathBuf,
        /// Why the upload was rejected.
        reason: String,
    },
}

impl UploadError {
    /// Creates a new [`UploadError::Transient`] error.
    #[inline]
    pub fn transient(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::Transient {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`UploadError::Rejected`] error.
    #[inline]
    pub fn rejected(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the upload may be retried.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns `true` if retrying is pointless.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the file path associated with this error.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Transient { path, .. } | Self::Rejected { path, .. } => Some(path),
        }
    }
}

/// Errors returned by [`SyncEngine`](crate::SyncEngine) operations.
///
/// # Examples
///
/// ```
/// use hc_sync::SyncError;
///
/// let err = SyncError::AlreadyRunning;
/// assert!(err.is_recoverable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// `start()` was called while the engine was not stopped.
    #[error("sync engine is already running")]
    AlreadyRunning,

    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The initial scan failed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The event source could not be created or started.
    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl SyncError {
    /// Returns `true` if the engine is left in a usable state.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::AlreadyRunning)
    }

    /// Returns `true` if the engine could not start.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::AlreadyRunning | Self::Config(_) => None,
            Self::Scan(e) => e.path(),
            Self::Watch(e) => e.path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_scan_error_root_not_found() {
        let err = ScanError::RootNotFound(Utf8PathBuf::from("/watch"));
        assert!(err.is_fatal());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/watch"));
        assert_eq!(err.to_string(), "scan root does not exist: /watch");
    }

    #[test]
    fn test_scan_error_metadata_is_recoverable() {
        let err = ScanError::metadata(
            "/watch/locked",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_recoverable());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/watch/locked"));
    }

    #[test]
    fn test_upload_error_kinds() {
        let transient = UploadError::transient("/watch/a.txt", "connection reset");
        assert!(transient.is_recoverable());
        assert!(transient.to_string().contains("connection reset"));

        let rejected = UploadError::rejected("/watch/a.txt", "quota exceeded");
        assert!(rejected.is_fatal());
        assert_eq!(rejected.path().map(|p| p.as_str()), Some("/watch/a.txt"));
    }

    #[test]
    fn test_sync_error_wraps_watch_error() {
        let err = SyncError::from(WatchError::path_not_found("/watch"));
        assert!(err.is_fatal());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/watch"));
        assert_eq!(err.to_string(), "path does not exist: /watch");
    }

    #[test]
    fn test_sync_error_already_running() {
        let err = SyncError::AlreadyRunning;
        assert!(err.is_recoverable());
        assert!(err.path().is_none());
    }
}
