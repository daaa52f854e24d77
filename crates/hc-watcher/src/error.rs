//! Error types for the hc-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while creating, starting, or stopping an event source.

use camino::Utf8PathBuf;

/// Errors that can occur during event source operations.
///
/// # Error Recovery Strategy
///
/// - **Notify errors** ([`WatchError::Notify`]): Fatal - registration failed
/// - **Path not found** ([`WatchError::PathNotFound`]): Fatal - path must exist
/// - **Not a directory** ([`WatchError::NotADirectory`]): Fatal - only directories are watched
/// - **Already running** ([`WatchError::AlreadyRunning`]): Recoverable - the running source is untouched
/// - **Ignore pattern** ([`WatchError::Pattern`]): Fatal - configuration must be fixed
/// - **Non-UTF-8 path** ([`WatchError::NonUtf8Path`]): Recoverable - skip and continue
/// - **I/O errors** ([`WatchError::Io`]): Fatal - propagate immediately
///
/// # Examples
///
/// ```
/// use hc_watcher::WatchError;
///
/// let err = WatchError::AlreadyRunning;
/// assert!(err.is_recoverable());
/// assert!(err.path().is_none());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to create the notify watcher or register the directory.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The specified path does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The specified path exists but is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    /// `start()` was called on a source that is already running.
    #[error("event source is already running")]
    AlreadyRunning,

    /// An ignore pattern could not be compiled.
    #[error("invalid ignore pattern '{pattern}': {reason}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A path is not valid UTF-8.
    ///
    /// Events for such paths are logged and skipped.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// An I/O error occurred while validating the watch path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::NotADirectory`] error.
    #[inline]
    pub fn not_a_directory(path: impl Into<Utf8PathBuf>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Creates a new [`WatchError::NonUtf8Path`] error.
    #[inline]
    pub fn non_utf8_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Creates a new [`WatchError::Pattern`] error.
    #[inline]
    pub fn pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error leaves the source usable.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NonUtf8Path(_) | Self::AlreadyRunning)
    }

    /// Returns `true` if this error is fatal (watching cannot proceed).
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path) | Self::NotADirectory(path) => Some(path),
            Self::Notify(_)
            | Self::AlreadyRunning
            | Self::Pattern { .. }
            | Self::NonUtf8Path(_)
            | Self::Io(_) => None,
        }
    }
}
