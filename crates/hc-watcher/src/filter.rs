//! Path filtering for watch events.
//!
//! Events are filtered in the translation task before they reach the engine.
//! The default filter for the agent is an [`IgnoreFilter`] built from the
//! configured ignore patterns (gitignore syntax).
//!
//! # Examples
//!
//! ```
//! use hc_watcher::{FileFilter, IgnoreFilter};
//! use camino::Utf8Path;
//!
//! let filter = IgnoreFilter::new(Utf8Path::new("/watch"), &["*.tmp", ".DS_Store"]).unwrap();
//!
//! assert!(filter.should_process(Utf8Path::new("/watch/notes.txt")));
//! assert!(!filter.should_process(Utf8Path::new("/watch/build.tmp")));
//! assert!(!filter.should_process(Utf8Path::new("/watch/photos/.DS_Store")));
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::WatchError;

/// A predicate deciding which paths are tracked.
///
/// Filters must be [`Send`] and [`Sync`] because they are called from the
/// translation task and shared with the initial scan.
///
/// # Examples
///
/// ```
/// use hc_watcher::FileFilter;
/// use camino::Utf8Path;
///
/// struct NoHidden;
///
/// impl FileFilter for NoHidden {
///     fn should_process(&self, path: &Utf8Path) -> bool {
///         !path.file_name().is_some_and(|n| n.starts_with('.'))
///     }
/// }
///
/// assert!(!NoHidden.should_process(Utf8Path::new("/watch/.env")));
/// ```
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if events for `path` should be delivered.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// A filter that accepts every path.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl FileFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _path: &Utf8Path) -> bool {
        true
    }
}

/// Rejects paths matching gitignore-style patterns.
///
/// A path is also rejected when any of its ancestors below the root matches,
/// so ignoring `cache/` hides everything inside it.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    root: Utf8PathBuf,
    matcher: Gitignore,
}

impl IgnoreFilter {
    /// Compiles `patterns` relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Pattern`] if a pattern is malformed.
    pub fn new<S: AsRef<str>>(root: &Utf8Path, patterns: &[S]) -> Result<Self, WatchError> {
        let mut builder = GitignoreBuilder::new(root.as_std_path());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            builder
                .add_line(None, pattern)
                .map_err(|e| WatchError::pattern(pattern, e.to_string()))?;
        }
        let matcher = builder
            .build()
            .map_err(|e| WatchError::pattern("<set>", e.to_string()))?;

        Ok(Self {
            root: root.to_owned(),
            matcher,
        })
    }

    /// Returns the number of compiled patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from(self.matcher.num_ignores()).unwrap_or(usize::MAX)
    }

    /// Returns `true` if no patterns were compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `path` is ignored.
    ///
    /// `is_dir` must describe the entry; directory-only patterns such as
    /// `cache/` only match directories.
    #[must_use]
    pub fn is_ignored(&self, path: &Utf8Path, is_dir: bool) -> bool {
        if path.starts_with(&self.root) && path != self.root {
            self.matcher
                .matched_path_or_any_parents(path.as_std_path(), is_dir)
                .is_ignore()
        } else {
            self.matcher.matched(path.as_std_path(), is_dir).is_ignore()
        }
    }
}

impl FileFilter for IgnoreFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        // Deleted entries cannot be stat'ed; they are treated as files.
        let ignored = self.is_ignored(path, path.is_dir());
        if ignored {
            tracing::trace!(path = %path, "Path matches an ignore pattern");
        }
        !ignored
    }
}

impl<F: FileFilter + ?Sized> FileFilter for std::sync::Arc<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}
