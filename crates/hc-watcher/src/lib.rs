//! Filesystem event source with typed async event streaming.
//!
//! This crate bridges the host filesystem-notification facility (`notify`)
//! to a tokio channel of typed [`FileEvent`](hc_core::FileEvent)s for one
//! watched directory.
//!
//! # Overview
//!
//! The hc-watcher crate is designed to:
//!
//! - Register one directory (recursively by default) with the OS facility
//! - Classify raw notifications into Created, Modified, Deleted, or Renamed
//! - Drop ignored paths (gitignore-style patterns) before they reach the engine
//! - Report OS errors through [`EventSource::health`] instead of the event stream
//!
//! # Crate Dependencies
//!
//! ```text
//! hc-cli ──► hc-sync ──► hc-watcher ──► hc-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use hc_watcher::{EventSource, IgnoreFilter};
//! use hc_core::Config;
//! use camino::Utf8Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let root = Utf8Path::new("/home/me/homecloud").canonicalize_utf8()?;
//! let filter = IgnoreFilter::new(&root, &config.ignore_patterns)?;
//!
//! let mut source = EventSource::new(&root, &config.watch, filter)?;
//! let mut events = source.start()?;
//!
//! tokio::select! {
//!     Some(event) = events.recv() => println!("{}: {}", event.kind.label(), event.path),
//!     _ = tokio::signal::ctrl_c() => {}
//! }
//!
//! source.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! ```
//! use hc_watcher::WatchError;
//!
//! fn handle_watch_error(err: WatchError) {
//!     if err.is_fatal() {
//!         eprintln!("Fatal watcher error: {err}");
//!     } else {
//!         eprintln!("Warning: {err}");
//!     }
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod source;
pub mod stats;

pub use error::WatchError;

pub use events::{ClassifiedPaths, classify, classify_event};

pub use filter::{AcceptAllFilter, FileFilter, IgnoreFilter};

pub use source::EventSource;

pub use stats::{WatchHealth, WatchStats, WatchStatsSnapshot};
