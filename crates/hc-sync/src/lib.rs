//! Local sync engine: initial scan, record state, and status notifications.
//!
//! This crate owns the authoritative path → [`FileRecord`](hc_core::FileRecord)
//! map for one watched directory and drives every changed file through its
//! sync lifecycle.
//!
//! # Overview
//!
//! - [`Scanner`] walks the directory once at start and nests files under
//!   their parent directories.
//! - [`SyncEngine`] consumes events from an
//!   [`EventSource`](hc_watcher::EventSource), mutates the [`RecordStore`],
//!   and runs one cancelable transition task per path.
//! - [`StatusBus`] carries record snapshots to a single subscriber with an
//!   explicit [`OverflowPolicy`](hc_core::OverflowPolicy).
//! - [`Uploader`] is the seam for the transfer itself; [`SimulatedUploader`]
//!   only waits.
//!
//! # Per-path State Machine
//!
//! ```text
//! (none) ──► NOT_SYNCED ──► SYNCING ──► SYNCED
//!                              │
//!                              └──────► ERROR   (retries exhausted)
//!
//! (any) ──► (removed)                  on delete
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! hc-cli ──► hc-sync ──► hc-watcher ──► hc-core
//! ```
//!
//! # Error Handling
//!
//! ```
//! use hc_sync::SyncError;
//!
//! fn report(err: &SyncError) {
//!     match err.path() {
//!         Some(path) => eprintln!("{err} ({path})"),
//!         None => eprintln!("{err}"),
//!     }
//! }
//! # report(&SyncError::AlreadyRunning);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod backoff;
pub mod bus;
pub mod engine;
pub mod error;
pub mod registry;
pub mod scan;
pub mod stats;
pub mod store;
pub mod upload;

pub use backoff::Backoff;

pub use bus::{BusStats, PublishOutcome, StatusBus, StatusReceiver};

pub use engine::{SyncEngine, scan_once};

pub use error::{ScanError, SyncError, UploadError};

pub use registry::TransitionRegistry;

pub use scan::{RecordMap, ScanReport, Scanner, build_tree};

pub use stats::{EngineStats, SyncStats};

pub use store::{Generation, Lifecycle, RecordStore, StatusCounts};

pub use upload::{SimulatedUploader, UploadOutcome, Uploader, upload_with_retry};
