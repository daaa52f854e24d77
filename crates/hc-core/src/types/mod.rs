//! Domain types for the homecloud sync agent.
//!
//! # Module Organization
//!
//! - [`record`] - Tracked file records and their children
//! - [`event`] - Filesystem change events
//! - [`status`] - Per-file synchronization status
//!
//! All public types are re-exported at this module level and at the crate
//! root:
//!
//! ```
//! use hc_core::{FileEvent, FileRecord, SyncStatus};
//! ```

mod event;
mod record;
mod status;

pub use event::{FileEvent, FileEventKind};
pub use record::{FileRecord, RECORD_VERSION};
pub use status::SyncStatus;
