//! Core types, configuration, and utilities for the homecloud sync agent.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - Domain types ([`FileRecord`], [`FileEvent`], [`SyncStatus`])
//! - Configuration structures ([`Config`] and its sections)
//! - Error types for configuration handling
//! - File checksums for change detection
//!
//! # Crate Dependencies
//!
//! ```text
//! hc-cli ──► hc-sync ──► hc-watcher ──► hc-core
//!                   └──────────────────►
//! ```
//!
//! # Wire Shapes
//!
//! [`FileRecord`] and [`FileEvent`] serialize to the JSON shapes consumed by
//! the metadata store and the server adapter. Field names are camelCase and
//! enum values are upper snake case:
//!
//! ```
//! use hc_core::SyncStatus;
//!
//! let json = serde_json::to_string(&SyncStatus::NotSynced).unwrap();
//! assert_eq!(json, r#""NOT_SYNCED""#);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod checksum;
pub mod config;
pub mod error;
pub mod types;

pub use checksum::file_checksum;
pub use config::{Config, OverflowPolicy, StatusBusConfig, SyncConfig, WatchConfig};
pub use error::ConfigError;
pub use types::{FileEvent, FileEventKind, FileRecord, RECORD_VERSION, SyncStatus};
