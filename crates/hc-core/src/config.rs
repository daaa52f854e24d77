//! Configuration structures for the homecloud sync agent.
//!
//! This module provides configuration types for all components:
//!
//! - [`WatchConfig`] - Event source settings (recursive registration)
//! - [`SyncConfig`] - Engine settings (upload latency, retries, scan options)
//! - [`StatusBusConfig`] - Status channel capacity and overflow policy
//! - [`Config`] - Root configuration combining all settings
//!
//! The configuration file is JSON with camelCase keys. Missing keys take
//! their defaults, so a partial file is valid:
//!
//! ```
//! use hc_core::Config;
//!
//! let config: Config = serde_json::from_str(r#"{"sync": {"maxRetries": 5}}"#).unwrap();
//! assert_eq!(config.sync.max_retries, 5);
//! assert_eq!(config.status_bus.capacity, 100);
//! ```

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the per-user application data directory.
const APP_DIR_NAME: &str = ".homecloud";

/// Name of the default watch directory under the home directory.
const WATCH_DIR_NAME: &str = "homecloud";

/// Configuration file name inside the application data directory.
const CONFIG_FILE_NAME: &str = "config.json";

/// What the status bus does when a publish finds it full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// The publisher waits until the subscriber makes room.
    ///
    /// Every snapshot is delivered in order; a stalled subscriber stalls
    /// publishers.
    #[default]
    Block,

    /// The oldest queued snapshot is discarded to make room.
    ///
    /// Publishers never wait; the subscriber is told how many it missed.
    DropOldest,
}

/// Configuration for the event source.
///
/// # Examples
///
/// ```
/// use hc_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert!(config.recursive);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatchConfig {
    /// Whether subdirectories are registered with the OS facility.
    pub recursive: bool,

    /// Whether symbolic links are followed when walking the tree.
    pub follow_links: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_links: false,
        }
    }
}

/// Configuration for the sync engine.
///
/// # Examples
///
/// ```
/// use hc_core::SyncConfig;
/// use std::time::Duration;
///
/// let config = SyncConfig::default();
/// assert_eq!(config.upload_latency(), Duration::from_secs(2));
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Simulated upload duration in milliseconds.
    pub upload_latency_ms: u64,

    /// How many times a failed upload is retried before the path is marked
    /// as errored.
    pub max_retries: u32,

    /// First retry delay in milliseconds. Doubles on each attempt.
    pub backoff_base_ms: u64,

    /// Upper bound for a single retry delay in milliseconds.
    pub backoff_max_ms: u64,

    /// Whether the initial scan computes content checksums.
    pub compute_checksums: bool,
}

impl SyncConfig {
    /// Returns the simulated upload duration.
    #[inline]
    #[must_use]
    pub const fn upload_latency(&self) -> Duration {
        Duration::from_millis(self.upload_latency_ms)
    }

    /// Returns the first retry delay.
    #[inline]
    #[must_use]
    pub const fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Returns the retry delay cap.
    #[inline]
    #[must_use]
    pub const fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            upload_latency_ms: 2_000,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            compute_checksums: false,
        }
    }
}

/// Configuration for the status bus.
///
/// # Examples
///
/// ```
/// use hc_core::{OverflowPolicy, StatusBusConfig};
///
/// let config = StatusBusConfig::default();
/// assert_eq!(config.capacity, 100);
/// assert_eq!(config.overflow, OverflowPolicy::Block);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusBusConfig {
    /// Maximum number of queued snapshots.
    pub capacity: usize,

    /// Behaviour when the queue is full.
    pub overflow: OverflowPolicy,
}

impl Default for StatusBusConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            overflow: OverflowPolicy::Block,
        }
    }
}

/// Root configuration for the homecloud sync agent.
///
/// Loaded from `~/.homecloud/config.json` by default. Only the first entry
/// of [`watch_dirs`](Self::watch_dirs) is watched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directories to keep in sync.
    pub watch_dirs: Vec<Utf8PathBuf>,

    /// Gitignore-style patterns for entries that are never tracked.
    pub ignore_patterns: Vec<String>,

    /// Event source configuration.
    pub watch: WatchConfig,

    /// Sync engine configuration.
    pub sync: SyncConfig,

    /// Status bus configuration.
    pub status_bus: StatusBusConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_dirs: vec![default_watch_dir()],
            ignore_patterns: vec![
                ".DS_Store".to_owned(),
                "Thumbs.db".to_owned(),
                "*.tmp".to_owned(),
            ],
            watch: WatchConfig::default(),
            sync: SyncConfig::default(),
            status_bus: StatusBusConfig::default(),
        }
    }
}

impl Config {
    /// Returns the default configuration file location.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDirectory`] if the home directory is
    /// unknown, or [`ConfigError::InvalidPath`] if it is not UTF-8.
    pub fn default_path() -> Result<Utf8PathBuf, ConfigError> {
        Ok(home_dir()?.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the configuration from `path`.
    ///
    /// A missing file is not an error: the default configuration is written
    /// to `path` and returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the default cannot be written.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save(path)?;
                return Ok(config);
            }
            Err(e) => return Err(ConfigError::io(path, e)),
        };

        Ok(serde_json::from_str(&data)?)
    }

    /// Writes the configuration to `path` as pretty-printed JSON.
    ///
    /// Parent directories are created as needed.
    pub fn save(&self, path: &Utf8Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::io(dir, e))?;
        }

        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data).map_err(|e| ConfigError::io(path, e))
    }

    /// Checks option values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch_dirs.is_empty() {
            return Err(ConfigError::invalid_option(
                "watchDirs",
                "at least one watch directory is required",
            ));
        }
        if self.status_bus.capacity == 0 {
            return Err(ConfigError::invalid_option(
                "statusBus.capacity",
                "must be positive",
            ));
        }
        if self.sync.backoff_base_ms > self.sync.backoff_max_ms {
            return Err(ConfigError::invalid_option(
                "sync.backoffBaseMs",
                "must not exceed sync.backoffMaxMs",
            ));
        }
        Ok(())
    }

    /// Returns the directory that is actually watched.
    #[inline]
    #[must_use]
    pub fn watch_dir(&self) -> Option<&Utf8Path> {
        self.watch_dirs.first().map(Utf8PathBuf::as_path)
    }

    /// Replaces the watched directory, keeping any additional entries.
    pub fn set_watch_dir(&mut self, dir: Utf8PathBuf) {
        match self.watch_dirs.first_mut() {
            Some(first) => *first = dir,
            None => self.watch_dirs.push(dir),
        }
    }
}

fn home_dir() -> Result<Utf8PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
    Utf8PathBuf::from_path_buf(home).map_err(|p| ConfigError::InvalidPath {
        path: Utf8PathBuf::from(p.to_string_lossy().into_owned()),
        reason: "home directory is not valid UTF-8".to_owned(),
    })
}

fn default_watch_dir() -> Utf8PathBuf {
    home_dir().map_or_else(
        |_| Utf8PathBuf::from(WATCH_DIR_NAME),
        |home| home.join(WATCH_DIR_NAME),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.upload_latency_ms, 2_000);
        assert_eq!(config.max_retries, 3);
        assert!(!config.compute_checksums);
        assert!(!WatchConfig::default().follow_links);
    }

    #[test]
    fn test_default_ignore_patterns() {
        let config = Config::default();
        assert_eq!(config.ignore_patterns, vec![".DS_Store", "Thumbs.db", "*.tmp"]);
        assert_eq!(config.watch_dirs.len(), 1);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_uses_camel_case_keys() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json.get("watchDirs").is_some());
        assert!(json.get("ignorePatterns").is_some());
        assert!(json.get("statusBus").is_some());
        assert!(json["sync"].get("uploadLatencyMs").is_some());
    }

    #[test]
    fn test_overflow_policy_serialization() {
        assert_eq!(
            serde_json::to_string(&OverflowPolicy::Block).unwrap(),
            r#""block""#
        );
        assert_eq!(
            serde_json::to_string(&OverflowPolicy::DropOldest).unwrap(),
            r#""drop_oldest""#
        );
    }

    #[test]
    fn test_load_creates_default_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "nested/config.json");

        let config = Config::load(&path).unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "config.json");

        let mut config = Config::default();
        config.set_watch_dir(Utf8PathBuf::from("/srv/sync"));
        config.sync.max_retries = 7;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.watch_dir(), Some(Utf8Path::new("/srv/sync")));
        assert_eq!(loaded.sync.max_retries, 7);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.status_bus.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.watch_dirs.clear();
        assert!(config.validate().is_err());
        assert!(config.watch_dir().is_none());
    }

    #[test]
    fn test_set_watch_dir_on_empty_list() {
        let mut config = Config::default();
        config.watch_dirs.clear();
        config.set_watch_dir(Utf8PathBuf::from("/data"));
        assert_eq!(config.watch_dirs, vec![Utf8PathBuf::from("/data")]);
    }
}
