//! Configuration structures for the driftwatch agent.
//!
//! This module provides configuration types for all components:
//!
//! - [`TrackerConfig`] - Change tracker settings (capacity, paging, TTLs)
//! - [`WatchConfig`] - File watcher settings (recursion, channel capacity)
//! - [`ServerConfig`] - HTTP server settings (bind address, port)
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] with values matching the
//! agent's documented defaults, and support partial deserialization via
//! `#[serde(default)]`.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the change tracker.
///
/// Controls the capacity bound, paging behavior, and the self-change
/// suppression registry.
///
/// # Examples
///
/// ```
/// use dw_core::TrackerConfig;
///
/// let config = TrackerConfig::default();
/// assert_eq!(config.max_tracked_files, 10_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum number of distinct paths tracked at once.
    ///
    /// Inserting one path beyond this bound clears the entire set and
    /// raises the overflow flag; the consumer must fall back to a full scan.
    pub max_tracked_files: usize,

    /// Default number of records returned per page.
    pub page_size: usize,

    /// Hard upper bound on a requested page size.
    pub max_page_size: usize,

    /// Default time-to-live for a self-change registration, in seconds.
    pub self_change_default_ttl_secs: u64,

    /// Maximum number of live self-change entries.
    ///
    /// The registry is scanner-controlled and expected to stay small; this
    /// cap with oldest-first eviction bounds it regardless.
    pub self_change_max_entries: usize,

    /// Age in seconds after which an un-committed snapshot generation is
    /// considered stale and may be auto-abandoned by the next
    /// `begin_snapshot`.
    pub snapshot_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_tracked_files: 10_000,
            page_size: 256,
            max_page_size: 1_000,
            self_change_default_ttl_secs: 30,
            self_change_max_entries: 1_024,
            snapshot_timeout_secs: 300,
        }
    }
}

impl TrackerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if any capacity or page size
    /// is zero, or if the default page size exceeds the maximum.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tracked_files == 0 {
            return Err(ConfigError::invalid_option(
                "max_tracked_files",
                "must be a positive integer",
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::invalid_option(
                "page_size",
                "must be a positive integer",
            ));
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::invalid_option(
                "max_page_size",
                "must be a positive integer",
            ));
        }
        if self.page_size > self.max_page_size {
            return Err(ConfigError::invalid_option(
                "page_size",
                "must not exceed max_page_size",
            ));
        }
        if self.self_change_max_entries == 0 {
            return Err(ConfigError::invalid_option(
                "self_change_max_entries",
                "must be a positive integer",
            ));
        }
        Ok(())
    }
}

/// Configuration for the file watcher.
///
/// # Examples
///
/// ```
/// use dw_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert!(config.recursive);
/// assert_eq!(config.channel_capacity, 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether to watch subdirectories recursively.
    pub recursive: bool,

    /// Capacity of the event channel between the watcher thread and the
    /// async consumer.
    ///
    /// Bounds memory if the consumer falls behind; the watcher thread
    /// blocks rather than dropping events when the channel is full.
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            channel_capacity: 256,
        }
    }
}

impl WatchConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if the channel capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "channel_capacity",
                "must be a positive integer",
            ));
        }
        Ok(())
    }
}

/// Configuration for the HTTP server exposing the query protocol.
///
/// # Examples
///
/// ```
/// use dw_core::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.port, 8080);
/// assert_eq!(config.address(), "0.0.0.0:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the HTTP server.
    pub bind_addr: String,

    /// Port for the HTTP server.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_owned(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Returns the `addr:port` string to bind.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Root configuration for the driftwatch agent.
///
/// Combines all component configurations into a single structure that can
/// be loaded from a JSON file or constructed programmatically.
///
/// # Examples
///
/// ```
/// use dw_core::Config;
///
/// let config = Config::default();
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// let parsed: Config = serde_json::from_str(&json).unwrap();
/// assert_eq!(config, parsed);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Change tracker configuration.
    pub tracker: TrackerConfig,

    /// File watcher configuration.
    pub watch: WatchConfig,

    /// HTTP server configuration.
    pub server: ServerConfig,
}

impl Config {
    /// Loads and validates a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults, so a partial file like
    /// `{"tracker": {"max_tracked_files": 500}}` is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON, or a validation
    /// error for out-of-range values.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every component configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate()?;
        self.watch.validate()?;
        Ok(())
    }
}
