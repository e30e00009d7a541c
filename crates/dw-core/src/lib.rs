//! Core types, errors, and configuration for the driftwatch agent.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - Domain types (`ChangeKind`, `ChangeRecord`, `PathEvent`, `GenerationId`, `Cursor`)
//! - Configuration structures with validation
//! - Error types for consistent error handling
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::{Config, ServerConfig, TrackerConfig, WatchConfig};
pub use error::ConfigError;
pub use hash::{FxHashMap, FxHashSet};
pub use types::{ChangeKind, ChangeRecord, Cursor, GenerationId, PathEvent};
