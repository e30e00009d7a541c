//! Domain types for the driftwatch agent.
//!
//! This module contains the core domain types used throughout the workspace
//! for representing filesystem changes and snapshot paging state.
//!
//! # Module Organization
//!
//! - [`change`] - Change kinds, records, and raw watcher events
//! - [`snapshot`] - Generation identifiers and paging cursors
//!
//! # Re-exports
//!
//! All public types are re-exported at this module level for convenience:
//!
//! ```
//! use dw_core::types::{ChangeKind, ChangeRecord, Cursor, GenerationId};
//! ```
//!
//! They are also re-exported at the crate root:
//!
//! ```
//! use dw_core::{ChangeKind, ChangeRecord, Cursor, GenerationId};
//! ```

mod change;
mod snapshot;

// Re-export all public types
pub use change::{ChangeKind, ChangeRecord, PathEvent};
pub use snapshot::{Cursor, GenerationId};
