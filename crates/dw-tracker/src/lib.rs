//! Bounded change tracking with deterministic merge semantics.
//!
//! This crate is the heart of the drift-watching agent: it condenses a
//! stream of filesystem events into a bounded set of net-effect change
//! records and serves them to a scanner through a generation-based,
//! acknowledgment-committed paging protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   PathEvent    ┌───────────────────────────────┐
//! │  dw-watcher  │ ─────────────► │         ChangeTracker         │
//! └──────────────┘                │                               │
//!                                 │ SelfChangeFilter (suppression)│
//! ┌──────────────┐ register()     │        │                      │
//! │   scanner    │ ─────────────► │        ▼                      │
//! │  (consumer)  │                │ ChangeSet (merge table,       │
//! │              │ begin/page/    │   bounded, insertion order)   │
//! │              │ commit/abandon │        │ freeze               │
//! │              │ ◄───────────── │        ▼                      │
//! └──────────────┘     Page       │ FrozenGeneration (paging)     │
//!                                 └───────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - **Net effect**: per path, at most one record, the merge of everything
//!   observed (create then delete vanishes; delete then create becomes a
//!   modification).
//! - **Bounded memory**: at most `max_tracked_files` records across the
//!   live and frozen sets. Exceeding the bound clears everything and sets
//!   an overflow flag rather than silently dropping a subset.
//! - **At-least-once delivery**: records are only discarded on commit;
//!   an abandoned or timed-out generation is re-offered in full.
//! - **Stable paging**: a frozen generation never changes under its
//!   cursors; concurrent events go to the next generation.
//!
//! # Examples
//!
//! ```
//! use camino::Utf8PathBuf;
//! use dw_core::{ChangeKind, PathEvent, TrackerConfig};
//! use dw_tracker::ChangeTracker;
//!
//! let tracker = ChangeTracker::new(TrackerConfig::default())?;
//! tracker.record(PathEvent::new(
//!     Utf8PathBuf::from("/srv/data/report.csv"),
//!     ChangeKind::Modified,
//! ));
//!
//! let start = tracker.begin_snapshot()?;
//! let page = tracker.get_page(start.cursor, None)?;
//! assert_eq!(page.records.len(), 1);
//! tracker.commit(start.generation)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod change_set;
pub mod error;
pub mod merge;
pub mod self_filter;
pub mod snapshot;
pub mod stats;
pub mod tracker;

pub use change_set::{ApplyResult, ChangeSet};
pub use error::ProtocolError;
pub use merge::{merge, MergeOutcome};
pub use self_filter::SelfChangeFilter;
pub use snapshot::{FrozenGeneration, Page};
pub use stats::{StatsSnapshot, TrackerStats};
pub use tracker::{ChangeTracker, SnapshotStart};
