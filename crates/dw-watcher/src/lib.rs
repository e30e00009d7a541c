//! Filesystem watching with kind-preserving decoding for driftwatch.
//!
//! This crate wraps the `notify` watcher and turns its backend-specific
//! events into the small vocabulary the tracker understands: a path plus
//! `Created`, `Modified`, or `Deleted`. Renames are split into a deletion
//! of the source and a creation of the target; an overflowed OS queue is
//! surfaced in-band as [`WatchUpdate::Lagged`] rather than as an error.
//!
//! # Components
//!
//! - [`FsWatcher`]: bridges the blocking notify watcher to tokio channels
//! - [`decode`](decode::decode): maps raw notify events to change kinds
//! - [`PathFilter`]: source-side filtering (ignore lists)
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use dw_core::WatchConfig;
//! use dw_watcher::{FsWatcher, IgnorePatternFilter, WatchUpdate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dw_watcher::WatchError> {
//!     let filter = IgnorePatternFilter::new(&[".git"]);
//!     let mut watcher =
//!         FsWatcher::new(Utf8Path::new("/srv/data"), &WatchConfig::default(), filter).await?;
//!
//!     while let Some(update) = watcher.recv().await {
//!         match update {
//!             WatchUpdate::Event(event) => println!("{}: {}", event.kind, event.path),
//!             WatchUpdate::Lagged => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod decode;
pub mod error;
pub mod filter;
pub mod watcher;

pub use decode::Decoded;
pub use error::WatchError;
pub use filter::{AcceptAllFilter, IgnorePatternFilter, PathFilter};
pub use watcher::{FsWatcher, WatchUpdate};
