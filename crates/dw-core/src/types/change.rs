//! Change kinds, records, and raw watcher events.
//!
//! This module provides the three-valued [`ChangeKind`] that every
//! OS-specific filesystem event is decoded into, the [`PathEvent`] triple
//! emitted by the watcher adapter, and the [`ChangeRecord`] net-effect entry
//! stored by the tracker.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The kind of change observed for a path.
///
/// The watcher adapter is responsible for decoding OS-specific event
/// semantics (renames, moves) into this three-valued kind; a rename is
/// modeled as a `Deleted` + `Created` pair at the adapter boundary.
///
/// # Examples
///
/// ```
/// use dw_core::ChangeKind;
///
/// assert!(ChangeKind::Deleted.is_deleted());
/// assert!(!ChangeKind::Created.is_deleted());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The path appeared (file or directory created, or rename target).
    Created,

    /// The path's content or metadata changed.
    Modified,

    /// The path disappeared (removed, or rename source).
    Deleted,
}

impl ChangeKind {
    /// Returns `true` if this is a deletion.
    #[inline]
    #[must_use]
    pub const fn is_deleted(self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Returns a short lowercase label, matching the serde representation.
    ///
    /// # Examples
    ///
    /// ```
    /// use dw_core::ChangeKind;
    ///
    /// assert_eq!(ChangeKind::Created.as_str(), "created");
    /// assert_eq!(ChangeKind::Modified.as_str(), "modified");
    /// assert_eq!(ChangeKind::Deleted.as_str(), "deleted");
    /// ```
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded filesystem event: the `(path, kind, timestamp)` triple.
///
/// This is the only input the tracker accepts. The watcher adapter produces
/// well-formed triples or nothing; adapter-internal failures (permission
/// denial, transient I/O errors) never reach the tracker.
///
/// # Examples
///
/// ```
/// use dw_core::{ChangeKind, PathEvent};
/// use camino::Utf8PathBuf;
///
/// let event = PathEvent::new(Utf8PathBuf::from("/work/a.txt"), ChangeKind::Created);
/// assert_eq!(event.kind, ChangeKind::Created);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEvent {
    /// Absolute path of the file or directory that changed.
    pub path: Utf8PathBuf,

    /// The decoded change kind.
    pub kind: ChangeKind,

    /// When the event was decoded.
    ///
    /// Uses [`Instant`] for monotonic timing; suitable for TTL comparisons,
    /// not for wall-clock display.
    pub timestamp: Instant,
}

impl PathEvent {
    /// Creates a new event timestamped at the current instant.
    #[inline]
    #[must_use]
    pub fn new(path: Utf8PathBuf, kind: ChangeKind) -> Self {
        Self {
            path,
            kind,
            timestamp: Instant::now(),
        }
    }

    /// Creates a new event with an explicit timestamp.
    ///
    /// Useful for testing and for re-stamping decoded rename pairs so both
    /// halves carry the same instant.
    #[inline]
    #[must_use]
    pub const fn with_timestamp(path: Utf8PathBuf, kind: ChangeKind, timestamp: Instant) -> Self {
        Self {
            path,
            kind,
            timestamp,
        }
    }
}

/// The net change state for one path since the last committed delivery.
///
/// Exactly one record exists per tracked path; successive events for the
/// same path are merged so the record always reflects the *net* effect,
/// independent of how many intermediate events occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// The tracked path.
    pub path: Utf8PathBuf,

    /// The merged net change kind.
    pub kind: ChangeKind,

    /// Timestamp of the most recent event merged into this record.
    pub timestamp: Instant,
}

impl ChangeRecord {
    /// Creates a record from a decoded event.
    #[inline]
    #[must_use]
    pub fn from_event(event: &PathEvent) -> Self {
        Self {
            path: event.path.clone(),
            kind: event.kind,
            timestamp: event.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_labels() {
        assert_eq!(ChangeKind::Created.as_str(), "created");
        assert_eq!(ChangeKind::Modified.as_str(), "modified");
        assert_eq!(ChangeKind::Deleted.as_str(), "deleted");
        assert_eq!(ChangeKind::Deleted.to_string(), "deleted");
    }

    #[test]
    fn test_change_kind_serde() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::Created).unwrap(),
            r#""created""#
        );
        let kind: ChangeKind = serde_json::from_str(r#""deleted""#).unwrap();
        assert_eq!(kind, ChangeKind::Deleted);
    }

    #[test]
    fn test_path_event_new() {
        let event = PathEvent::new(Utf8PathBuf::from("/work/a.txt"), ChangeKind::Modified);
        assert_eq!(event.path.as_str(), "/work/a.txt");
        assert_eq!(event.kind, ChangeKind::Modified);
    }

    #[test]
    fn test_record_from_event() {
        let event = PathEvent::new(Utf8PathBuf::from("/work/a.txt"), ChangeKind::Created);
        let record = ChangeRecord::from_event(&event);
        assert_eq!(record.path, event.path);
        assert_eq!(record.kind, ChangeKind::Created);
        assert_eq!(record.timestamp, event.timestamp);
    }
}
