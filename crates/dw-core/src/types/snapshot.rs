//! Generation identifiers and paging cursors.
//!
//! A *generation* is an immutable snapshot of the tracked change set offered
//! to the scanner for paging; a *cursor* marks how far into a generation the
//! scanner has read. Both are opaque to the consumer: the only valid
//! operations are to hand them back to the query protocol unchanged.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a frozen snapshot generation.
///
/// Monotonically increasing for the lifetime of a tracker instance. Exactly
/// one generation may be open for paging at a time.
///
/// # Examples
///
/// ```
/// use dw_core::GenerationId;
///
/// let first = GenerationId::new(1);
/// assert_eq!(first.next(), GenerationId::new(2));
/// assert!(first < first.next());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GenerationId(u64);

impl GenerationId {
    /// Creates a generation id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the successor generation id.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for GenerationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque position marker within a generation's page sequence.
///
/// A cursor is scoped to the generation it was issued for and becomes
/// invalid as soon as that generation is committed, abandoned, or cleared
/// by an overflow reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    /// The generation this cursor belongs to.
    pub generation: GenerationId,

    /// Index of the next record to deliver within the frozen order.
    pub position: usize,
}

impl Cursor {
    /// Creates a cursor at the start of a generation.
    #[inline]
    #[must_use]
    pub const fn start(generation: GenerationId) -> Self {
        Self {
            generation,
            position: 0,
        }
    }

    /// Returns a cursor advanced by `count` records.
    #[inline]
    #[must_use]
    pub const fn advanced(self, count: usize) -> Self {
        Self {
            generation: self.generation,
            position: self.position + count,
        }
    }
}
