//! Frozen snapshot generations and page assembly.
//!
//! When the scanner begins a snapshot, the live change set is frozen into a
//! [`FrozenGeneration`]: an immutable, insertion-ordered list of records
//! plus the overflow flag value captured at freeze time. The scanner pages
//! through it with cursors; events arriving meanwhile accumulate in the
//! (now empty) live set and become the *next* generation, so a page can
//! never mix pre- and post-freeze records.

use std::time::Instant;

use dw_core::{ChangeRecord, Cursor, GenerationId};

use crate::error::ProtocolError;

/// A page of records served from a frozen generation.
#[derive(Debug, Clone)]
pub struct Page {
    /// Records in the generation's stable order, at most the clamped page
    /// size.
    pub records: Vec<ChangeRecord>,

    /// Cursor for the next page; still valid when `done` (pointing at the
    /// end) so repeated polls stay cheap.
    pub next_cursor: Cursor,

    /// Overflow flag captured when the generation was frozen.
    ///
    /// When `true`, `records` must not be trusted as a complete delta; the
    /// consumer is expected to fall back to a full scan.
    pub overflow: bool,

    /// `true` once the generation is exhausted.
    pub done: bool,
}

/// The read-only content of one snapshot generation.
#[derive(Debug)]
pub struct FrozenGeneration {
    /// Identifier handed to the scanner.
    generation: GenerationId,

    /// Records in insertion order, fixed at freeze time.
    records: Vec<ChangeRecord>,

    /// Overflow flag value at freeze time.
    overflow: bool,

    /// Set once the first page has been served (the flag counts as
    /// delivered from that point).
    overflow_delivered: bool,

    /// Set once a page response with `done = true` has been served;
    /// commit is only valid afterwards.
    done_observed: bool,

    /// Freeze instant, for staleness-based auto-abandon.
    frozen_at: Instant,
}

impl FrozenGeneration {
    /// Freezes `records` under a new generation id.
    #[must_use]
    pub fn new(generation: GenerationId, records: Vec<ChangeRecord>, overflow: bool) -> Self {
        Self {
            generation,
            records,
            overflow,
            overflow_delivered: false,
            done_observed: false,
            frozen_at: Instant::now(),
        }
    }

    /// The generation identifier.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> GenerationId {
        self.generation
    }

    /// Number of records frozen in this generation.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the generation holds no records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the captured overflow flag has been served at least once.
    #[inline]
    #[must_use]
    pub const fn overflow_delivered(&self) -> bool {
        self.overflow_delivered
    }

    /// Whether a `done = true` page has been served.
    #[inline]
    #[must_use]
    pub const fn done_observed(&self) -> bool {
        self.done_observed
    }

    /// How long ago this generation was frozen.
    #[inline]
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.frozen_at.elapsed()
    }

    /// Serves one page at `cursor`, up to `page_size` records.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidCursor`] if the cursor belongs to a
    /// different generation or points past the end of this one.
    pub fn page(&mut self, cursor: Cursor, page_size: usize) -> Result<Page, ProtocolError> {
        if cursor.generation != self.generation || cursor.position > self.records.len() {
            return Err(ProtocolError::InvalidCursor);
        }

        let end = cursor.position.saturating_add(page_size).min(self.records.len());
        let records = self.records[cursor.position..end].to_vec();
        let done = end == self.records.len();

        self.overflow_delivered = true;
        if done {
            self.done_observed = true;
        }

        Ok(Page {
            records,
            next_cursor: Cursor {
                generation: self.generation,
                position: end,
            },
            overflow: self.overflow,
            done,
        })
    }

    /// Consumes the generation, returning its records (for abandon).
    #[must_use]
    pub fn into_records(self) -> Vec<ChangeRecord> {
        self.records
    }
}
