//! Bounded, insertion-ordered map of path to net change record.
//!
//! [`ChangeSet`] is the recorder's storage: one [`ChangeRecord`] per path,
//! merged via the table in [`merge`](crate::merge), with a hard capacity
//! bound. Violating an insert never evicts arbitrary entries; the caller is
//! told via [`ApplyResult::WouldOverflow`] and performs the full reset,
//! because partial eviction would silently lose track of specific deletions.
//!
//! # Ordering
//!
//! Records iterate in insertion order, which gives the snapshot protocol
//! the stable deterministic order it needs for paging. The order index may
//! contain tombstones for paths whose records were removed (net no-op
//! merges); these are skipped during iteration and compacted away when they
//! outnumber live entries.

use camino::Utf8PathBuf;
use dw_core::{ChangeRecord, FxHashMap, FxHashSet, PathEvent};
use tracing::warn;

use crate::merge::{is_unexpected_transition, merge, MergeOutcome};

/// Minimum tombstone count before a compaction is considered.
const COMPACT_MIN_TOMBSTONES: usize = 64;

/// Outcome of applying one event to the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// A new record was inserted for a previously untracked path.
    Inserted,

    /// An existing record was merged in place.
    Merged,

    /// The merge produced a net no-op and the record was removed.
    Removed,

    /// Inserting would exceed the capacity budget; nothing was inserted.
    ///
    /// The budget may be lower than the configured maximum while a frozen
    /// generation still holds undelivered records (they count as tracked
    /// until committed).
    WouldOverflow,
}

/// Bounded map from path to net change record, stable insertion order.
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Path to record lookup.
    records: FxHashMap<Utf8PathBuf, ChangeRecord>,

    /// Insertion order; may contain tombstones for removed paths.
    order: Vec<Utf8PathBuf>,
}

impl ChangeSet {
    /// Creates an empty set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no records are tracked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns `true` if the path currently has a record.
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &Utf8PathBuf) -> bool {
        self.records.contains_key(path)
    }

    /// Applies one filtered event, merging against any existing record.
    ///
    /// `budget` is the number of *new* paths this set may still accept;
    /// inserting a brand-new key when the budget is zero returns
    /// [`ApplyResult::WouldOverflow`] without inserting. Updating an
    /// existing key never counts against the budget.
    pub fn apply(&mut self, event: PathEvent, budget: usize) -> ApplyResult {
        let existing = self.records.get(&event.path).map(|r| r.kind);

        if is_unexpected_transition(existing, event.kind) {
            warn!(
                path = %event.path,
                existing = ?existing,
                incoming = %event.kind,
                "unexpected change transition; possible watcher decoding defect"
            );
        }

        match merge(existing, event.kind) {
            MergeOutcome::Keep(kind) => {
                if let Some(record) = self.records.get_mut(&event.path) {
                    record.kind = kind;
                    record.timestamp = event.timestamp;
                    ApplyResult::Merged
                } else if budget == 0 {
                    ApplyResult::WouldOverflow
                } else {
                    self.order.push(event.path.clone());
                    let record = ChangeRecord {
                        path: event.path,
                        kind,
                        timestamp: event.timestamp,
                    };
                    self.records.insert(record.path.clone(), record);
                    ApplyResult::Inserted
                }
            }
            MergeOutcome::Remove => {
                // Only reachable when a record existed (Created + Deleted)
                self.records.remove(&event.path);
                self.maybe_compact();
                ApplyResult::Removed
            }
        }
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }

    /// Drains all records in insertion order, leaving the set empty.
    ///
    /// Tombstones and duplicate order entries (from remove-then-reinsert
    /// cycles) are skipped, so each live record appears exactly once.
    #[must_use]
    pub fn drain_in_order(&mut self) -> Vec<ChangeRecord> {
        let mut drained = Vec::with_capacity(self.records.len());

        for path in self.order.drain(..) {
            if let Some(record) = self.records.remove(&path) {
                drained.push(record);
            }
        }

        // Every inserted key is pushed onto `order`, so nothing remains
        debug_assert!(self.records.is_empty());
        self.records.clear();
        drained
    }

    /// Re-bases this set on top of `older` records.
    ///
    /// Used when a generation is abandoned: the frozen records are merged
    /// back *under* anything recorded since the freeze, so the next
    /// snapshot re-offers every undelivered record with newer events
    /// applied on top. The current record's kind is treated as the incoming
    /// side of the merge table, which is sound because a net record is
    /// itself the left-to-right fold of the events that produced it.
    pub fn merge_under(&mut self, older: Vec<ChangeRecord>) {
        let newer = self.drain_in_order();

        for record in older {
            self.insert_unchecked(record);
        }

        for record in newer {
            let existing = self.records.get(&record.path).map(|r| r.kind);
            match merge(existing, record.kind) {
                MergeOutcome::Keep(kind) => {
                    if let Some(slot) = self.records.get_mut(&record.path) {
                        slot.kind = kind;
                        slot.timestamp = record.timestamp;
                    } else {
                        self.insert_unchecked(ChangeRecord { kind, ..record });
                    }
                }
                MergeOutcome::Remove => {
                    self.records.remove(&record.path);
                }
            }
        }
        self.maybe_compact();
    }

    /// Inserts a record without a capacity check.
    ///
    /// Only for rebuilding from previously-bounded content.
    fn insert_unchecked(&mut self, record: ChangeRecord) {
        if !self.records.contains_key(&record.path) {
            self.order.push(record.path.clone());
        }
        self.records.insert(record.path.clone(), record);
    }

    /// Rebuilds the order index when tombstones outnumber live records.
    fn maybe_compact(&mut self) {
        let tombstones = self.order.len().saturating_sub(self.records.len());
        if tombstones < COMPACT_MIN_TOMBSTONES || tombstones < self.records.len() {
            return;
        }

        let mut seen: FxHashSet<Utf8PathBuf> = FxHashSet::default();
        let records = &self.records;
        self.order
            .retain(|path| records.contains_key(path) && seen.insert(path.clone()));
    }
}
