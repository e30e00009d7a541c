//! Tracker statistics with atomic counters.
//!
//! This module provides [`TrackerStats`] for counting tracker activity and
//! [`StatsSnapshot`] for point-in-time views served on the stats endpoint.
//!
//! # Thread Safety
//!
//! All counters use [`AtomicU64`] with relaxed ordering. Statistics are
//! informational and are incremented outside the tracker's critical
//! section wherever possible.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters for tracker activity.
///
/// # Examples
///
/// ```
/// use dw_tracker::TrackerStats;
///
/// let stats = TrackerStats::new();
/// stats.increment_recorded();
/// stats.increment_suppressed();
///
/// let snap = stats.snapshot(1, 0, 1);
/// assert_eq!(snap.events_recorded, 1);
/// assert_eq!(snap.events_suppressed, 1);
/// ```
#[derive(Debug, Default)]
pub struct TrackerStats {
    /// Events that created a new record.
    recorded: AtomicU64,
    /// Events merged into an existing record.
    merged: AtomicU64,
    /// Merges that produced a net no-op (record removed).
    cancelled: AtomicU64,
    /// Events dropped by the self-change filter.
    suppressed: AtomicU64,
    /// Events ignored while the overflow flag was set.
    ignored_overflowed: AtomicU64,
    /// Overflow resets (capacity exceeded or forced).
    overflows: AtomicU64,
    /// Generations frozen via `begin_snapshot`.
    generations_begun: AtomicU64,
    /// Generations committed.
    generations_committed: AtomicU64,
    /// Generations abandoned (explicitly or by timeout).
    generations_abandoned: AtomicU64,
}

impl TrackerStats {
    /// Creates a new [`TrackerStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the new-record counter.
    #[inline]
    pub fn increment_recorded(&self) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the merged-event counter.
    #[inline]
    pub fn increment_merged(&self) {
        self.merged.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the net-no-op counter.
    #[inline]
    pub fn increment_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the self-change suppression counter.
    #[inline]
    pub fn increment_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the ignored-while-overflowed counter.
    #[inline]
    pub fn increment_ignored_overflowed(&self) {
        self.ignored_overflowed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the overflow reset counter.
    #[inline]
    pub fn increment_overflows(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the generations-begun counter.
    #[inline]
    pub fn increment_generations_begun(&self) {
        self.generations_begun.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the generations-committed counter.
    #[inline]
    pub fn increment_generations_committed(&self) {
        self.generations_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the generations-abandoned counter.
    #[inline]
    pub fn increment_generations_abandoned(&self) {
        self.generations_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot.
    ///
    /// Set sizes and the self-change entry count are owned by the tracker
    /// and passed in, since they live behind its locks rather than in
    /// atomics.
    #[must_use]
    pub fn snapshot(
        &self,
        live_records: usize,
        frozen_records: usize,
        self_change_entries: usize,
    ) -> StatsSnapshot {
        StatsSnapshot {
            events_recorded: self.recorded.load(Ordering::Relaxed),
            events_merged: self.merged.load(Ordering::Relaxed),
            events_cancelled: self.cancelled.load(Ordering::Relaxed),
            events_suppressed: self.suppressed.load(Ordering::Relaxed),
            events_ignored_overflowed: self.ignored_overflowed.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            generations_begun: self.generations_begun.load(Ordering::Relaxed),
            generations_committed: self.generations_committed.load(Ordering::Relaxed),
            generations_abandoned: self.generations_abandoned.load(Ordering::Relaxed),
            live_records,
            frozen_records,
            self_change_entries,
        }
    }
}

/// Point-in-time view of tracker statistics.
///
/// Serializable for the agent's stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Events that created a new record.
    pub events_recorded: u64,
    /// Events merged into an existing record.
    pub events_merged: u64,
    /// Merges that produced a net no-op.
    pub events_cancelled: u64,
    /// Events dropped by the self-change filter.
    pub events_suppressed: u64,
    /// Events ignored while overflowed.
    pub events_ignored_overflowed: u64,
    /// Overflow resets.
    pub overflows: u64,
    /// Generations frozen.
    pub generations_begun: u64,
    /// Generations committed.
    pub generations_committed: u64,
    /// Generations abandoned.
    pub generations_abandoned: u64,
    /// Current live (pending) record count.
    pub live_records: usize,
    /// Record count of the frozen generation, if any.
    pub frozen_records: usize,
    /// Live self-change suppression entries.
    pub self_change_entries: usize,
}
