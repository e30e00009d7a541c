//! The change tracker facade.
//!
//! [`ChangeTracker`] ties the pieces together: the self-change filter in
//! front, the bounded change set and overflow handling in the middle, and
//! the snapshot/query protocol on top. All mutations of the change set and
//! the protocol state machine go through one mutex, because the merge table
//! needs atomic read-modify-write per path and freeze/clear need atomicity
//! over the whole set. No I/O happens inside the critical section.
//!
//! # State machine
//!
//! ```text
//!            begin_snapshot            commit / abandon
//!   Idle ───────────────────► Paging ───────────────────► Idle
//!    ▲                          │
//!    └──────────────────────────┘
//!        overflow reset (aborts the in-flight generation)
//! ```
//!
//! Events recorded before `begin_snapshot` land in that generation; events
//! recorded after accumulate in the emptied live set and become the next
//! generation once the current one is committed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use dw_core::{ConfigError, Cursor, GenerationId, PathEvent, TrackerConfig};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::change_set::{ApplyResult, ChangeSet};
use crate::error::ProtocolError;
use crate::self_filter::SelfChangeFilter;
use crate::snapshot::{FrozenGeneration, Page};
use crate::stats::{StatsSnapshot, TrackerStats};

/// Result of a successful `begin_snapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotStart {
    /// The newly frozen generation.
    pub generation: GenerationId,

    /// Cursor positioned at the first record.
    pub cursor: Cursor,
}

/// Mutable tracker state guarded by the single writer lock.
#[derive(Debug)]
struct TrackerState {
    /// Live (pending) change set; restarts empty at each freeze.
    live: ChangeSet,

    /// The generation currently open for paging, if any.
    frozen: Option<FrozenGeneration>,

    /// Overflow flag: set on reset, cleared when delivered in a page.
    overflow: bool,

    /// Id assigned to the next frozen generation.
    next_generation: GenerationId,
}

/// The change-tracking engine.
///
/// Cheaply cloneable via internal `Arc` references; clones share the same
/// state, filter, and statistics, so the watcher pump and the HTTP handlers
/// can hold their own copies.
///
/// # Examples
///
/// ```
/// use dw_core::{ChangeKind, PathEvent, TrackerConfig};
/// use dw_tracker::ChangeTracker;
/// use camino::Utf8PathBuf;
///
/// let tracker = ChangeTracker::new(TrackerConfig::default()).unwrap();
/// tracker.record(PathEvent::new(
///     Utf8PathBuf::from("/work/a.txt"),
///     ChangeKind::Created,
/// ));
///
/// let start = tracker.begin_snapshot().unwrap();
/// let page = tracker.get_page(start.cursor, None).unwrap();
/// assert_eq!(page.records.len(), 1);
/// assert!(page.done);
/// tracker.commit(start.generation).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    /// Tracker configuration (immutable after construction).
    config: TrackerConfig,

    /// Change set + protocol state behind the single writer lock.
    state: Arc<Mutex<TrackerState>>,

    /// Self-change suppression registry (independent lock).
    filter: Arc<SelfChangeFilter>,

    /// Activity counters.
    stats: Arc<TrackerStats>,
}

impl ChangeTracker {
    /// Creates a tracker with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration fails validation.
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        info!(
            max_tracked_files = config.max_tracked_files,
            page_size = config.page_size,
            "creating change tracker"
        );

        Ok(Self {
            config,
            state: Arc::new(Mutex::new(TrackerState {
                live: ChangeSet::new(),
                frozen: None,
                overflow: false,
                next_generation: GenerationId::new(1),
            })),
            filter: Arc::new(SelfChangeFilter::new(
                Duration::from_secs(config.self_change_default_ttl_secs),
                config.self_change_max_entries,
            )),
            stats: Arc::new(TrackerStats::new()),
        })
    }

    /// Returns the tracker configuration.
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Registers a self-change suppression for `prefix`.
    ///
    /// Events under the prefix are dropped until the TTL lapses; `None`
    /// uses the configured default. Called by the scanner before or while
    /// it performs writes it does not want reported back.
    pub fn register_self_change(&self, prefix: Utf8PathBuf, ttl: Option<Duration>) {
        debug!(prefix = %prefix, ?ttl, "registering self-change suppression");
        self.filter.register(prefix, ttl, Instant::now());
    }

    /// Records one decoded filesystem event.
    ///
    /// Applies the self-change filter, then merges into the live set.
    /// While the overflow flag is set, events are deliberately ignored:
    /// the consumer is expected to fall back to a full scan, and a partial
    /// delta collected after overflow would be misleading against that
    /// baseline.
    pub fn record(&self, event: PathEvent) {
        if self.filter.should_drop(&event.path, event.timestamp) {
            self.stats.increment_suppressed();
            return;
        }

        let mut state = self.state.lock();

        if state.overflow {
            self.stats.increment_ignored_overflowed();
            return;
        }

        let frozen_len = state.frozen.as_ref().map_or(0, FrozenGeneration::len);
        let budget = self
            .config
            .max_tracked_files
            .saturating_sub(state.live.len() + frozen_len);

        match state.live.apply(event, budget) {
            ApplyResult::Inserted => self.stats.increment_recorded(),
            ApplyResult::Merged => self.stats.increment_merged(),
            ApplyResult::Removed => self.stats.increment_cancelled(),
            ApplyResult::WouldOverflow => {
                self.overflow_reset(&mut state, "capacity exceeded");
            }
        }
    }

    /// Forces an overflow reset.
    ///
    /// Used by the watcher adapter when the OS event queue overflowed
    /// (`notify` reports a rescan-needed flag): the delta can no longer be
    /// trusted, which is exactly what the overflow contract communicates.
    pub fn force_overflow(&self) {
        let mut state = self.state.lock();
        self.overflow_reset(&mut state, "watcher requested rescan");
    }

    /// Freezes the current change set into a new generation for paging.
    ///
    /// Only valid while no generation is open. A generation left open
    /// longer than the configured snapshot timeout is presumed orphaned by
    /// a crashed consumer and is auto-abandoned first (its records merge
    /// back into the live set, so nothing is lost).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Busy`] when a non-stale generation is
    /// already open.
    pub fn begin_snapshot(&self) -> Result<SnapshotStart, ProtocolError> {
        let timeout = Duration::from_secs(self.config.snapshot_timeout_secs);
        let mut state = self.state.lock();

        if let Some(stale) = state
            .frozen
            .take_if(|frozen| frozen.age() > timeout)
        {
            warn!(
                generation = %stale.id(),
                age_secs = stale.age().as_secs(),
                "auto-abandoning stale generation"
            );
            self.stats.increment_generations_abandoned();
            let records = stale.into_records();
            state.live.merge_under(records);
        }

        if state.frozen.is_some() {
            return Err(ProtocolError::Busy);
        }

        let generation = state.next_generation;
        state.next_generation = generation.next();

        let records = state.live.drain_in_order();
        let overflow = state.overflow;

        debug!(
            generation = %generation,
            records = records.len(),
            overflow,
            "freezing snapshot generation"
        );

        state.frozen = Some(FrozenGeneration::new(generation, records, overflow));
        self.stats.increment_generations_begun();

        Ok(SnapshotStart {
            generation,
            cursor: Cursor::start(generation),
        })
    }

    /// Serves one page of the open generation.
    ///
    /// `page_size` defaults to the configured page size and is clamped to
    /// the configured maximum. Delivering a page that carries the captured
    /// overflow flag clears the live flag and resumes tracking from the
    /// (empty) live set.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidCursor`] when no generation is open
    /// or the cursor belongs to a different one.
    pub fn get_page(&self, cursor: Cursor, page_size: Option<usize>) -> Result<Page, ProtocolError> {
        let size = page_size
            .unwrap_or(self.config.page_size)
            .clamp(1, self.config.max_page_size);

        let mut state = self.state.lock();
        let frozen = state.frozen.as_mut().ok_or(ProtocolError::InvalidCursor)?;
        let page = frozen.page(cursor, size)?;

        if page.overflow && state.overflow {
            info!("overflow flag delivered; resuming tracking from empty state");
            state.overflow = false;
        }

        Ok(page)
    }

    /// Commits a fully paged generation.
    ///
    /// Drops the frozen records for good and returns to Idle; the pending
    /// live set is untouched and becomes the next generation.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] if the generation is not the
    /// open one or its final (`done = true`) page has not been read.
    pub fn commit(&self, generation: GenerationId) -> Result<(), ProtocolError> {
        let mut state = self.state.lock();

        match &state.frozen {
            Some(frozen) if frozen.id() == generation => {
                if !frozen.done_observed() {
                    return Err(ProtocolError::InvalidState(generation));
                }
            }
            _ => return Err(ProtocolError::InvalidState(generation)),
        }

        if let Some(committed) = state.frozen.take() {
            info!(
                generation = %generation,
                records = committed.len(),
                "committed snapshot generation"
            );
        }
        self.stats.increment_generations_committed();
        Ok(())
    }

    /// Abandons the open generation without losing its records.
    ///
    /// The frozen records merge back under anything recorded since the
    /// freeze, so the next `begin_snapshot` re-offers all of them
    /// (at-least-once delivery). Abandoning a generation that is not open
    /// is an idempotent no-op, so a consumer retrying after a timeout race
    /// never sees a spurious failure.
    pub fn abandon(&self, generation: GenerationId) {
        let mut state = self.state.lock();

        if let Some(frozen) = state.frozen.take_if(|frozen| frozen.id() == generation) {
            info!(
                generation = %generation,
                records = frozen.len(),
                "abandoned snapshot generation"
            );
            self.stats.increment_generations_abandoned();
            let records = frozen.into_records();
            state.live.merge_under(records);
        } else {
            debug!(generation = %generation, "abandon for inactive generation; ignoring");
        }
    }

    /// Sweeps expired self-change entries; returns how many were removed.
    pub fn sweep_self_changes(&self) -> usize {
        self.filter.sweep(Instant::now())
    }

    /// Returns a point-in-time statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        let (live, frozen) = {
            let state = self.state.lock();
            (
                state.live.len(),
                state.frozen.as_ref().map_or(0, FrozenGeneration::len),
            )
        };
        self.stats.snapshot(live, frozen, self.filter.len())
    }

    /// Clears all tracked state and raises the overflow flag.
    ///
    /// Aborts any in-flight generation: its cursors become invalid, which
    /// the consumer observes as `InvalidCursor` and resolves by beginning
    /// a fresh snapshot (whose first page carries the flag).
    fn overflow_reset(&self, state: &mut TrackerState, reason: &str) {
        if let Some(aborted) = state.frozen.take() {
            warn!(
                generation = %aborted.id(),
                "overflow reset aborted in-flight generation"
            );
        }
        state.live.clear();
        state.overflow = true;
        self.stats.increment_overflows();
        warn!(reason, "change tracking overflowed; full rescan required");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dw_core::ChangeKind;

    fn tracker_with_capacity(max: usize) -> ChangeTracker {
        ChangeTracker::new(TrackerConfig {
            max_tracked_files: max,
            ..TrackerConfig::default()
        })
        .unwrap()
    }

    fn record(tracker: &ChangeTracker, path: &str, kind: ChangeKind) {
        tracker.record(PathEvent::new(Utf8PathBuf::from(path), kind));
    }

    fn drain_all(tracker: &ChangeTracker, start: SnapshotStart) -> (Vec<(String, ChangeKind)>, bool) {
        let mut cursor = start.cursor;
        let mut records = Vec::new();
        let mut overflow = false;
        loop {
            let page = tracker.get_page(cursor, Some(2)).unwrap();
            records.extend(
                page.records
                    .iter()
                    .map(|r| (r.path.to_string(), r.kind)),
            );
            overflow = page.overflow;
            cursor = page.next_cursor;
            if page.done {
                break;
            }
        }
        (records, overflow)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = ChangeTracker::new(TrackerConfig {
            max_tracked_files: 0,
            ..TrackerConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_basic_record_and_deliver() {
        let tracker = tracker_with_capacity(100);
        record(&tracker, "/a", ChangeKind::Created);
        record(&tracker, "/b", ChangeKind::Modified);
        record(&tracker, "/c", ChangeKind::Deleted);

        let start = tracker.begin_snapshot().unwrap();
        let (records, overflow) = drain_all(&tracker, start);
        assert!(!overflow);
        assert_eq!(
            records,
            vec![
                ("/a".to_owned(), ChangeKind::Created),
                ("/b".to_owned(), ChangeKind::Modified),
                ("/c".to_owned(), ChangeKind::Deleted),
            ]
        );
        tracker.commit(start.generation).unwrap();
    }

    #[test]
    fn test_begin_while_paging_is_busy() {
        let tracker = tracker_with_capacity(100);
        record(&tracker, "/a", ChangeKind::Created);

        let start = tracker.begin_snapshot().unwrap();
        assert_eq!(tracker.begin_snapshot().unwrap_err(), ProtocolError::Busy);

        let (_, _) = drain_all(&tracker, start);
        tracker.commit(start.generation).unwrap();
        assert!(tracker.begin_snapshot().is_ok());
    }

    #[test]
    fn test_events_during_paging_go_to_next_generation() {
        let tracker = tracker_with_capacity(100);
        record(&tracker, "/before", ChangeKind::Created);

        let start = tracker.begin_snapshot().unwrap();
        record(&tracker, "/during", ChangeKind::Modified);

        let (records, _) = drain_all(&tracker, start);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "/before");
        tracker.commit(start.generation).unwrap();

        let next = tracker.begin_snapshot().unwrap();
        let (records, _) = drain_all(&tracker, next);
        assert_eq!(records, vec![("/during".to_owned(), ChangeKind::Modified)]);
    }

    #[test]
    fn test_commit_before_done_is_invalid_state() {
        let tracker = tracker_with_capacity(100);
        for i in 0..5 {
            record(&tracker, &format!("/f{i}"), ChangeKind::Created);
        }

        let start = tracker.begin_snapshot().unwrap();
        let page = tracker.get_page(start.cursor, Some(2)).unwrap();
        assert!(!page.done);

        assert_eq!(
            tracker.commit(start.generation).unwrap_err(),
            ProtocolError::InvalidState(start.generation)
        );
    }

    #[test]
    fn test_double_commit_is_invalid_state() {
        let tracker = tracker_with_capacity(100);
        record(&tracker, "/a", ChangeKind::Created);

        let start = tracker.begin_snapshot().unwrap();
        let (_, _) = drain_all(&tracker, start);
        tracker.commit(start.generation).unwrap();

        assert_eq!(
            tracker.commit(start.generation).unwrap_err(),
            ProtocolError::InvalidState(start.generation)
        );
    }

    #[test]
    fn test_stale_cursor_after_commit() {
        let tracker = tracker_with_capacity(100);
        record(&tracker, "/a", ChangeKind::Created);

        let start = tracker.begin_snapshot().unwrap();
        let page = tracker.get_page(start.cursor, None).unwrap();
        tracker.commit(start.generation).unwrap();

        assert_eq!(
            tracker.get_page(page.next_cursor, None).unwrap_err(),
            ProtocolError::InvalidCursor
        );
    }

    #[test]
    fn test_abandon_reoffers_everything() {
        let tracker = tracker_with_capacity(100);
        record(&tracker, "/a", ChangeKind::Created);
        record(&tracker, "/b", ChangeKind::Deleted);

        let start = tracker.begin_snapshot().unwrap();
        // Consumer crashes mid-page; meanwhile more events arrive
        record(&tracker, "/c", ChangeKind::Modified);
        tracker.abandon(start.generation);

        let retry = tracker.begin_snapshot().unwrap();
        let (records, _) = drain_all(&tracker, retry);
        assert_eq!(
            records,
            vec![
                ("/a".to_owned(), ChangeKind::Created),
                ("/b".to_owned(), ChangeKind::Deleted),
                ("/c".to_owned(), ChangeKind::Modified),
            ]
        );
    }

    #[test]
    fn test_abandon_inactive_generation_is_noop() {
        let tracker = tracker_with_capacity(100);
        tracker.abandon(GenerationId::new(42));

        record(&tracker, "/a", ChangeKind::Created);
        let start = tracker.begin_snapshot().unwrap();
        tracker.abandon(GenerationId::new(42)); // wrong id, ignored

        let (records, _) = drain_all(&tracker, start);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_overflow_end_to_end() {
        // Full lifecycle with a capacity of two
        let tracker = tracker_with_capacity(2);
        record(&tracker, "/a", ChangeKind::Created);
        record(&tracker, "/b", ChangeKind::Created);
        record(&tracker, "/c", ChangeKind::Created); // overflows

        // While overflowed, events are ignored
        record(&tracker, "/d", ChangeKind::Created);

        let start = tracker.begin_snapshot().unwrap();
        let page = tracker.get_page(start.cursor, None).unwrap();
        assert!(page.records.is_empty());
        assert!(page.overflow);
        assert!(page.done);

        tracker.commit(start.generation).unwrap();

        // Tracking resumed from empty state
        record(&tracker, "/a", ChangeKind::Modified);
        let next = tracker.begin_snapshot().unwrap();
        let (records, overflow) = drain_all(&tracker, next);
        assert!(!overflow);
        assert_eq!(records, vec![("/a".to_owned(), ChangeKind::Modified)]);
    }

    #[test]
    fn test_overflow_flag_clears_on_delivery_without_commit() {
        let tracker = tracker_with_capacity(1);
        record(&tracker, "/a", ChangeKind::Created);
        record(&tracker, "/b", ChangeKind::Created); // overflows

        let start = tracker.begin_snapshot().unwrap();
        let page = tracker.get_page(start.cursor, None).unwrap();
        assert!(page.overflow);

        // Flag was read: tracking resumes even though nothing is committed
        record(&tracker, "/fresh", ChangeKind::Created);
        assert_eq!(tracker.stats().live_records, 1);
    }

    #[test]
    fn test_overflow_aborts_inflight_generation() {
        let tracker = tracker_with_capacity(2);
        record(&tracker, "/a", ChangeKind::Created);

        let start = tracker.begin_snapshot().unwrap();
        // Frozen /a counts as tracked until committed; two more distinct
        // paths exhaust the budget
        record(&tracker, "/b", ChangeKind::Created);
        record(&tracker, "/c", ChangeKind::Created); // overflows

        assert_eq!(
            tracker.get_page(start.cursor, None).unwrap_err(),
            ProtocolError::InvalidCursor
        );

        let fresh = tracker.begin_snapshot().unwrap();
        let page = tracker.get_page(fresh.cursor, None).unwrap();
        assert!(page.overflow);
        assert!(page.records.is_empty());
    }

    #[test]
    fn test_forced_overflow() {
        let tracker = tracker_with_capacity(100);
        record(&tracker, "/a", ChangeKind::Created);
        tracker.force_overflow();

        let start = tracker.begin_snapshot().unwrap();
        let page = tracker.get_page(start.cursor, None).unwrap();
        assert!(page.records.is_empty());
        assert!(page.overflow);
    }

    #[test]
    fn test_self_change_suppression() {
        let tracker = tracker_with_capacity(100);
        tracker.register_self_change(
            Utf8PathBuf::from("/tmp/work"),
            Some(Duration::from_secs(60)),
        );

        record(&tracker, "/tmp/work/a.txt", ChangeKind::Created);
        record(&tracker, "/tmp/other.txt", ChangeKind::Created);

        let start = tracker.begin_snapshot().unwrap();
        let (records, _) = drain_all(&tracker, start);
        assert_eq!(records, vec![("/tmp/other.txt".to_owned(), ChangeKind::Created)]);

        let snap = tracker.stats();
        assert_eq!(snap.events_suppressed, 1);
        assert_eq!(snap.events_recorded, 1);
    }

    #[test]
    fn test_stale_generation_auto_abandoned() {
        let tracker = ChangeTracker::new(TrackerConfig {
            snapshot_timeout_secs: 0,
            ..TrackerConfig::default()
        })
        .unwrap();

        record(&tracker, "/a", ChangeKind::Created);
        let orphaned = tracker.begin_snapshot().unwrap();
        std::thread::sleep(Duration::from_millis(5));

        // The orphaned generation ages past the (zero) timeout and is
        // replaced; its record is still offered
        let retry = tracker.begin_snapshot().unwrap();
        assert_ne!(retry.generation, orphaned.generation);
        let (records, _) = drain_all(&tracker, retry);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_merge_net_effect_through_protocol() {
        let tracker = tracker_with_capacity(100);
        record(&tracker, "/a", ChangeKind::Created);
        record(&tracker, "/a", ChangeKind::Modified);
        record(&tracker, "/a", ChangeKind::Deleted); // net no-op

        record(&tracker, "/b", ChangeKind::Deleted);
        record(&tracker, "/b", ChangeKind::Created); // recreation

        let start = tracker.begin_snapshot().unwrap();
        let (records, _) = drain_all(&tracker, start);
        assert_eq!(records, vec![("/b".to_owned(), ChangeKind::Modified)]);
    }

    #[test]
    fn test_stats_snapshot_accounting() {
        let tracker = tracker_with_capacity(100);
        record(&tracker, "/a", ChangeKind::Created);
        record(&tracker, "/a", ChangeKind::Modified);
        record(&tracker, "/b", ChangeKind::Created);
        record(&tracker, "/b", ChangeKind::Deleted);

        let snap = tracker.stats();
        assert_eq!(snap.events_recorded, 2);
        assert_eq!(snap.events_merged, 1);
        assert_eq!(snap.events_cancelled, 1);
        assert_eq!(snap.live_records, 1);
        assert_eq!(snap.frozen_records, 0);
    }
}
