//! Suppression of the scanner's own filesystem writes.
//!
//! This is the primary feedback-loop breaker: when the scanner acts on a
//! reported change by writing files itself (quarantine copies, annotation
//! sidecars), those writes would otherwise re-enter the change set and be
//! reported right back, which can cycle indefinitely when each processed
//! change produces one or more new files. The scanner pre-declares its
//! writes through [`SelfChangeFilter::register`] and matching events are
//! dropped before they reach the recorder.
//!
//! Entries expire by TTL, are pruned opportunistically during lookup, and
//! are swept periodically. The registry is scanner-controlled and expected
//! to be small, but it is capped with oldest-first eviction anyway.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use tracing::{debug, trace};

/// A registered suppression: any path equal to or under `prefix` is dropped
/// until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SelfChangeEntry {
    /// Path prefix (component-wise) the suppression covers.
    prefix: Utf8PathBuf,

    /// When the suppression lapses.
    expires_at: Instant,
}

/// Registry of (path-prefix, expiry) suppressions populated by the scanner.
///
/// Thread safe behind its own small mutex; lookups never touch the
/// recorder's critical section.
///
/// # Examples
///
/// ```
/// use dw_tracker::SelfChangeFilter;
/// use camino::{Utf8Path, Utf8PathBuf};
/// use std::time::{Duration, Instant};
///
/// let filter = SelfChangeFilter::new(Duration::from_secs(5), 64);
/// let now = Instant::now();
/// filter.register(Utf8PathBuf::from("/tmp/work"), None, now);
///
/// assert!(filter.should_drop(Utf8Path::new("/tmp/work/a.txt"), now));
/// assert!(!filter.should_drop(Utf8Path::new("/tmp/other.txt"), now));
/// ```
#[derive(Debug)]
pub struct SelfChangeFilter {
    /// Entries in registration order (oldest first, for eviction).
    entries: Mutex<VecDeque<SelfChangeEntry>>,

    /// TTL applied when a registration carries none.
    default_ttl: Duration,

    /// Hard cap on live entries.
    max_entries: usize,
}

impl SelfChangeFilter {
    /// Creates an empty filter.
    ///
    /// # Arguments
    ///
    /// * `default_ttl` - TTL used when `register` is called without one
    /// * `max_entries` - cap on live entries; oldest evicted beyond it
    #[must_use]
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            default_ttl,
            max_entries,
        }
    }

    /// Adds or refreshes a suppression for `prefix`.
    ///
    /// Re-registering an existing prefix replaces its expiry (refresh).
    /// When the cap is reached the oldest entry is evicted.
    pub fn register(&self, prefix: Utf8PathBuf, ttl: Option<Duration>, now: Instant) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = now + ttl;

        let mut entries = self.entries.lock();
        entries.retain(|e| e.prefix != prefix);
        entries.push_back(SelfChangeEntry { prefix, expires_at });

        while entries.len() > self.max_entries {
            if let Some(evicted) = entries.pop_front() {
                debug!(prefix = %evicted.prefix, "evicted oldest self-change entry");
            }
        }
    }

    /// Returns `true` if `path` matches a non-expired suppression.
    ///
    /// Matches are exact or component-wise prefix (`/tmp/work` covers
    /// `/tmp/work/a.txt` but not `/tmp/work2`). Expired entries found
    /// during the scan are removed.
    #[must_use]
    pub fn should_drop(&self, path: &Utf8Path, now: Instant) -> bool {
        let mut entries = self.entries.lock();
        entries.retain(|e| e.expires_at > now);

        let hit = entries.iter().any(|e| path.starts_with(&e.prefix));
        if hit {
            trace!(path = %path, "suppressed self-change event");
        }
        hit
    }

    /// Removes expired entries; returns how many were removed.
    ///
    /// Intended to run on an independent timer so an idle registry does
    /// not hold memory until the next lookup.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.expires_at > now);
        before - entries.len()
    }

    /// Number of live entries (including any not yet swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no suppressions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> SelfChangeFilter {
        SelfChangeFilter::new(Duration::from_secs(5), 4)
    }

    #[test]
    fn test_exact_match_is_dropped() {
        let f = filter();
        let now = Instant::now();
        f.register(Utf8PathBuf::from("/tmp/work/a.txt"), None, now);
        assert!(f.should_drop(Utf8Path::new("/tmp/work/a.txt"), now));
    }

    #[test]
    fn test_prefix_match_covers_subtree() {
        let f = filter();
        let now = Instant::now();
        f.register(Utf8PathBuf::from("/tmp/work"), None, now);

        assert!(f.should_drop(Utf8Path::new("/tmp/work/a.txt"), now));
        assert!(f.should_drop(Utf8Path::new("/tmp/work/sub/b.txt"), now));
        // Component-wise: a sibling with a shared string prefix is not covered
        assert!(!f.should_drop(Utf8Path::new("/tmp/work2/c.txt"), now));
    }

    #[test]
    fn test_entry_expires() {
        let f = filter();
        let now = Instant::now();
        f.register(
            Utf8PathBuf::from("/tmp/work"),
            Some(Duration::from_secs(5)),
            now,
        );

        assert!(f.should_drop(Utf8Path::new("/tmp/work/a.txt"), now + Duration::from_secs(1)));
        assert!(!f.should_drop(Utf8Path::new("/tmp/work/a.txt"), now + Duration::from_secs(10)));
    }

    #[test]
    fn test_reregister_refreshes_expiry() {
        let f = filter();
        let now = Instant::now();
        f.register(
            Utf8PathBuf::from("/tmp/work"),
            Some(Duration::from_secs(2)),
            now,
        );
        f.register(
            Utf8PathBuf::from("/tmp/work"),
            Some(Duration::from_secs(30)),
            now + Duration::from_secs(1),
        );

        assert_eq!(f.len(), 1);
        assert!(f.should_drop(Utf8Path::new("/tmp/work/a.txt"), now + Duration::from_secs(10)));
    }

    #[test]
    fn test_oldest_first_eviction_at_cap() {
        let f = filter(); // cap of 4
        let now = Instant::now();
        for i in 0..5 {
            f.register(Utf8PathBuf::from(format!("/dir{i}")), None, now);
        }

        assert_eq!(f.len(), 4);
        assert!(!f.should_drop(Utf8Path::new("/dir0/x"), now));
        assert!(f.should_drop(Utf8Path::new("/dir4/x"), now));
    }

    #[test]
    fn test_sweep_removes_expired() {
        let f = filter();
        let now = Instant::now();
        f.register(
            Utf8PathBuf::from("/a"),
            Some(Duration::from_secs(1)),
            now,
        );
        f.register(
            Utf8PathBuf::from("/b"),
            Some(Duration::from_secs(60)),
            now,
        );

        let removed = f.sweep(now + Duration::from_secs(30));
        assert_eq!(removed, 1);
        assert_eq!(f.len(), 1);
        assert!(f.should_drop(Utf8Path::new("/b/x"), now + Duration::from_secs(30)));
    }

    #[test]
    fn test_lookup_prunes_expired() {
        let f = filter();
        let now = Instant::now();
        f.register(
            Utf8PathBuf::from("/a"),
            Some(Duration::from_secs(1)),
            now,
        );

        // Lookup past expiry removes the entry as a side effect
        assert!(!f.should_drop(Utf8Path::new("/a/x"), now + Duration::from_secs(5)));
        assert!(f.is_empty());
    }
}
