//! Deterministic merge semantics for change records.
//!
//! This module is the semantic core of the tracker: for any sequence of
//! events observed for a single path, folding them through [`merge`]
//! left-to-right yields the *net* effect since the last delivered snapshot,
//! independent of how many intermediate events occurred.
//!
//! # Merge table
//!
//! | existing | incoming | result |
//! |----------|----------|--------|
//! | none     | any      | incoming |
//! | Created  | Modified | Created |
//! | Created  | Deleted  | record removed (created-then-deleted is invisible to a baseline that never saw it) |
//! | Modified | Modified | Modified |
//! | Modified | Deleted  | Deleted |
//! | Deleted  | Created  | Modified (recreation; content must be re-evaluated) |
//! | Deleted  | Modified | Modified (defensive, see below) |
//!
//! Transitions that a well-behaved watcher adapter should never produce
//! (`Deleted` followed by `Modified`, a second `Created` for a live path)
//! are normalized rather than treated as fatal; [`is_unexpected_transition`]
//! lets the recorder log them as a likely adapter decoding defect.

use dw_core::ChangeKind;

/// Result of merging an incoming event into an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The record stays, with the given net kind.
    Keep(ChangeKind),

    /// The record must be removed entirely (net no-op).
    Remove,
}

/// Merges an incoming change kind into the existing net kind for a path.
///
/// `existing` is `None` when the path has no record yet.
///
/// # Examples
///
/// ```
/// use dw_core::ChangeKind;
/// use dw_tracker::merge::{merge, MergeOutcome};
///
/// // Created then deleted cancels out
/// assert_eq!(
///     merge(Some(ChangeKind::Created), ChangeKind::Deleted),
///     MergeOutcome::Remove
/// );
///
/// // Deleted then created is a recreation
/// assert_eq!(
///     merge(Some(ChangeKind::Deleted), ChangeKind::Created),
///     MergeOutcome::Keep(ChangeKind::Modified)
/// );
/// ```
#[must_use]
pub const fn merge(existing: Option<ChangeKind>, incoming: ChangeKind) -> MergeOutcome {
    use ChangeKind::{Created, Deleted, Modified};

    let Some(existing) = existing else {
        return MergeOutcome::Keep(incoming);
    };

    match (existing, incoming) {
        (Created, Deleted) => MergeOutcome::Remove,
        (Created, Created | Modified) => MergeOutcome::Keep(Created),
        (Modified, Deleted) => MergeOutcome::Keep(Deleted),
        // A Created for a path we consider live is a re-assert; the content
        // still needs re-evaluation either way.
        (Modified, Created | Modified) => MergeOutcome::Keep(Modified),
        (Deleted, Created | Modified) => MergeOutcome::Keep(Modified),
        (Deleted, Deleted) => MergeOutcome::Keep(Deleted),
    }
}

/// Returns `true` for transitions a well-behaved watcher adapter should
/// never produce.
///
/// These are normalized by [`merge`] but indicate a probable decoding
/// defect upstream, so the recorder logs them at WARN.
#[must_use]
pub const fn is_unexpected_transition(existing: Option<ChangeKind>, incoming: ChangeKind) -> bool {
    use ChangeKind::{Created, Deleted, Modified};

    matches!(
        (existing, incoming),
        (Some(Deleted), Modified | Deleted) | (Some(Modified | Created), Created)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ChangeKind::{Created, Deleted, Modified};

    /// Folds a sequence of kinds through the merge table, starting from no
    /// record, returning the resulting net kind (or `None` if removed).
    fn fold(kinds: &[ChangeKind]) -> Option<ChangeKind> {
        let mut state: Option<ChangeKind> = None;
        for &kind in kinds {
            state = match merge(state, kind) {
                MergeOutcome::Keep(k) => Some(k),
                MergeOutcome::Remove => None,
            };
        }
        state
    }

    #[test]
    fn test_merge_into_empty() {
        assert_eq!(merge(None, Created), MergeOutcome::Keep(Created));
        assert_eq!(merge(None, Modified), MergeOutcome::Keep(Modified));
        assert_eq!(merge(None, Deleted), MergeOutcome::Keep(Deleted));
    }

    #[test]
    fn test_created_then_modified_stays_created() {
        assert_eq!(merge(Some(Created), Modified), MergeOutcome::Keep(Created));
    }

    #[test]
    fn test_created_then_deleted_removes() {
        assert_eq!(merge(Some(Created), Deleted), MergeOutcome::Remove);
    }

    #[test]
    fn test_modified_then_deleted_is_deleted() {
        assert_eq!(merge(Some(Modified), Deleted), MergeOutcome::Keep(Deleted));
    }

    #[test]
    fn test_deleted_then_created_is_recreation() {
        assert_eq!(merge(Some(Deleted), Created), MergeOutcome::Keep(Modified));
    }

    #[test]
    fn test_deleted_then_modified_is_defensive_modified() {
        assert_eq!(merge(Some(Deleted), Modified), MergeOutcome::Keep(Modified));
    }

    #[test]
    fn test_sequence_created_modified_deleted_vanishes() {
        assert_eq!(fold(&[Created, Modified, Deleted]), None);
    }

    #[test]
    fn test_sequence_deleted_created_is_modified() {
        assert_eq!(fold(&[Deleted, Created]), Some(Modified));
    }

    #[test]
    fn test_sequence_created_deleted_created() {
        // Created, gone, back again: still a brand-new file to the baseline.
        assert_eq!(fold(&[Created, Deleted, Created]), Some(Created));
    }

    #[test]
    fn test_sequence_modified_deleted_created() {
        // Existed at baseline, replaced: content must be re-evaluated.
        assert_eq!(fold(&[Modified, Deleted, Created]), Some(Modified));
    }

    #[test]
    fn test_long_modify_run_stays_modified() {
        assert_eq!(fold(&[Modified; 16]), Some(Modified));
    }

    #[test]
    fn test_unexpected_transitions() {
        assert!(is_unexpected_transition(Some(Deleted), Modified));
        assert!(is_unexpected_transition(Some(Deleted), Deleted));
        assert!(is_unexpected_transition(Some(Modified), Created));
        assert!(is_unexpected_transition(Some(Created), Created));

        assert!(!is_unexpected_transition(None, Created));
        assert!(!is_unexpected_transition(Some(Created), Deleted));
        assert!(!is_unexpected_transition(Some(Deleted), Created));
        assert!(!is_unexpected_transition(Some(Modified), Modified));
    }
}
