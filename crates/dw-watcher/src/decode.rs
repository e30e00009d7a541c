//! Decoding of raw notify events into change kinds.
//!
//! The raw watcher is used without debouncing because the change kind must
//! survive decoding: the tracker's merge table distinguishes creations,
//! modifications, and deletions, and a debouncer would collapse them into
//! kind-less "something changed" notifications.
//!
//! # Mapping
//!
//! | notify event                     | decoded                          |
//! |----------------------------------|----------------------------------|
//! | `Create(_)`                      | `Created` per path               |
//! | `Remove(_)`                      | `Deleted` per path               |
//! | `Modify(Name(From))`             | `Deleted` (rename source)        |
//! | `Modify(Name(To))`               | `Created` (rename target)        |
//! | `Modify(Name(Both))`, two paths  | `Deleted` + `Created`            |
//! | `Modify(Name(_))`, ambiguous     | `Deleted` + `Created` per path   |
//! | `Modify(_)` otherwise            | `Modified` per path              |
//! | `Access(_)`                      | dropped                          |
//! | rescan flag set                  | [`Decoded::Lagged`]              |
//!
//! An ambiguous rename (the backend could not say which side of the rename
//! a path is) is reported as both a deletion and a creation of that path.
//! The merge table resolves the pair to a single `Modified` record, which
//! is the honest answer when the direction is unknown.

use camino::Utf8PathBuf;
use dw_core::{ChangeKind, PathEvent};
use notify::event::{EventKind, ModifyKind, RenameMode};
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::error::WatchError;

/// Result of decoding one notify event.
#[derive(Debug)]
pub enum Decoded {
    /// Zero or more kind-tagged path events.
    Changes(SmallVec<[PathEvent; 2]>),

    /// The OS event queue overflowed; observed changes can no longer be
    /// trusted and the tracker must reset.
    Lagged,
}

/// Decodes a raw notify event into kind-tagged path events.
///
/// Non-UTF-8 paths are logged and skipped; access events are dropped.
#[must_use]
pub fn decode(event: notify::Event) -> Decoded {
    if event.need_rescan() {
        warn!("watcher backend requested a rescan; event queue overflowed");
        return Decoded::Lagged;
    }

    let mut out: SmallVec<[PathEvent; 2]> = SmallVec::new();
    let kind = event.kind;
    let paths = utf8_paths(event);

    match kind {
        EventKind::Create(_) => {
            for path in paths {
                out.push(PathEvent::new(path, ChangeKind::Created));
            }
        }
        EventKind::Remove(_) => {
            for path in paths {
                out.push(PathEvent::new(path, ChangeKind::Deleted));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in paths {
                out.push(PathEvent::new(path, ChangeKind::Deleted));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in paths {
                out.push(PathEvent::new(path, ChangeKind::Created));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            let mut paths = paths.into_iter();
            if let Some(from) = paths.next() {
                out.push(PathEvent::new(from, ChangeKind::Deleted));
            }
            if let Some(to) = paths.next() {
                out.push(PathEvent::new(to, ChangeKind::Created));
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => {
            // Direction unknown: report both sides for every path
            warn!(?mode, count = paths.len(), "ambiguous rename event");
            for path in paths {
                out.push(PathEvent::new(path.clone(), ChangeKind::Deleted));
                out.push(PathEvent::new(path, ChangeKind::Created));
            }
        }
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
            for path in paths {
                out.push(PathEvent::new(path, ChangeKind::Modified));
            }
        }
        EventKind::Access(_) => {
            trace!("dropping access event");
        }
    }

    Decoded::Changes(out)
}

/// Extracts the event's paths as UTF-8.
///
/// A non-UTF-8 path becomes a recoverable [`WatchError::NonUtf8Path`]:
/// it is logged and the path is skipped, and the rest of the event's
/// paths are still decoded.
fn utf8_paths(event: notify::Event) -> SmallVec<[Utf8PathBuf; 2]> {
    event
        .paths
        .into_iter()
        .filter_map(|path| match Utf8PathBuf::try_from(path) {
            Ok(utf8) => Some(utf8),
            Err(convert_error) => {
                let watch_error = WatchError::non_utf8_path(convert_error.into_path_buf());
                warn!(error = %watch_error, "skipping path in filesystem event");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, Flag, RemoveKind};
    use notify::Event;
    use std::path::PathBuf;

    fn changes(decoded: Decoded) -> Vec<(String, ChangeKind)> {
        match decoded {
            Decoded::Changes(events) => events
                .into_iter()
                .map(|e| (e.path.into_string(), e.kind))
                .collect(),
            Decoded::Lagged => panic!("expected changes, got lagged"),
        }
    }

    #[test]
    fn test_create_decodes_to_created() {
        let event =
            Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/d/a.txt"));
        assert_eq!(
            changes(decode(event)),
            vec![("/d/a.txt".to_owned(), ChangeKind::Created)]
        );
    }

    #[test]
    fn test_remove_decodes_to_deleted() {
        let event =
            Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from("/d/a.txt"));
        assert_eq!(
            changes(decode(event)),
            vec![("/d/a.txt".to_owned(), ChangeKind::Deleted)]
        );
    }

    #[test]
    fn test_content_modify_decodes_to_modified() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/d/a.txt"));
        assert_eq!(
            changes(decode(event)),
            vec![("/d/a.txt".to_owned(), ChangeKind::Modified)]
        );
    }

    #[test]
    fn test_rename_from_and_to() {
        let from = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(PathBuf::from("/d/old.txt"));
        assert_eq!(
            changes(decode(from)),
            vec![("/d/old.txt".to_owned(), ChangeKind::Deleted)]
        );

        let to = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/d/new.txt"));
        assert_eq!(
            changes(decode(to)),
            vec![("/d/new.txt".to_owned(), ChangeKind::Created)]
        );
    }

    #[test]
    fn test_rename_both_splits_paths() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/d/old.txt"))
            .add_path(PathBuf::from("/d/new.txt"));
        assert_eq!(
            changes(decode(event)),
            vec![
                ("/d/old.txt".to_owned(), ChangeKind::Deleted),
                ("/d/new.txt".to_owned(), ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn test_ambiguous_rename_reports_both_sides() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)))
            .add_path(PathBuf::from("/d/a.txt"));
        assert_eq!(
            changes(decode(event)),
            vec![
                ("/d/a.txt".to_owned(), ChangeKind::Deleted),
                ("/d/a.txt".to_owned(), ChangeKind::Created),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_is_skipped() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let bad = PathBuf::from(OsString::from_vec(vec![b'/', b'd', b'/', 0xff]));
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(bad)
            .add_path(PathBuf::from("/d/ok.txt"));

        assert_eq!(
            changes(decode(event)),
            vec![("/d/ok.txt".to_owned(), ChangeKind::Created)]
        );
    }

    #[test]
    fn test_access_is_dropped() {
        let event = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/d/a.txt"));
        assert!(changes(decode(event)).is_empty());
    }

    #[test]
    fn test_rescan_flag_decodes_to_lagged() {
        let event = Event::new(EventKind::Any).set_flag(Flag::Rescan);
        assert!(matches!(decode(event), Decoded::Lagged));
    }
}
