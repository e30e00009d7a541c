//! Path filtering for watch events.
//!
//! Filtering at the source reduces channel traffic and keeps paths the
//! operator never cares about (editor swap files, VCS metadata) out of the
//! tracker's capacity budget entirely.

use camino::Utf8Path;
use smallvec::SmallVec;

/// A predicate deciding which paths produce events.
///
/// Implementations are called from the blocking watcher thread for every
/// decoded path, so they must be [`Send`], [`Sync`], and `'static`, and
/// should be cheap.
pub trait PathFilter: Send + Sync + 'static {
    /// Returns `true` if events for `path` should be forwarded.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// A filter that accepts every path.
///
/// # Examples
///
/// ```
/// use dw_watcher::{AcceptAllFilter, PathFilter};
/// use camino::Utf8Path;
///
/// let filter = AcceptAllFilter;
/// assert!(filter.should_process(Utf8Path::new("anything.txt")));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl PathFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _path: &Utf8Path) -> bool {
        true
    }
}

/// A filter that drops paths containing any of the given substrings.
///
/// Patterns are plain substrings matched against the full path, which
/// covers the common cases (`.git`, `node_modules`, `~`) without pulling in
/// a glob engine.
///
/// # Examples
///
/// ```
/// use dw_watcher::{IgnorePatternFilter, PathFilter};
/// use camino::Utf8Path;
///
/// let filter = IgnorePatternFilter::new(&[".git", "node_modules"]);
/// assert!(!filter.should_process(Utf8Path::new("/repo/.git/index")));
/// assert!(filter.should_process(Utf8Path::new("/repo/src/main.rs")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct IgnorePatternFilter {
    patterns: SmallVec<[String; 4]>,
}

impl IgnorePatternFilter {
    /// Creates a filter from a list of substring patterns.
    #[must_use]
    pub fn new(patterns: &[&str]) -> Self {
        Self {
            patterns: patterns.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// Creates a filter from owned pattern strings.
    #[must_use]
    pub fn from_owned(patterns: Vec<String>) -> Self {
        Self {
            patterns: patterns.into_iter().collect(),
        }
    }

    /// Adds one more pattern.
    #[must_use]
    pub fn ignore(mut self, pattern: &str) -> Self {
        self.patterns.push(pattern.to_owned());
        self
    }
}

impl PathFilter for IgnorePatternFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        let path_str = path.as_str();
        !self.patterns.iter().any(|p| path_str.contains(p.as_str()))
    }
}

impl<F: PathFilter + ?Sized> PathFilter for Box<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}

impl<F: PathFilter + ?Sized> PathFilter for std::sync::Arc<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}
