//! Error types for the dw-tracker crate.
//!
//! This module provides the [`ProtocolError`] type for snapshot/query
//! protocol misuse. None of these errors is fatal to the agent process:
//! `Busy` asks the caller to retry later, while `InvalidCursor` and
//! `InvalidState` indicate a protocol-usage bug in the consumer and are
//! surfaced, not retried internally. Capacity exhaustion is deliberately
//! *not* an error; it is reported as `overflow = true` in a delivered page.

use dw_core::GenerationId;

/// Errors returned by the snapshot/query protocol.
///
/// # Examples
///
/// ```
/// use dw_tracker::ProtocolError;
///
/// assert!(ProtocolError::Busy.is_retryable());
/// assert!(!ProtocolError::InvalidCursor.is_retryable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A generation is already open for paging.
    ///
    /// The single-pager design admits exactly one reader at a time; retry
    /// after the current generation is committed or abandoned.
    #[error("a snapshot generation is already open for paging")]
    Busy,

    /// The cursor does not belong to the active generation.
    ///
    /// The generation it referenced was committed, abandoned, or cleared
    /// by an overflow reset.
    #[error("cursor does not belong to the active generation")]
    InvalidCursor,

    /// The generation is not in a state that permits the operation.
    ///
    /// Raised by `commit` for an unknown or already-committed generation,
    /// or one whose final page has not been read yet.
    #[error("generation {0} is not in a committable state")]
    InvalidState(GenerationId),
}

impl ProtocolError {
    /// Returns `true` if the caller should simply retry later.
    ///
    /// Only [`Busy`](Self::Busy) qualifies; the other variants indicate a
    /// protocol-usage bug that retrying cannot fix.
    #[inline]
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_is_retryable() {
        assert!(ProtocolError::Busy.is_retryable());
        assert!(!ProtocolError::InvalidCursor.is_retryable());
        assert!(!ProtocolError::InvalidState(GenerationId::new(3)).is_retryable());
    }

    #[test]
    fn test_display_messages() {
        assert!(ProtocolError::Busy.to_string().contains("already open"));
        assert!(ProtocolError::InvalidCursor
            .to_string()
            .contains("active generation"));
        assert!(ProtocolError::InvalidState(GenerationId::new(7))
            .to_string()
            .contains('7'));
    }
}
