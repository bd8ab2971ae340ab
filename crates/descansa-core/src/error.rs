//! Error type for core tracker operations.

use thiserror::Error;

/// Errors returned by mutations of goals and sessions.
///
/// A failed operation leaves the in-memory state unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A numeric argument was outside its valid range.
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    /// The operation targets a session that does not exist.
    #[error("no completed sleep session")]
    NoSession,

    /// The session ran longer than 24 hours and was discarded.
    #[error("session lasted {minutes} minutes (more than 24h) and was discarded")]
    DurationOverflow { minutes: i64 },

    /// The session ended at (or before) the instant it started and was discarded.
    #[error("session has no duration and was discarded")]
    EmptySession,
}

impl CoreError {
    pub(crate) fn out_of_range(field: &'static str, value: impl Into<f64>) -> Self {
        Self::OutOfRange {
            field,
            value: value.into(),
        }
    }
}
