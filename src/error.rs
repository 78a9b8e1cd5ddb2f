//! Error types for timeline operations.

use thiserror::Error;

use crate::element::Timestamp;

/// Errors returned by [`Timeline`](crate::Timeline) operations.
///
/// Every variant except `InvalidArgument` signals a producer/consumer logic
/// bug rather than a condition to retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    /// Zero capacity or stride, NaN timestamp, bad slot index, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Element kind does not match the kind the timeline was declared with.
    #[error("element kind mismatch: timeline holds {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// No entry recorded at this timestamp.
    #[error("no entry at timestamp {0}")]
    NotFound(Timestamp),

    /// Target timestamp of a re-key is already occupied.
    #[error("timestamp {0} is already occupied")]
    Conflict(Timestamp),
}

pub type Result<T> = std::result::Result<T, TimelineError>;
