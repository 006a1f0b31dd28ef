//! Error types for LarchDB.

use thiserror::Error;

/// Result type alias using LarchError.
pub type Result<T> = std::result::Result<T, LarchError>;

/// Errors that can occur in LarchDB operations.
///
/// Only conditions that break the core's invariants (stable byte offsets,
/// stable node indices) are errors. A key miss or a tombstoned hit is a
/// normal query outcome and is never reported through this type.
#[derive(Debug, Error)]
pub enum LarchError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Arena errors
    #[error("reservation of {capacity} bytes of address space failed: {reason}")]
    ReserveFailed { capacity: usize, reason: String },

    #[error("commit to {requested} bytes failed with {committed} committed: {reason}")]
    CommitFailed {
        committed: usize,
        requested: usize,
        reason: String,
    },

    #[error("arena exhausted: {requested} bytes requested, {capacity} reserved")]
    ArenaExhausted { requested: usize, capacity: usize },

    // Index errors
    #[error("index full: all {capacity} node slots allocated")]
    IndexFull { capacity: usize },

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
