//! Error type shared by every fallible engine operation.

use thiserror::Error;

/// Errors reported by the document engine.
///
/// Offsets are never clamped: a bad offset is reported as [`EngineError::OutOfRange`] so that
/// the undo log never records a range that differs from what the caller asked for.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An index/length pair does not fit inside the addressed sequence.
    #[error("range {index}+{length} is out of bounds (len {len})")]
    OutOfRange {
        /// Requested start index.
        index: usize,
        /// Requested length.
        length: usize,
        /// Length of the addressed sequence.
        len: usize,
    },

    /// A required argument was empty or otherwise unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The call is not valid in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// The text store is locked by an in-flight load or save.
    #[error("text store is busy with an asynchronous operation")]
    Busy,

    /// A load or save was cancelled between chunks.
    #[error("operation cancelled")]
    Cancelled,

    /// The reader/writer passed to load/save failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The search pattern failed to compile.
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

impl EngineError {
    /// Returns `true` for [`EngineError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Checks that `index..index + length` lies within `0..len`.
pub(crate) fn check_range(index: usize, length: usize, len: usize) -> Result<()> {
    match index.checked_add(length) {
        Some(end) if end <= len => Ok(()),
        _ => Err(EngineError::OutOfRange { index, length, len }),
    }
}
