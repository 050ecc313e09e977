//! Error type for index construction and access

use thiserror::Error;

/// Errors raised while building, transferring or reading a sketch index
///
/// Errors are `Clone` because a failed construction is remembered by the
/// index and handed back to every later caller of `wait_until_ready()` or of
/// an accessor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// An accessor was called before construction finished
    #[error("index is not ready: construction is still in progress")]
    NotReady,

    /// The working-memory allocator could not satisfy a request
    #[error("resource exhausted: requested {requested} bytes, {available} bytes available")]
    ResourceExhausted {
        /// Bytes requested
        requested: usize,
        /// Bytes still available in the pool
        available: usize,
    },

    /// Construction parameters were rejected
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A read contains a byte that is not A/C/G/T
    #[error("invalid base {base:?} in read {read_id} at position {position}")]
    InvalidBase {
        /// Read containing the base
        read_id: u32,
        /// Position of the base within the read
        position: usize,
        /// Offending byte, as a char
        base: char,
    },

    /// A descriptor names reads the sequence source does not have
    #[error("read {read_id} is out of range: source holds {number_of_reads} reads")]
    ReadOutOfRange {
        /// Requested read id
        read_id: u32,
        /// Reads available in the source
        number_of_reads: u32,
    },

    /// The sketch-generation strategy reported a failure
    #[error("sketch generation failed: {0}")]
    Generation(String),

    /// A queued job panicked or its queue was shut down
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The six arrays violate an ordering or consistency invariant
    #[error("inconsistent index arrays: {0}")]
    InconsistentArrays(String),

    /// A host snapshot's arrays are inconsistent with its metadata
    #[error("snapshot mismatch: {0}")]
    SnapshotMismatch(String),
}

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Create an invalid configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create an inconsistent arrays error
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentArrays(message.into())
    }

    /// Create a snapshot mismatch error
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::SnapshotMismatch(message.into())
    }
}
