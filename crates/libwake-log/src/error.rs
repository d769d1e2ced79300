//! Log error types

use thiserror::Error;

/// Errors surfaced by versioned log implementations
#[derive(Debug, Error)]
pub enum LogError {
    /// The log is closed or its backing source is gone
    #[error("log is closed")]
    Closed,

    /// Truncation target is beyond the current version
    #[error("truncate past end of log: requested {requested}, version {version}")]
    TruncatePastEnd { requested: u64, version: u64 },

    /// IO error from a storage-backed implementation
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else an implementation needs to report
    #[error("internal error: {0}")]
    Internal(String),
}
