//! Watch error types
//!
//! Every failure is terminal for the stream that reports it; recovery
//! means constructing a new stream.

use thiserror::Error;

use libwake_log::LogError;

/// Errors surfaced by change streams and the filesystem fallback
#[derive(Debug, Error)]
pub enum WatchError {
    /// The opening `update()` call failed; nothing was produced
    #[error("open failed: {0}")]
    Open(#[source] LogError),

    /// A diff pass failed mid-iteration; any partial batch was discarded
    #[error("diff pass failed: {0}")]
    Diff(#[source] LogError),

    /// The underlying filesystem watcher reported an error
    #[error("filesystem watcher error: {0}")]
    Watcher(#[from] notify::Error),
}
