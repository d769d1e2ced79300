//! Unified front over both producer modes
//!
//! A target either exposes version/diff capability (any `VersionedLog`)
//! or it is a plain directory; the producer is selected once, at
//! construction, and both present the same batched record shape.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use libwake_core::types::change::ChangeBatch;
use libwake_core::{DEFAULT_MAX_BATCH, DEFAULT_SCOPE};
use libwake_log::VersionedLog;

use crate::error::WatchError;
use crate::local::LocalWatch;
use crate::stream::{ChangeStream, WatchHandle};

/// Construction options shared by both producer modes
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Key prefix to watch; defaults to the whole keyspace
    pub scope: String,
    /// Maximum records per batch
    pub max_batch: usize,
    /// Open/subscribe at construction rather than on the first pull
    pub eager: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            scope: DEFAULT_SCOPE.to_string(),
            max_batch: DEFAULT_MAX_BATCH,
            eager: true,
        }
    }
}

/// A change stream over either kind of target
pub enum Watcher {
    /// Versioned, diffable source
    Log(ChangeStream),
    /// Plain directory behind a filesystem watcher
    Local(LocalWatch),
}

impl Watcher {
    /// Watch a versioned log
    pub fn log(log: Arc<dyn VersionedLog>, options: WatchOptions) -> Self {
        Watcher::Log(ChangeStream::new(log, options))
    }

    /// Watch a plain directory
    pub fn local(root: impl Into<PathBuf>, options: WatchOptions) -> Result<Self, WatchError> {
        Ok(Watcher::Local(LocalWatch::new(root, options)?))
    }

    /// Handle for closing the watcher from another task
    pub fn handle(&self) -> WatchHandle {
        match self {
            Watcher::Log(stream) => stream.handle(),
            Watcher::Local(watch) => watch.handle(),
        }
    }
}

impl Stream for Watcher {
    type Item = Result<ChangeBatch, WatchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut() {
            Watcher::Log(stream) => Pin::new(stream).poll_next(cx),
            Watcher::Local(watch) => Pin::new(watch).poll_next(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = WatchOptions::default();
        assert_eq!(options.scope, "/");
        assert_eq!(options.max_batch, DEFAULT_MAX_BATCH);
        assert!(options.eager);
    }
}
