//! Diff entry and stream types
//!
//! A diff pass yields one entry per key that differs between a past
//! version and the current one. A left side means the key exists now
//! (insertion or update); a right side alone means it was deleted.

use futures::stream::BoxStream;

use crate::error::LogError;

/// One side of a diff entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    /// Version at which this side of the key was last touched
    pub seq: u64,
}

impl Entry {
    pub fn new(key: impl Into<String>, seq: u64) -> Self {
        Self {
            key: key.into(),
            seq,
        }
    }
}

/// A single changed key, as `{left, right}` sides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub left: Option<Entry>,
    pub right: Option<Entry>,
}

impl DiffEntry {
    /// Entry for a key that exists at the current version
    pub fn left(entry: Entry) -> Self {
        Self {
            left: Some(entry),
            right: None,
        }
    }

    /// Entry for a key that was deleted since the past version
    pub fn right(entry: Entry) -> Self {
        Self {
            left: None,
            right: Some(entry),
        }
    }
}

/// Options for a diff pass
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Whether the diff may advance the log to the latest version itself.
    /// Change streams always pass `false`: version advancement is the
    /// stream's responsibility, never the diff's.
    pub live_update: bool,
}

/// A lazy, cancelable sequence of diff entries
///
/// Errors surface in-band; dropping the stream cancels the pass and
/// releases whatever the implementation holds open for it.
pub type DiffStream = BoxStream<'static, Result<DiffEntry, LogError>>;
