//! The versioned log trait

use async_trait::async_trait;
use tokio::sync::broadcast;

use libwake_core::types::ids::SourceId;

use crate::diff::{DiffOptions, DiffStream};
use crate::error::LogError;
use crate::event::LogEvent;

/// A version-numbered, diffable data source
///
/// Implementations must advance `version` *before* emitting the matching
/// `LogEvent`: a listener that reads the version after receiving a
/// notification must never observe a stale value. The notification bus is
/// shared; every subscriber gets an independent receiver.
#[async_trait]
pub trait VersionedLog: Send + Sync {
    /// Stable identity of this source
    fn id(&self) -> SourceId;

    /// Current version (number of mutations applied)
    fn version(&self) -> u64;

    /// Fork epoch; increments whenever history is rewritten rather than
    /// extended
    fn fork(&self) -> u64;

    /// Advance to the latest known version
    ///
    /// For local logs this is a no-op; replicated implementations fetch
    /// here. Change streams call it exactly once, at open.
    async fn update(&self) -> Result<(), LogError>;

    /// Diff the given scope from `from` up to the current version
    ///
    /// Yields one entry per changed key, in the implementation's stable
    /// order. The pass is cancelled by dropping the stream.
    fn diff(&self, from: u64, scope: &str, opts: DiffOptions) -> DiffStream;

    /// Subscribe to mutation notifications
    fn subscribe(&self) -> broadcast::Receiver<LogEvent>;
}
