//! Pull-based change streams for wake
//!
//! This crate provides:
//! - `ChangeStream`: batched diffs over any `VersionedLog`, driven
//!   entirely by consumer pulls
//! - `LocalWatch`: the filesystem fallback producing the same record shape
//! - `Watcher`: the mode-selected front over both
//! - `WatchHandle`: close a stream from another task, resolving a parked
//!   pull as a clean end-of-stream

pub mod error;
pub mod local;
pub mod stream;
pub mod watch;

pub use error::WatchError;
pub use local::LocalWatch;
pub use stream::{ChangeStream, WatchHandle};
pub use watch::{WatchOptions, Watcher};
