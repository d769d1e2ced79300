//! Versioned log seam for wake
//!
//! This crate provides:
//! - The `VersionedLog` trait: version, fork epoch, update, point-in-time
//!   diffing, and mutation notifications
//! - Diff entry and stream types shared by every log implementation
//! - `MemoryLog`, an in-memory reference log with truncate/fork semantics

pub mod diff;
pub mod error;
pub mod event;
pub mod memory;
pub mod source;

pub use diff::{DiffEntry, DiffOptions, DiffStream, Entry};
pub use error::LogError;
pub use event::LogEvent;
pub use memory::MemoryLog;
pub use source::VersionedLog;

/// Capacity of a log's notification bus
///
/// Streams drain stale notifications before each diff pass, so the bus
/// only has to absorb the burst between two passes.
pub const DEFAULT_BUS_CAPACITY: usize = 64;
