//! Core types for wake
//!
//! This crate provides:
//! - Change records and the provenance-tagged batch envelope
//! - Source identifiers with hex helpers
//! - Scope and key normalization for path-prefixed keyspaces

pub mod key;
pub mod types;

pub use key::{key_under_scope, normalize_scope};
pub use types::change::{ChangeBatch, ChangeKind, ChangeRecord};
pub use types::ids::{generate_source_id, IdParseError, SourceId};

/// Maximum number of records in a single batch unless configured otherwise
pub const DEFAULT_MAX_BATCH: usize = 65536;

/// Scope used when none is given (the whole keyspace)
pub const DEFAULT_SCOPE: &str = "/";
