//! Change records and the batch envelope pushed to consumers

use serde::{Deserialize, Serialize};

use crate::types::ids::SourceId;

/// What happened to a key between two versions of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Key was inserted or its value replaced
    Update,
    /// Key was removed
    Delete,
}

impl ChangeKind {
    /// Get the kind as a string (matches the serialized form)
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// One entry that differs between two versions of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub key: String,
}

impl ChangeRecord {
    pub fn update(key: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Update,
            key: key.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            key: key.into(),
        }
    }
}

/// An ordered group of change records plus provenance
///
/// `length` is the source version the batch was produced up to; `fork`
/// counts history rewrites. Versioned producers never emit an empty batch
/// and never exceed their configured maximum size; records keep the order
/// the underlying diff yielded them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub source: SourceId,
    pub length: u64,
    pub fork: u64,
    pub records: Vec<ChangeRecord>,
}

impl ChangeBatch {
    /// Batch with full provenance, as produced from a versioned source
    pub fn new(source: SourceId, length: u64, fork: u64, records: Vec<ChangeRecord>) -> Self {
        Self {
            source,
            length,
            fork,
            records,
        }
    }

    /// Batch with zeroed provenance, as produced by the filesystem fallback
    pub fn unversioned(records: Vec<ChangeRecord>) -> Self {
        Self {
            source: [0u8; 32],
            length: 0,
            fork: 0,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
