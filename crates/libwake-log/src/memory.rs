//! In-memory reference log
//!
//! `MemoryLog` keeps every mutation in an append-only history and projects
//! it into a per-key map carrying the last-touched seq. The version is the
//! history length; truncating rewinds the history, replays the projection
//! and bumps the fork epoch.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::broadcast;

use libwake_core::types::ids::{generate_source_id, SourceId};

use crate::diff::{DiffEntry, DiffOptions, DiffStream, Entry};
use crate::error::LogError;
use crate::event::LogEvent;
use crate::source::VersionedLog;
use crate::DEFAULT_BUS_CAPACITY;

/// One recorded mutation; seq is its 1-based position in the history
#[derive(Debug, Clone)]
enum Mutation {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// Latest state of a key: the seq that last touched it, and its value
/// (`None` marks a tombstone)
#[derive(Debug, Clone)]
struct KeyState {
    seq: u64,
    value: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct LogState {
    fork: u64,
    history: Vec<Mutation>,
    keys: BTreeMap<String, KeyState>,
}

/// An in-memory versioned keyed log
pub struct MemoryLog {
    id: SourceId,
    state: Mutex<LogState>,
    events: broadcast::Sender<LogEvent>,
}

impl MemoryLog {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(DEFAULT_BUS_CAPACITY);
        Self {
            id: generate_source_id(),
            state: Mutex::new(LogState::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a key, advancing the version by one
    pub fn put(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        {
            let mut state = self.lock();
            state.history.push(Mutation::Put {
                key: key.clone(),
                value: value.clone(),
            });
            let seq = state.history.len() as u64;
            state.keys.insert(
                key,
                KeyState {
                    seq,
                    value: Some(value),
                },
            );
        }
        // version is already advanced by the time the wakeup lands
        let _ = self.events.send(LogEvent::Append);
    }

    /// Record a deletion for a key, advancing the version by one
    pub fn delete(&self, key: impl Into<String>) {
        let key = key.into();
        {
            let mut state = self.lock();
            state.history.push(Mutation::Delete { key: key.clone() });
            let seq = state.history.len() as u64;
            state.keys.insert(key, KeyState { seq, value: None });
        }
        let _ = self.events.send(LogEvent::Append);
    }

    /// Current value of a key, if it exists
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().keys.get(key).and_then(|state| state.value.clone())
    }

    /// Rewind history to `len` mutations, rewriting it
    ///
    /// The projection is rebuilt by replay and the fork epoch advances.
    pub fn truncate(&self, len: u64) -> Result<(), LogError> {
        {
            let mut state = self.lock();
            let version = state.history.len() as u64;
            if len > version {
                return Err(LogError::TruncatePastEnd {
                    requested: len,
                    version,
                });
            }
            state.history.truncate(len as usize);
            state.fork += 1;
            state.keys = replay(&state.history);
        }
        let _ = self.events.send(LogEvent::Truncate);
        Ok(())
    }

    /// Number of mutations in the history (same as the version)
    pub fn len(&self) -> u64 {
        self.lock().history.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live notification receivers
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionedLog for MemoryLog {
    fn id(&self) -> SourceId {
        self.id
    }

    fn version(&self) -> u64 {
        self.lock().history.len() as u64
    }

    fn fork(&self) -> u64 {
        self.lock().fork
    }

    async fn update(&self) -> Result<(), LogError> {
        // a local log is always at its latest version
        Ok(())
    }

    fn diff(&self, from: u64, scope: &str, _opts: DiffOptions) -> DiffStream {
        let state = self.lock();
        let entries: Vec<Result<DiffEntry, LogError>> = state
            .keys
            .iter()
            .filter(|(key, key_state)| key_state.seq > from && key.starts_with(scope))
            .map(|(key, key_state)| {
                let entry = Entry::new(key.clone(), key_state.seq);
                if key_state.value.is_some() {
                    Ok(DiffEntry::left(entry))
                } else {
                    Ok(DiffEntry::right(entry))
                }
            })
            .collect();
        drop(state);
        Box::pin(stream::iter(entries))
    }

    fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.events.subscribe()
    }
}

/// Rebuild the key projection from a mutation history
fn replay(history: &[Mutation]) -> BTreeMap<String, KeyState> {
    let mut keys = BTreeMap::new();
    for (index, mutation) in history.iter().enumerate() {
        let seq = (index + 1) as u64;
        match mutation {
            Mutation::Put { key, value } => {
                keys.insert(
                    key.clone(),
                    KeyState {
                        seq,
                        value: Some(value.clone()),
                    },
                );
            }
            Mutation::Delete { key } => {
                keys.insert(key.clone(), KeyState { seq, value: None });
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect_diff(log: &MemoryLog, from: u64, scope: &str) -> Vec<DiffEntry> {
        log.diff(from, scope, DiffOptions::default())
            .map(|entry| entry.unwrap())
            .collect()
            .await
    }

    #[test]
    fn test_put_get_delete() {
        let log = MemoryLog::new();
        assert!(log.is_empty());

        log.put("/a", b"one".to_vec());
        assert_eq!(log.version(), 1);
        assert_eq!(log.get("/a"), Some(b"one".to_vec()));

        log.put("/a", b"two".to_vec());
        assert_eq!(log.version(), 2);
        assert_eq!(log.get("/a"), Some(b"two".to_vec()));

        log.delete("/a");
        assert_eq!(log.version(), 3);
        assert_eq!(log.get("/a"), None);
    }

    #[tokio::test]
    async fn test_diff_since_version() {
        let log = MemoryLog::new();
        log.put("/a", b"1".to_vec());
        log.put("/b", b"2".to_vec());
        let mark = log.version();
        log.put("/c", b"3".to_vec());
        log.delete("/a");

        let entries = collect_diff(&log, mark, "/").await;
        assert_eq!(entries.len(), 2);

        // key order: /a tombstone first, then /c
        assert!(entries[0].left.is_none());
        assert_eq!(entries[0].right.as_ref().unwrap().key, "/a");
        assert_eq!(entries[1].left.as_ref().unwrap().key, "/c");
        assert!(entries[1].right.is_none());
    }

    #[tokio::test]
    async fn test_diff_scope_filter() {
        let log = MemoryLog::new();
        log.put("/docs/a", b"1".to_vec());
        log.put("/img/b", b"2".to_vec());
        log.put("/docs/c", b"3".to_vec());

        let entries = collect_diff(&log, 0, "/docs/").await;
        let keys: Vec<&str> = entries
            .iter()
            .map(|entry| entry.left.as_ref().unwrap().key.as_str())
            .collect();
        assert_eq!(keys, ["/docs/a", "/docs/c"]);
    }

    #[tokio::test]
    async fn test_diff_empty_when_current() {
        let log = MemoryLog::new();
        log.put("/a", b"1".to_vec());
        let entries = collect_diff(&log, log.version(), "/").await;
        assert!(entries.is_empty());
    }

    #[test]
    fn test_truncate_replays_projection() {
        let log = MemoryLog::new();
        log.put("/a", b"one".to_vec());
        log.put("/b", b"2".to_vec());
        log.put("/a", b"two".to_vec());

        log.truncate(1).unwrap();
        assert_eq!(log.version(), 1);
        assert_eq!(log.fork(), 1);
        assert_eq!(log.get("/a"), Some(b"one".to_vec()));
        assert_eq!(log.get("/b"), None);
    }

    #[test]
    fn test_truncate_past_end() {
        let log = MemoryLog::new();
        log.put("/a", b"1".to_vec());
        let result = log.truncate(5);
        assert!(matches!(
            result,
            Err(LogError::TruncatePastEnd {
                requested: 5,
                version: 1
            })
        ));
        assert_eq!(log.fork(), 0);
    }

    #[tokio::test]
    async fn test_notifications_follow_mutations() {
        let log = MemoryLog::new();
        let mut rx = log.subscribe();

        log.put("/a", b"1".to_vec());
        assert_eq!(rx.recv().await.unwrap(), LogEvent::Append);

        log.truncate(0).unwrap();
        assert_eq!(rx.recv().await.unwrap(), LogEvent::Truncate);
    }

    #[test]
    fn test_notifications_dropped_without_subscribers() {
        let log = MemoryLog::new();
        assert_eq!(log.subscriber_count(), 0);
        // must not panic or error with nobody listening
        log.put("/a", b"1".to_vec());
        log.delete("/a");
    }
}
