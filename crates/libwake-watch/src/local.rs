//! Filesystem watcher fallback
//!
//! `LocalWatch` adapts a plain directory to the change-record shape used
//! by versioned streams. Each raw watcher event becomes one batch with
//! zeroed provenance; there is no batching or cursor logic because the
//! watcher already delivers discrete events. Debouncing is the watcher
//! library's concern.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::Stream;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use libwake_core::key::{key_under_scope, normalize_scope};
use libwake_core::types::change::{ChangeBatch, ChangeKind, ChangeRecord};

use crate::error::WatchError;
use crate::stream::WatchHandle;
use crate::watch::WatchOptions;

/// Change stream over a plain directory
pub struct LocalWatch {
    root: PathBuf,
    target: PathBuf,
    prefix: String,
    watcher: Option<RecommendedWatcher>,
    tx: mpsc::UnboundedSender<notify::Result<Event>>,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    done: bool,
    cancel: CancellationToken,
    closing: BoxFuture<'static, ()>,
}

impl LocalWatch {
    /// Watch `root` joined with the scope, rewriting event paths into
    /// scope-prefixed keys
    pub fn new(root: impl Into<PathBuf>, options: WatchOptions) -> Result<Self, WatchError> {
        let root = root.into();
        let target = root.join(options.scope.trim_start_matches('/'));
        let prefix = normalize_scope(&options.scope);
        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let closing = Box::pin(cancel.clone().cancelled_owned());
        let mut watch = Self {
            root,
            target,
            prefix,
            watcher: None,
            tx,
            events,
            done: false,
            cancel,
            closing,
        };
        if options.eager {
            watch.start()?;
        }
        Ok(watch)
    }

    /// Handle for closing the watch from another task
    pub fn handle(&self) -> WatchHandle {
        WatchHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Install the underlying watcher; safe to call again once running
    fn start(&mut self) -> Result<(), WatchError> {
        if self.watcher.is_some() {
            return Ok(());
        }
        let tx = self.tx.clone();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            // watcher thread; the receiving side may be gone during teardown
            let _ = tx.send(event);
        })?;
        watcher.watch(&self.target, RecursiveMode::Recursive)?;
        debug!(path = %self.target.display(), "filesystem watch started");
        self.watcher = Some(watcher);
        Ok(())
    }

    /// Map one raw watcher event to change records; unrelated event kinds
    /// map to nothing
    fn map_event(&self, event: &Event) -> Vec<ChangeRecord> {
        let kind = match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => ChangeKind::Update,
            EventKind::Remove(_) => ChangeKind::Delete,
            _ => return Vec::new(),
        };
        event
            .paths
            .iter()
            .map(|path| ChangeRecord {
                kind,
                key: key_under_scope(&self.prefix, &self.root, path),
            })
            .collect()
    }

    fn shutdown(&mut self) {
        self.done = true;
        self.watcher = None;
        self.events.close();
        self.cancel.cancel();
        debug!("local watch closed");
    }
}

impl Stream for LocalWatch {
    type Item = Result<ChangeBatch, WatchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.closing.as_mut().poll(cx).is_ready() {
            this.shutdown();
            return Poll::Ready(None);
        }
        // deferred start happens on the first pull
        if this.watcher.is_none() {
            if let Err(err) = this.start() {
                this.shutdown();
                return Poll::Ready(Some(Err(err)));
            }
        }
        loop {
            match this.events.poll_recv(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    let records = this.map_event(&event);
                    if records.is_empty() {
                        continue;
                    }
                    trace!(len = records.len(), "watcher event mapped");
                    return Poll::Ready(Some(Ok(ChangeBatch::unversioned(records))));
                }
                Poll::Ready(Some(Err(err))) => {
                    this.shutdown();
                    return Poll::Ready(Some(Err(WatchError::Watcher(err))));
                }
                Poll::Ready(None) => {
                    this.shutdown();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for LocalWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn make_watch(scope: &str) -> LocalWatch {
        LocalWatch::new(
            "/srv/data",
            WatchOptions {
                scope: scope.to_string(),
                eager: false,
                ..WatchOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_map_create_and_modify_to_update() {
        let watch = make_watch("/");

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/srv/data/docs/a.txt"));
        assert_eq!(
            watch.map_event(&event),
            vec![ChangeRecord::update("/docs/a.txt")]
        );

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/srv/data/docs/a.txt"));
        assert_eq!(
            watch.map_event(&event),
            vec![ChangeRecord::update("/docs/a.txt")]
        );
    }

    #[test]
    fn test_map_remove_to_delete() {
        let watch = make_watch("/");
        let event = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/srv/data/old.txt"));
        assert_eq!(watch.map_event(&event), vec![ChangeRecord::delete("/old.txt")]);
    }

    #[test]
    fn test_map_access_to_nothing() {
        let watch = make_watch("/");
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/srv/data/a.txt"));
        assert!(watch.map_event(&event).is_empty());
    }

    #[test]
    fn test_scope_prefixes_keys() {
        let watch = make_watch("docs");
        assert_eq!(watch.target, PathBuf::from("/srv/data/docs"));

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/srv/data/docs/a.txt"));
        // the root is stripped, the normalized scope is kept in the key
        assert_eq!(
            watch.map_event(&event),
            vec![ChangeRecord::update("/docs/docs/a.txt")]
        );
    }

    #[test]
    fn test_lazy_watch_not_installed_until_polled() {
        let watch = make_watch("/");
        assert!(watch.watcher.is_none());
    }
}
