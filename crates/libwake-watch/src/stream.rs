//! The change stream state machine
//!
//! A `ChangeStream` turns a `VersionedLog` into a pull-based sequence of
//! batched change records. Each consumer poll is a pull: it either
//! continues the diff pass already in flight, starts a fresh pass from the
//! cursor, or parks until the log signals a mutation. Exactly one pass is
//! active at a time, and batches are emitted in diff order, never larger
//! than the configured bound.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use libwake_core::types::change::{ChangeBatch, ChangeRecord};
use libwake_log::{DiffEntry, DiffOptions, DiffStream, LogError, LogEvent, VersionedLog};

use crate::error::WatchError;
use crate::watch::WatchOptions;

/// Outcome of a park: the event that ended it, plus the receiver handed
/// back so the next pass can keep draining the same subscription
type Wakeup = BoxFuture<'static, (Result<LogEvent, RecvError>, broadcast::Receiver<LogEvent>)>;

enum State {
    /// Construction finished but nothing armed yet (lazy open)
    Unopened,
    /// Fast-forwarding the log before the first pass
    Opening(BoxFuture<'static, Result<(), LogError>>),
    /// Between passes; the next poll starts one
    Idle,
    /// Iterating a diff pass
    Reading {
        diff: DiffStream,
        batch: Vec<ChangeRecord>,
        pushed: bool,
        upto: u64,
        fork: u64,
    },
    /// Parked until the log signals a mutation
    Waiting(Wakeup),
    /// Torn down; every further poll returns end-of-stream
    Closed,
}

/// Pull-based stream of change batches over a versioned log
pub struct ChangeStream {
    log: Arc<dyn VersionedLog>,
    scope: String,
    max_batch: usize,
    /// Last version fully handed to a diff pass; advanced once per pass,
    /// before the pass is iterated
    previous: u64,
    state: State,
    events: Option<broadcast::Receiver<LogEvent>>,
    cancel: CancellationToken,
    closing: BoxFuture<'static, ()>,
}

impl ChangeStream {
    /// Open a change stream over `log`
    ///
    /// With `options.eager` set the notification subscription is taken
    /// immediately; otherwise both the subscription and the opening
    /// `update()` wait for the first poll.
    pub fn new(log: Arc<dyn VersionedLog>, options: WatchOptions) -> Self {
        let cancel = CancellationToken::new();
        let closing = Box::pin(cancel.clone().cancelled_owned());
        let mut stream = Self {
            log,
            scope: options.scope,
            max_batch: options.max_batch,
            previous: 0,
            state: State::Unopened,
            events: None,
            cancel,
            closing,
        };
        if options.eager {
            stream.open();
        }
        stream
    }

    /// Handle for closing the stream from another task
    pub fn handle(&self) -> WatchHandle {
        WatchHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Last version a diff pass was started from or advanced to
    pub fn cursor(&self) -> u64 {
        self.previous
    }

    fn open(&mut self) {
        self.events = Some(self.log.subscribe());
        let log = Arc::clone(&self.log);
        self.state = State::Opening(Box::pin(async move { log.update().await }));
    }

    /// Start a diff pass from the cursor
    fn begin_pass(&mut self) {
        // Anything already queued announces a version at or below the one
        // read here, so it must not wake the next park.
        if let Some(rx) = self.events.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
        }

        let from = self.previous;
        let upto = self.log.version();
        let fork = self.log.fork();
        // Advance before iterating: a mutation landing mid-pass belongs to
        // the next pass, not this one.
        self.previous = upto;
        let diff = self
            .log
            .diff(from, &self.scope, DiffOptions { live_update: false });
        trace!(from, upto, "diff pass started");
        self.state = State::Reading {
            diff,
            batch: Vec::new(),
            pushed: false,
            upto,
            fork,
        };
    }

    /// Park until the log signals a mutation
    fn park(&mut self) {
        match self.events.take() {
            Some(mut rx) => {
                trace!("nothing since cursor, parking until next mutation");
                self.state = State::Waiting(Box::pin(async move {
                    let event = rx.recv().await;
                    (event, rx)
                }));
            }
            None => self.shutdown(),
        }
    }

    /// Tear down: cancel the in-flight diff, detach from the notification
    /// bus, close the token. Safe to call more than once.
    fn shutdown(&mut self) {
        self.state = State::Closed;
        self.events = None;
        self.cancel.cancel();
        debug!("change stream closed");
    }
}

impl Stream for ChangeStream {
    type Item = Result<ChangeBatch, WatchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if matches!(this.state, State::Closed) {
                return Poll::Ready(None);
            }
            // A close from a handle must wake a parked or mid-diff stream,
            // so the token is polled ahead of every state.
            if this.closing.as_mut().poll(cx).is_ready() {
                this.shutdown();
                return Poll::Ready(None);
            }

            match &mut this.state {
                State::Closed => return Poll::Ready(None),
                State::Unopened => this.open(),
                State::Opening(update) => match update.as_mut().poll(cx) {
                    Poll::Ready(Ok(())) => {
                        this.previous = this.log.version();
                        debug!(version = this.previous, "change stream open");
                        this.state = State::Idle;
                    }
                    Poll::Ready(Err(err)) => {
                        this.shutdown();
                        return Poll::Ready(Some(Err(WatchError::Open(err))));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Idle => this.begin_pass(),
                State::Reading {
                    diff,
                    batch,
                    pushed,
                    upto,
                    fork,
                } => match diff.as_mut().poll_next(cx) {
                    Poll::Ready(Some(Ok(entry))) => {
                        if let Some(record) = translate(entry) {
                            batch.push(record);
                            if batch.len() >= this.max_batch {
                                *pushed = true;
                                let records = mem::take(batch);
                                trace!(len = records.len(), "batch sealed at size bound");
                                let sealed =
                                    ChangeBatch::new(this.log.id(), *upto, *fork, records);
                                return Poll::Ready(Some(Ok(sealed)));
                            }
                        }
                    }
                    Poll::Ready(Some(Err(err))) => {
                        // the partially accumulated batch dies with the pass
                        this.shutdown();
                        return Poll::Ready(Some(Err(WatchError::Diff(err))));
                    }
                    Poll::Ready(None) => {
                        if !batch.is_empty() {
                            let records = mem::take(batch);
                            trace!(len = records.len(), upto = *upto, "pass complete");
                            let sealed = ChangeBatch::new(this.log.id(), *upto, *fork, records);
                            this.state = State::Idle;
                            return Poll::Ready(Some(Ok(sealed)));
                        } else if *pushed {
                            // pass drained exactly at a batch boundary; the
                            // caller is now asking for the next pass
                            this.state = State::Idle;
                        } else {
                            this.park();
                        }
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Waiting(wakeup) => match wakeup.as_mut().poll(cx) {
                    Poll::Ready((Ok(event), rx)) => {
                        trace!(kind = event.kind(), "mutation wakeup");
                        this.events = Some(rx);
                        this.state = State::Idle;
                    }
                    Poll::Ready((Err(RecvError::Lagged(missed)), rx)) => {
                        // missed notifications still mean something changed
                        trace!(missed, "notification bus lagged, re-reading");
                        this.events = Some(rx);
                        this.state = State::Idle;
                    }
                    Poll::Ready((Err(RecvError::Closed), _)) => {
                        // the source is gone; nothing further to pull
                        this.shutdown();
                        return Poll::Ready(None);
                    }
                    Poll::Pending => return Poll::Pending,
                },
            }
        }
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Translate one diff entry into a change record
///
/// A present left side is an insertion or update; a right side alone is a
/// deletion. An entry with neither side cannot come from a conforming log
/// and is skipped.
fn translate(entry: DiffEntry) -> Option<ChangeRecord> {
    match (entry.left, entry.right) {
        (Some(left), _) => Some(ChangeRecord::update(left.key)),
        (None, Some(right)) => Some(ChangeRecord::delete(right.key)),
        (None, None) => None,
    }
}

/// Cloneable close handle for a change stream or local watch
///
/// `close` resolves a parked pull as a clean end-of-stream and cancels
/// any diff pass in flight; calling it twice is safe.
#[derive(Clone)]
pub struct WatchHandle {
    pub(crate) cancel: CancellationToken,
}

impl WatchHandle {
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
