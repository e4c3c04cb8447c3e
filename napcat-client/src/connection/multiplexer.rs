//! Connection lifecycle, request correlation and the reader loop

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use napcat_protocol::{decode_frame, encode_frame, CorrelationId, Frame};
use napcat_utils::{NapcatError, Result};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::pending::PendingTable;
use super::stats::{ConnectionStats, StatsSnapshot};
use super::subscriber::{SubscriberSet, Subscription};
use crate::config::ConnectionOptions;
use crate::transport::{FrameSink, FrameStream, Transport};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, reader not started
    Idle,
    Running,
    /// `close()` in progress
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

struct Inner {
    id: Uuid,
    options: ConnectionOptions,
    state: watch::Sender<ConnectionState>,
    sink: tokio::sync::Mutex<Box<dyn FrameSink>>,
    stream: Mutex<Option<FrameStream>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<PendingTable>,
    subscribers: Arc<SubscriberSet>,
    stats: Arc<ConnectionStats>,
    next_seq: AtomicU64,
    cleaned_up: AtomicBool,
}

/// Multiplexer over a single transport
///
/// Cheap to clone; all clones drive the same connection. Dropping the last
/// clone aborts the reader and releases the transport without a close
/// handshake, so prefer [`close`](Self::close).
#[derive(Clone)]
pub struct ConnectionCore {
    inner: Arc<Inner>,
    _owner: Arc<Owner>,
}

/// Shared by every `ConnectionCore` clone; the reader task does not hold one
struct Owner(Arc<Inner>);

impl Drop for Owner {
    fn drop(&mut self) {
        debug!(connection_id = %self.0.id, "last handle dropped");
        self.0.abort_reader();
    }
}

impl ConnectionCore {
    /// Wrap a transport; the connection starts `Idle`
    pub fn new<T: Transport>(transport: T, options: ConnectionOptions) -> Self {
        let id = Uuid::new_v4();
        let (sink, stream) = transport.split();
        let (state, _) = watch::channel(ConnectionState::Idle);
        let stats = Arc::new(ConnectionStats::new());

        let inner = Inner {
            id,
            options,
            state,
            sink: tokio::sync::Mutex::new(sink),
            stream: Mutex::new(Some(stream)),
            reader: Mutex::new(None),
            pending: Arc::new(PendingTable::new()),
            subscribers: Arc::new(SubscriberSet::new(
                options.subscriber_capacity,
                Arc::clone(&stats),
                id,
            )),
            stats,
            next_seq: AtomicU64::new(0),
            cleaned_up: AtomicBool::new(false),
        };

        let inner = Arc::new(inner);
        Self {
            _owner: Arc::new(Owner(Arc::clone(&inner))),
            inner,
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.inner.options
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Requests currently waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Spawn the reader loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut prior = ConnectionState::Idle;
        self.inner.state.send_if_modified(|state| {
            prior = *state;
            if *state == ConnectionState::Idle {
                *state = ConnectionState::Running;
                true
            } else {
                false
            }
        });

        match prior {
            ConnectionState::Idle => {}
            ConnectionState::Running => return Err(NapcatError::AlreadyStarted),
            ConnectionState::Closing | ConnectionState::Closed => {
                return Err(NapcatError::CannotRestart)
            }
        }

        let stream = match self.inner.stream.lock().take() {
            Some(stream) => stream,
            None => {
                self.inner.cleanup();
                return Err(NapcatError::internal("frame stream already consumed"));
            }
        };

        // The guard is moved into the task so an abort before the first
        // poll still runs cleanup
        let guard = CleanupGuard(Arc::clone(&self.inner));
        {
            let mut reader = self.inner.reader.lock();
            let handle = tokio::spawn(reader_loop(guard, stream));
            if self.inner.cleaned_up.load(Ordering::SeqCst) {
                handle.abort();
            } else {
                *reader = Some(handle);
            }
        }

        info!(connection_id = %self.inner.id, "connection started");
        Ok(())
    }

    /// Close the connection and wait until it is `Closed`
    ///
    /// Safe to call any number of times from any number of tasks.
    pub async fn close(&self) {
        let mut prior = ConnectionState::Idle;
        self.inner.state.send_if_modified(|state| {
            prior = *state;
            match *state {
                ConnectionState::Idle | ConnectionState::Running => {
                    *state = ConnectionState::Closing;
                    true
                }
                _ => false,
            }
        });

        match prior {
            ConnectionState::Idle => {
                debug!(connection_id = %self.inner.id, "closing connection that never started");
                self.close_transport().await;
                self.inner.cleanup();
            }
            ConnectionState::Running => {
                debug!(connection_id = %self.inner.id, "closing connection");
                self.shutdown().await;
            }
            ConnectionState::Closing | ConnectionState::Closed => {}
        }

        self.wait_for(ConnectionState::Closed).await;
    }

    async fn shutdown(&self) {
        if self.close_transport().await {
            let grace = self.inner.options.close_grace;
            let exited = tokio::time::timeout(grace, self.wait_for(ConnectionState::Closed)).await;
            if exited.is_ok() {
                return;
            }
            warn!(connection_id = %self.inner.id, "reader did not exit after close");
        }

        self.inner.abort_reader();
    }

    /// Close the sink within the grace period; true when it closed cleanly
    async fn close_transport(&self) -> bool {
        let grace = self.inner.options.close_grace;
        let closed = tokio::time::timeout(grace, async {
            let mut sink = self.inner.sink.lock().await;
            sink.close().await
        })
        .await;

        match closed {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(connection_id = %self.inner.id, error = %e, "transport close failed");
                false
            }
            Err(_) => {
                warn!(
                    connection_id = %self.inner.id,
                    grace_ms = grace.as_millis() as u64,
                    "transport did not close in time"
                );
                false
            }
        }
    }

    /// Wait until the connection is `Closed`
    ///
    /// Returns immediately for a connection that was never started.
    pub async fn wait_closed(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx
            .wait_for(|state| matches!(state, ConnectionState::Idle | ConnectionState::Closed))
            .await;
    }

    async fn wait_for(&self, target: ConnectionState) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Send a request and wait up to `timeout` for its response
    ///
    /// Any `echo` already present in `payload` is replaced by a fresh
    /// correlation id. The returned frame is the peer's response verbatim.
    pub async fn send(&self, payload: Frame, timeout: Duration) -> Result<Frame> {
        match self.state() {
            ConnectionState::Running => {}
            ConnectionState::Idle => return Err(NapcatError::NotConnected),
            ConnectionState::Closing | ConnectionState::Closed => {
                return Err(NapcatError::ConnectionClosed)
            }
        }

        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let id = CorrelationId::from_sequence(seq);
        let (guard, rx) = self.inner.pending.register(id.clone())?;

        let request = payload.with_echo(&id);
        let text = encode_frame(&request).map_err(|e| NapcatError::protocol(e.to_string()))?;

        let exchange = async {
            {
                let mut sink = self.inner.sink.lock().await;
                sink.send_text(text).await?;
            }
            self.inner.stats.record_request();
            trace!(connection_id = %self.inner.id, echo = %id, "request sent");

            match rx.await {
                Ok(result) => result,
                Err(_) => Err(NapcatError::ConnectionClosed),
            }
        };

        let result = match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                self.inner.stats.record_timeout();
                debug!(
                    connection_id = %self.inner.id,
                    echo = %id,
                    timeout_ms = timeout.as_millis() as u64,
                    "request timed out"
                );
                Err(NapcatError::Timeout {
                    echo: id.to_string(),
                    timeout,
                })
            }
        };

        drop(guard);
        result
    }

    /// [`send`](Self::send) with the configured request timeout
    pub async fn send_default(&self, payload: Frame) -> Result<Frame> {
        self.send(payload, self.inner.options.request_timeout).await
    }

    /// Attach a new event consumer
    ///
    /// Only frames arriving after this call are delivered. After the
    /// connection closed the subscription is already terminated.
    pub fn subscribe(&self) -> Subscription {
        self.inner.subscribers.subscribe()
    }
}

impl fmt::Debug for ConnectionCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCore")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("pending", &self.inner.pending.len())
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}

impl Inner {
    /// Route one inbound text frame
    fn dispatch(&self, text: &str) {
        self.stats.record_frame();

        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_decode_error();
                warn!(connection_id = %self.id, error = %e, "skipping undecodable frame");
                return;
            }
        };

        if let Some(echo) = frame.echo() {
            if !self.pending.resolve(echo.as_str(), frame) {
                self.stats.record_unmatched();
                debug!(connection_id = %self.id, echo = %echo, "no pending request for response");
            }
            return;
        }

        let delivered = self.subscribers.broadcast(&frame);
        self.stats.record_broadcast();
        trace!(connection_id = %self.id, delivered, "event broadcast");
    }

    /// Abort the reader task, or clean up directly when none is running
    fn abort_reader(&self) {
        let mut reader = self.reader.lock();
        match reader.take() {
            // Dropping the aborted future runs cleanup through its guard
            Some(handle) => {
                debug!(connection_id = %self.id, "aborting reader");
                handle.abort();
            }
            None => self.cleanup(),
        }
    }

    /// Fail pending requests, terminate subscribers, mark `Closed`; runs once
    fn cleanup(&self) {
        if self.cleaned_up.swap(true, Ordering::SeqCst) {
            return;
        }

        let failed = self.pending.fail_all();
        let terminated = self.subscribers.terminate_all();
        self.state.send_replace(ConnectionState::Closed);

        info!(
            connection_id = %self.id,
            failed_requests = failed,
            subscribers = terminated,
            "connection closed"
        );
    }
}

/// Runs cleanup when the reader task finishes or is aborted
struct CleanupGuard(Arc<Inner>);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.0.cleanup();
    }
}

async fn reader_loop(guard: CleanupGuard, mut stream: FrameStream) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(text) => guard.0.dispatch(&text),
            Err(e) => {
                warn!(connection_id = %guard.0.id, error = %e, "transport read failed");
                break;
            }
        }
    }

    debug!(connection_id = %guard.0.id, "reader loop exited");
}
