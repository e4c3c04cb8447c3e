//! Subscriber fan-out
//!
//! Each consumer owns a bounded queue registered in an arena keyed by a
//! subscriber id. The reader loop offers every event to every queue without
//! blocking: a full queue loses its oldest buffered event to make room.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use napcat_protocol::Frame;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

use super::stats::ConnectionStats;

/// Error returned by [`Subscription::try_recv`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryRecvError {
    #[error("no event buffered")]
    Empty,
    #[error("subscription terminated")]
    Closed,
}

enum QueueItem {
    Event(Frame),
    End,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<QueueItem>,
    /// End sentinel has been pushed
    ended: bool,
    /// End sentinel has been consumed
    finished: bool,
}

/// Outcome of offering one event to one queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offer {
    Queued,
    Evicted,
    Dropped,
    /// Queue already ended or released
    Ended,
}

struct SubscriberQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            capacity,
        }
    }

    fn offer(&self, frame: Frame) -> Offer {
        let outcome = {
            let mut state = self.state.lock();
            if state.ended {
                return Offer::Ended;
            }

            let mut outcome = Offer::Queued;
            if state.items.len() >= self.capacity && state.items.pop_front().is_some() {
                outcome = Offer::Evicted;
            }
            if state.items.len() >= self.capacity {
                return Offer::Dropped;
            }
            state.items.push_back(QueueItem::Event(frame));
            outcome
        };
        self.notify.notify_one();
        outcome
    }

    /// Push the end sentinel; bypasses capacity
    fn terminate(&self) {
        {
            let mut state = self.state.lock();
            if state.ended {
                return;
            }
            state.ended = true;
            state.items.push_back(QueueItem::End);
        }
        self.notify.notify_one();
    }

    /// Discard buffered events and end the queue without a consumer
    fn discard(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        state.ended = true;
        state.finished = true;
    }

    fn pop(&self) -> Result<Frame, TryRecvError> {
        let mut state = self.state.lock();
        if state.finished {
            return Err(TryRecvError::Closed);
        }
        match state.items.pop_front() {
            Some(QueueItem::Event(frame)) => Ok(frame),
            Some(QueueItem::End) => {
                state.finished = true;
                Err(TryRecvError::Closed)
            }
            None => Err(TryRecvError::Empty),
        }
    }

    async fn recv(&self) -> Option<Frame> {
        loop {
            match self.pop() {
                Ok(frame) => return Some(frame),
                Err(TryRecvError::Closed) => return None,
                // notify_one stores a permit, so a push between pop and
                // notified() is not missed
                Err(TryRecvError::Empty) => self.notify.notified().await,
            }
        }
    }

    fn buffered(&self) -> usize {
        self.state
            .lock()
            .items
            .iter()
            .filter(|item| matches!(item, QueueItem::Event(_)))
            .count()
    }
}

#[derive(Default)]
struct SetInner {
    queues: HashMap<u64, Arc<SubscriberQueue>>,
    next_id: u64,
    closed: bool,
}

/// Arena of subscriber queues for one connection
pub(crate) struct SubscriberSet {
    inner: Mutex<SetInner>,
    capacity: usize,
    stats: Arc<ConnectionStats>,
    connection_id: Uuid,
}

impl SubscriberSet {
    pub fn new(capacity: usize, stats: Arc<ConnectionStats>, connection_id: Uuid) -> Self {
        Self {
            inner: Mutex::new(SetInner::default()),
            capacity,
            stats,
            connection_id,
        }
    }

    /// Register a new queue
    ///
    /// After cleanup the returned subscription is already terminated.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let queue = Arc::new(SubscriberQueue::new(self.capacity));
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            if inner.closed {
                queue.terminate();
            } else {
                inner.queues.insert(id, Arc::clone(&queue));
            }
            id
        };

        debug!(connection_id = %self.connection_id, subscriber_id = id, "subscriber registered");
        Subscription {
            id,
            queue,
            set: Arc::clone(self),
        }
    }

    pub fn release(&self, id: u64) -> bool {
        let removed = self.inner.lock().queues.remove(&id);
        match removed {
            Some(queue) => {
                queue.discard();
                debug!(connection_id = %self.connection_id, subscriber_id = id, "subscriber released");
                true
            }
            None => false,
        }
    }

    /// Offer an event to every registered queue; returns how many accepted it
    pub fn broadcast(&self, frame: &Frame) -> usize {
        let targets: Vec<(u64, Arc<SubscriberQueue>)> = self
            .inner
            .lock()
            .queues
            .iter()
            .map(|(id, queue)| (*id, Arc::clone(queue)))
            .collect();

        let mut delivered = 0;
        for (id, queue) in targets {
            match queue.offer(frame.clone()) {
                Offer::Queued => delivered += 1,
                Offer::Evicted => {
                    delivered += 1;
                    self.stats.record_evicted();
                    warn!(
                        connection_id = %self.connection_id,
                        subscriber_id = id,
                        capacity = self.capacity,
                        "subscriber queue full, evicted oldest event"
                    );
                }
                Offer::Dropped => {
                    self.stats.record_dropped();
                    warn!(
                        connection_id = %self.connection_id,
                        subscriber_id = id,
                        capacity = self.capacity,
                        "subscriber cannot keep up, event dropped"
                    );
                }
                Offer::Ended => {}
            }
        }
        delivered
    }

    /// Close the set and terminate every queue
    pub fn terminate_all(&self) -> usize {
        let drained: Vec<Arc<SubscriberQueue>> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.queues.drain().map(|(_, queue)| queue).collect()
        };

        for queue in &drained {
            queue.terminate();
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queues.len()
    }
}

/// Consumer handle for unsolicited events
///
/// Events arrive in reader order. The sequence ends (`recv` returns `None`)
/// once the connection closes and everything buffered before that has been
/// consumed. Dropping the handle releases the queue.
pub struct Subscription {
    id: u64,
    queue: Arc<SubscriberQueue>,
    set: Arc<SubscriberSet>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<Frame> {
        self.queue.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Frame, TryRecvError> {
        self.queue.pop()
    }

    /// Number of events waiting to be received
    pub fn buffered(&self) -> usize {
        self.queue.buffered()
    }

    /// Detach from the connection, discarding buffered events
    pub fn release(self) {
        drop(self);
    }

    pub fn into_stream(self) -> BoxStream<'static, Frame> {
        stream::unfold(self, |mut sub| async move {
            let frame = sub.recv().await?;
            Some((frame, sub))
        })
        .boxed()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("buffered", &self.buffered())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.set.release(self.id);
    }
}
