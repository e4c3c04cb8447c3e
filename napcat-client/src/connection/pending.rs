//! Pending request table
//!
//! Maps a correlation id to the one-shot cell its caller is waiting on.
//! Entries are removed when resolved, when the caller stops waiting
//! (via [`PendingGuard`]) or when the connection is torn down.

use std::collections::HashMap;
use std::sync::Arc;

use napcat_protocol::{CorrelationId, Frame};
use napcat_utils::{NapcatError, Result};
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Receiving side of a pending request
pub(crate) type PendingReceiver = oneshot::Receiver<Result<Frame>>;

#[derive(Default)]
struct TableInner {
    waiters: HashMap<CorrelationId, oneshot::Sender<Result<Frame>>>,
    closed: bool,
}

#[derive(Default)]
pub(crate) struct PendingTable {
    inner: Mutex<TableInner>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id`
    ///
    /// Fails once the table has been closed by cleanup, so nothing can be
    /// registered that would never be resolved.
    pub fn register(self: &Arc<Self>, id: CorrelationId) -> Result<(PendingGuard, PendingReceiver)> {
        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(NapcatError::ConnectionClosed);
            }
            if inner.waiters.contains_key(&id) {
                return Err(NapcatError::internal(format!(
                    "correlation id {} already pending",
                    id
                )));
            }
            inner.waiters.insert(id.clone(), tx);
        }

        let guard = PendingGuard {
            table: Arc::clone(self),
            id,
        };
        Ok((guard, rx))
    }

    /// Resolve the waiter for `id` with a response frame
    ///
    /// Returns false when no such request is pending.
    pub fn resolve(&self, id: &str, frame: Frame) -> bool {
        let waiter = self.inner.lock().waiters.remove(id);
        match waiter {
            Some(tx) => {
                // The caller may have given up between removal and send
                let _ = tx.send(Ok(frame));
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        self.inner.lock().waiters.remove(id).is_some()
    }

    /// Close the table and fail every waiter with `ConnectionClosed`
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.waiters.drain().collect()
        };

        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(NapcatError::ConnectionClosed));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

/// Removes its entry from the table when dropped
///
/// Held by the sending caller for the duration of its wait, so timeouts,
/// write failures and dropped futures all clean up the same way.
pub(crate) struct PendingGuard {
    table: Arc<PendingTable>,
    id: CorrelationId,
}

impl PendingGuard {
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.table.remove(self.id.as_str());
    }
}
