// src/transport/dispatcher.rs
// Per-connection correlation table. Every inbound message goes to the oldest
// pending request first, and to the default handler when nothing is pending.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};
use uuid::Uuid;

use super::handlers::{InboundHandler, LogHandler};
use crate::message::Message;
use crate::messaging::error::{ReplyError, Result};
use crate::messaging::types::{CorrelationMap, ReplyReceiver, RequestId};

/// Default cap on outstanding correlated requests per connection.
pub const DEFAULT_MAX_PENDING: usize = 1;

struct PendingState {
    next_id: RequestId,
    pending: CorrelationMap,
    closed: bool,
}

pub struct Dispatcher {
    connection_id: Uuid,
    max_pending: usize,
    state: Mutex<PendingState>,
    configured_handler: Arc<dyn InboundHandler>,
    current_handler: RwLock<Arc<dyn InboundHandler>>,
    closed_notify: Notify,
}

impl Dispatcher {
    pub fn new(connection_id: Uuid) -> Self {
        Self::with_handler(connection_id, Arc::new(LogHandler))
    }

    /// Creates a dispatcher whose default handler is `handler`. This is also
    /// the handler [`Dispatcher::reset_default_handler`] restores.
    pub fn with_handler(connection_id: Uuid, handler: Arc<dyn InboundHandler>) -> Self {
        Self {
            connection_id,
            max_pending: DEFAULT_MAX_PENDING,
            state: Mutex::new(PendingState {
                next_id: 1,
                pending: CorrelationMap::new(),
                closed: false,
            }),
            configured_handler: handler.clone(),
            current_handler: RwLock::new(handler),
            closed_notify: Notify::new(),
        }
    }

    /// Allows up to `max_pending` correlated requests at once. Replies are
    /// matched to requests in the order the requests were registered.
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    pub fn set_default_handler(&self, handler: Arc<dyn InboundHandler>) {
        *self
            .current_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// Restores the handler the dispatcher was created with.
    pub fn reset_default_handler(&self) {
        self.set_default_handler(self.configured_handler.clone());
    }

    pub fn pending_count(&self) -> usize {
        self.lock_state().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Resolves once the dispatcher has been closed.
    pub async fn closed(&self) {
        loop {
            let notified = self.closed_notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }

    /// Registers a correlated request. The returned guard unregisters it
    /// when dropped.
    pub(crate) fn register(self: &Arc<Self>) -> Result<PendingReply> {
        let mut state = self.lock_state();
        if state.closed {
            return Err(ReplyError::ConnectionClosed);
        }
        if state.pending.len() >= self.max_pending {
            return Err(ReplyError::RequestPending(state.pending.len()));
        }

        let id = state.next_id;
        state.next_id += 1;

        let (tx, rx) = tokio::sync::oneshot::channel();
        state.pending.insert(id, tx);
        trace!(connection_id = %self.connection_id, request_id = id, "Registered pending request");

        Ok(PendingReply {
            id,
            receiver: rx,
            dispatcher: Arc::clone(self),
        })
    }

    /// Removes request `id`. Returns false if it was already answered,
    /// released, or never existed.
    pub(crate) fn unregister(&self, id: RequestId) -> bool {
        self.lock_state().pending.remove(&id).is_some()
    }

    /// Hands an inbound message to the oldest pending request, or to the
    /// default handler.
    pub fn dispatch(&self, message: Message) {
        let mut message = message;
        {
            let mut state = self.lock_state();
            // Fill and signal under the lock: a waiter that finds its entry
            // gone can rely on the message already being in its channel.
            while let Some((id, reply)) = state.pending.pop_first() {
                match reply.send(message) {
                    Ok(()) => {
                        trace!(connection_id = %self.connection_id, request_id = id, "Reply delivered");
                        return;
                    }
                    Err(unclaimed) => message = unclaimed,
                }
            }
        }

        let handler = self
            .current_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        handler.on_message(message);
    }

    /// Marks the connection closed and releases every pending request with
    /// `ReplyError::ConnectionClosed`.
    pub fn close(&self) {
        let released = {
            let mut state = self.lock_state();
            state.closed = true;
            std::mem::take(&mut state.pending)
        };
        self.closed_notify.notify_waiters();

        if !released.is_empty() {
            debug!(
                connection_id = %self.connection_id,
                released = released.len(),
                "Connection closed with requests pending"
            );
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PendingState> {
        // The state is never left half-updated, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A registered request waiting for its reply.
pub(crate) struct PendingReply {
    id: RequestId,
    receiver: ReplyReceiver,
    dispatcher: Arc<Dispatcher>,
}

impl PendingReply {
    pub(crate) fn id(&self) -> RequestId {
        self.id
    }

    /// Waits up to `timeout` for the reply. `Ok(None)` means the deadline
    /// passed first.
    pub(crate) async fn wait(mut self, timeout: Duration) -> Result<Option<Message>> {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(message)) => Ok(Some(message)),
            Ok(Err(_)) => Err(ReplyError::ConnectionClosed),
            Err(_) => {
                if self.dispatcher.unregister(self.id) {
                    return Ok(None);
                }
                // Lost the race to the dispatcher: the reply is already here.
                match self.receiver.try_recv() {
                    Ok(message) => Ok(Some(message)),
                    Err(_) => Err(ReplyError::ConnectionClosed),
                }
            }
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.dispatcher.unregister(self.id) {
            trace!(
                connection_id = %self.dispatcher.connection_id,
                request_id = self.id,
                "Pending request released"
            );
        }
    }
}
