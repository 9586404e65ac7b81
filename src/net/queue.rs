//! [`MessageQueue`]: in-order delivery across a worker pool (spec §4.9).
//!
//! Grounded on `io/basp/message_queue.hpp`: workers decoding frames off one
//! connection in parallel stamp a sequence id under the queue's lock, decode
//! off-lock, then hand the decoded element back to `push`, which buffers
//! out-of-order arrivals until the gap below them fills.

// Layer 1: Standard library imports
use std::collections::BTreeMap;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::trace;

// Layer 3: Internal module imports
use crate::control_block::WeakHandle;
use crate::mailbox::MailboxElement;

struct Inner {
    next_id: u64,
    next_undelivered: u64,
    pending: BTreeMap<u64, (WeakHandle, MailboxElement)>,
}

/// Sequences decoded frames from one connection back into ascending-id
/// delivery order (spec §4.9).
pub struct MessageQueue {
    inner: Mutex<Inner>,
}

impl MessageQueue {
    pub fn new() -> Self {
        MessageQueue {
            inner: Mutex::new(Inner {
                next_id: 0,
                next_undelivered: 0,
                pending: BTreeMap::new(),
            }),
        }
    }

    /// Stamps the next sequence id. Callers decode off-lock, then call
    /// [`MessageQueue::push`] with the id they were handed.
    pub fn new_id(&self) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        id
    }

    /// Hands back a decoded element tagged with sequence `id`. Returns every
    /// element now ready for delivery, in ascending id order (possibly
    /// including `id` itself if the gap below it was already filled).
    pub fn push(&self, id: u64, receiver: WeakHandle, element: MailboxElement) -> Vec<(WeakHandle, MailboxElement)> {
        let mut inner = self.inner.lock();
        inner.pending.insert(id, (receiver, element));
        self.drain_ready(&mut inner)
    }

    /// Advances the undelivered counter past `id` without producing a
    /// delivery, for frames whose decode failed (spec §4.9: "`drop(id)`
    /// advances the counter without effect").
    pub fn drop_id(&self, id: u64) -> Vec<(WeakHandle, MailboxElement)> {
        let mut inner = self.inner.lock();
        if id == inner.next_undelivered {
            inner.next_undelivered += 1;
        }
        self.drain_ready(&mut inner)
    }

    fn drain_ready(&self, inner: &mut Inner) -> Vec<(WeakHandle, MailboxElement)> {
        let mut ready = Vec::new();
        while let Some(entry) = inner.pending.remove(&inner.next_undelivered) {
            ready.push(entry);
            inner.next_undelivered += 1;
        }
        if !ready.is_empty() {
            trace!(delivered = ready.len(), next = inner.next_undelivered, "message queue drained");
        }
        ready
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        MessageQueue::new()
    }
}
