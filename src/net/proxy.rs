//! [`RemoteProxy`]: the local stand-in for an actor living on another node
//! (spec §4.8).
//!
//! Grounded on `io/basp/remote_actor_proxy.hpp`: a `RemoteProxy` satisfies
//! the same [`Cell`] contract as a local actor, so the rest of the
//! substrate (mailbox push, `link_to`, monitors) never needs to know a
//! target is remote. `enqueue` forwards the element's already-encoded bytes
//! to the owning peer's write queue instead of running user code.
//!
//! Payload serialization of typed application messages into those bytes is
//! the caller's job (spec §1 Non-goal: "not a general-purpose RPC library");
//! a [`RemoteProxy`] only forwards `Vec<u8>` payloads it can downcast to —
//! see `DESIGN.md` for this Open Question resolution.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

// Layer 3: Internal module imports
use crate::attachable::SystemMessage;
use crate::control_block::{Cell, WeakHandle};
use crate::error::{ExitReason, RequestError};
use crate::id::{ActorId, MessageId, NodeId};
use crate::mailbox::{Category, MailboxElement};
use crate::resumable::{ResumeResult, Resumable};

use super::wire::{Header, MessageType};

/// One outbound frame queued for a peer's write task.
pub struct OutboundFrame {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// A local handle for an actor living on `node_id`. Forwards every enqueued
/// element to the peer connection that owns that node (spec §4.8).
pub struct RemoteProxy {
    actor_id: ActorId,
    node_id: NodeId,
    outbound: UnboundedSender<OutboundFrame>,
    /// In-flight request ids this proxy forwarded, so a bounce can be
    /// synthesized for each if the owning connection dies before a reply
    /// arrives (spec §4.8: "a dedicated intrusive queue of outstanding
    /// request IDs").
    pending_requests: Mutex<HashMap<u64, WeakHandle>>,
    terminated: AtomicBool,
}

impl RemoteProxy {
    pub fn new(actor_id: ActorId, node_id: NodeId, outbound: UnboundedSender<OutboundFrame>) -> Self {
        RemoteProxy {
            actor_id,
            node_id,
            outbound,
            pending_requests: Mutex::new(HashMap::new()),
            terminated: AtomicBool::new(false),
        }
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }
}

impl Resumable for RemoteProxy {
    /// A `RemoteProxy` is never scheduled by the worker pool — it has no
    /// local body to run — but it implements [`Resumable`] because [`Cell`]
    /// requires it; calling this is always a bug on the caller's part.
    fn resume(&mut self, _budget: usize) -> ResumeResult {
        ResumeResult::Done
    }
}

impl Cell for RemoteProxy {
    fn attach_self(&mut self, _weak: WeakHandle) {}

    fn enqueue(&self, element: MailboxElement) -> bool {
        if self.terminated.load(Ordering::Acquire) {
            return false;
        }
        let sender_actor_id = element.sender.as_ref().map(|s| s.actor_id()).unwrap_or(ActorId::none());

        // A link/monitor notification bound for this proxy's remote peer:
        // re-encode it as a `Down` frame rather than trying to forward it as
        // opaque bytes (spec §4.6 has no dedicated wire verb for `exit`; the
        // Down/Exit distinction and the reason travel in the payload, the
        // dying actor's own id travels as `source_actor_id`).
        let payload = match element.payload.downcast::<SystemMessage>() {
            Ok(system_message) => {
                let died_actor_id = match system_message.as_ref() {
                    SystemMessage::Down { actor_id, .. } | SystemMessage::Exit { actor_id, .. } => *actor_id,
                };
                let payload = super::wire::encode_lifecycle_message(&system_message);
                let header = Header {
                    message_type: MessageType::Down,
                    flags: 0,
                    payload_len: payload.len() as u32,
                    message_id: MessageId::none(),
                    source_actor_id: died_actor_id,
                    dest_actor_id: self.actor_id,
                };
                return self.outbound.send(OutboundFrame { header, payload }).is_ok();
            }
            Err(payload) => match payload.downcast::<Vec<u8>>() {
                Ok(bytes) => bytes,
                Err(_) => {
                    warn!(actor_id = %self.actor_id, "remote proxy dropped a non pre-encoded payload");
                    return false;
                }
            },
        };

        if let Some(sender) = element.sender.clone() {
            if element.message_id != MessageId::none() && !element.message_id.is_response() {
                self.pending_requests
                    .lock()
                    .insert(element.message_id.correlation_key(), sender);
            }
        }

        let header = Header {
            message_type: MessageType::DirectMessage,
            flags: 0,
            payload_len: payload.len() as u32,
            message_id: element.message_id,
            source_actor_id: sender_actor_id,
            dest_actor_id: self.actor_id,
        };
        self.outbound.send(OutboundFrame { header, payload: *payload }).is_ok()
    }

    fn cleanup(&mut self, reason: ExitReason) -> bool {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return false;
        }
        let pending = std::mem::take(&mut *self.pending_requests.lock());
        for (_, requester) in pending {
            if let Some(strong) = requester.upgrade() {
                let element = MailboxElement::new(
                    None,
                    MessageId::none(),
                    Box::new(crate::actor::ResponseResult::Err(RequestError::Bounced)),
                    Category::Urgent,
                );
                strong.with_cell(|cell| cell.enqueue(element));
            }
        }
        let _ = reason;
        true
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}
