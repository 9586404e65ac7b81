//! Lifecycle observers attached to an actor: [`Attachable`] and
//! [`AttachableList`] (spec §3.5).
//!
//! CAF keeps these as an intrusive singly-linked list (`abstract_actor::attach`,
//! `attachables_head_`) so attaching never allocates on the actor's hot path.
//! A `Vec` behind the actor's own lock gets the same externally-observable
//! behavior without unsafe intrusive-list plumbing, which is the trade the
//! teacher's own collections (e.g. `broker::registry`'s `DashMap`) make
//! throughout: prefer a safe std/parking_lot container unless the intrusive
//! version is load-bearing.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::control_block::WeakHandle;
use crate::error::{ExitReason, StreamError};
use crate::id::{ActorId, NodeId};

/// Delivery priority for a [`Attachable::Monitor`] notification (spec §3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MonitorPriority {
    Normal,
    High,
}

/// A system message dispatched through an actor's own `dispatch_system`
/// (spec §4.1 consume algorithm step 2: "internal: run the type-specific
/// hook"). `Down`/`Exit` are also the two kinds [`Attachable`] delivers to a
/// peer's observer; `NodeDown` and `Error` are internal-only, never attached
/// to an [`AttachableList`]. Carried as the payload of a
/// [`crate::mailbox::MailboxElement`] in the `Urgent` category, since
/// lifecycle signals must not wait behind a backlog of ordinary application
/// traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemMessage {
    /// Sent to a [`Attachable::Monitor`]'s observer.
    Down {
        actor_id: ActorId,
        reason: ExitReason,
    },
    /// Sent to a [`Attachable::Link`]'s peer.
    Exit {
        actor_id: ActorId,
        reason: ExitReason,
    },
    /// A node this actor depends on has become unreachable.
    NodeDown {
        node_id: NodeId,
        reason: ExitReason,
    },
    /// A downstream/upstream batch-flow failure (spec §7 `stream` category).
    Error(StreamError),
}

/// One lifecycle observer (spec §3.5). Attachables are polymorphic nodes
/// rather than a trait object so that `detach_link` can recognize and remove
/// a specific peer without downcasting.
pub enum Attachable {
    Monitor {
        observer: WeakHandle,
        priority: MonitorPriority,
    },
    Link {
        peer: WeakHandle,
    },
    ExitCallback(Box<dyn FnOnce(&ExitReason) + Send>),
}

impl Attachable {
    /// Delivers this attachable's notification using the caller's own
    /// execution context (spec §4.1 `cleanup` step 2: synchronous delivery,
    /// not scheduled as a separate unit of work).
    fn notify(self, actor_id: ActorId, reason: &ExitReason) {
        match self {
            Attachable::Monitor { observer, .. } => {
                deliver(&observer, SystemMessage::Down { actor_id, reason: reason.clone() });
            }
            Attachable::Link { peer } => {
                deliver(&peer, SystemMessage::Exit { actor_id, reason: reason.clone() });
            }
            Attachable::ExitCallback(callback) => callback(reason),
        }
    }

    /// `true` if this attachable is the [`Attachable::Link`] pointing at
    /// `peer`'s control block, used by [`AttachableList::detach_link`].
    fn is_link_to(&self, peer: &WeakHandle) -> bool {
        matches!(self, Attachable::Link { peer: p } if same_actor(p, peer))
    }
}

fn same_actor(a: &WeakHandle, b: &WeakHandle) -> bool {
    a.actor_id() == b.actor_id() && a.node_id() == b.node_id()
}

fn deliver(target: &WeakHandle, message: SystemMessage) {
    use crate::mailbox::{Category, MailboxElement};

    let Some(strong) = target.upgrade() else {
        // Already gone; nothing to notify. Mirrors CAF silently dropping a
        // down/exit message to a peer that exited concurrently.
        return;
    };
    let element = MailboxElement::new(None, crate::id::MessageId::none(), Box::new(message), Category::Urgent);
    strong.with_cell(|cell| cell.enqueue(element));
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque handle returned by [`AttachableList::attach`], usable to detach
/// an [`Attachable::ExitCallback`] by identity (links and monitors are
/// detached by peer address instead; see [`AttachableList::detach_link`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachToken(u64);

enum Slot {
    Occupied(AttachToken, Attachable),
    Empty,
}

/// Intrusive-in-spirit list of an actor's lifecycle observers, guarded by
/// the actor's own lock (spec §3.5: "insertions/removals occur only under
/// the actor's exclusive lock").
pub struct AttachableList {
    slots: Mutex<Vec<Slot>>,
}

impl AttachableList {
    pub fn new() -> Self {
        AttachableList { slots: Mutex::new(Vec::new()) }
    }

    /// Adds an attachable, returning a token that can later be passed to
    /// [`AttachableList::detach`].
    pub fn attach(&self, attachable: Attachable) -> AttachToken {
        let token = AttachToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
        self.slots.lock().push(Slot::Occupied(token, attachable));
        token
    }

    /// Removes a previously attached node by token. Returns `true` if a
    /// matching node was found.
    pub fn detach(&self, token: AttachToken) -> bool {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            if matches!(slot, Slot::Occupied(t, _) if *t == token) {
                *slot = Slot::Empty;
                return true;
            }
        }
        false
    }

    /// Removes the [`Attachable::Link`] pointing at `peer`, if any. Used by
    /// `unlink_from` (spec §4.1).
    pub fn detach_link(&self, peer: &WeakHandle) -> bool {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            if matches!(slot, Slot::Occupied(_, a) if a.is_link_to(peer)) {
                *slot = Slot::Empty;
                return true;
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.slots
            .lock()
            .iter()
            .all(|slot| matches!(slot, Slot::Empty))
    }

    /// Swaps out the entire list and delivers every remaining attachable's
    /// exit notification, in attach order. This is step (1)+(2) of the
    /// `cleanup` contract (spec §4.1): the swap happens under the lock, the
    /// deliveries happen after it is released.
    pub fn notify_all(&self, actor_id: ActorId, reason: &ExitReason) {
        let drained = std::mem::take(&mut *self.slots.lock());
        for slot in drained {
            if let Slot::Occupied(_, attachable) = slot {
                attachable.notify(actor_id, reason);
            }
        }
    }
}

impl Default for AttachableList {
    fn default() -> Self {
        AttachableList::new()
    }
}
