//! Reference counting for actors: [`ControlBlock`], [`StrongHandle`],
//! [`WeakHandle`], and [`RawPointer`] (spec §3.2).
//!
//! A `ControlBlock` is the thing every actor handle ultimately points at. It
//! carries identity (`actor_id`, `node_id`), the strong/weak counters that
//! decide when the actor body is destroyed versus when the block itself is
//! freed, and the type-erased [`Cell`] the actor module installs so that
//! heterogeneous actors can share one registry and one mailbox-enqueue path.
//!
//! Strong handles own the actor; the last one dropped destroys the body
//! immediately (so `post_stop`/cleanup can run promptly). Weak handles never
//! keep the body alive, only the block's identity — they can observe a dead
//! actor's id/node but can never upgrade back into a strong handle once the
//! body is gone. This is what lets `link_to`/monitor graphs hold cycles
//! without leaking (spec §9, "cyclic ownership").

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::attachable::AttachableList;
use crate::id::{ActorId, NodeId};
use crate::mailbox::MailboxElement;
use crate::resumable::Resumable;

/// Type-erased operations every actor must expose to the substrate,
/// independent of its concrete `Actor::Message` type. Analogous to CAF's
/// `abstract_actor`.
///
/// `Cell: Resumable` so the scheduler never needs its own handle to the
/// actor body: it holds a [`WeakHandle`], upgrades it, and calls
/// `with_cell(|cell| cell.resume(budget))` — the same `&dyn Cell` that the
/// mailbox-enqueue path uses, accessed through the supertrait's vtable slot.
pub trait Cell: Resumable + Send + Sync {
    /// Called exactly once, immediately after allocation, with a weak handle
    /// to the actor's own control block. Needed because the cell is built
    /// and boxed before its `ControlBlock` exists (spawn can't hand out a
    /// `WeakHandle` to an actor until `StrongHandle::allocate` has returned
    /// one), so `ActorContext::self_handle` has nothing to borrow from
    /// without this post-construction step.
    fn attach_self(&mut self, weak: WeakHandle);

    /// Enqueues a mailbox element; returns `false` if the actor already
    /// terminated (the caller must bounce the message itself).
    fn enqueue(&self, element: MailboxElement) -> bool;

    /// Runs the cleanup protocol if it has not already run. Returns `true`
    /// if this call is the one that actually performed cleanup.
    fn cleanup(&mut self, reason: crate::error::ExitReason) -> bool;

    /// `true` once this actor has finished its cleanup protocol.
    fn is_terminated(&self) -> bool;
}

/// Per-actor reference-counted header (spec §3.2).
///
/// Allocated once per actor and shared by every [`StrongHandle`] /
/// [`WeakHandle`] / [`RawPointer`] that refers to it.
pub struct ControlBlock {
    pub actor_id: ActorId,
    pub node_id: NodeId,
    strong_refs: AtomicUsize,
    weak_refs: AtomicUsize,
    cell: Mutex<Option<Box<dyn Cell>>>,
    /// Lifecycle observers (spec §3.5). Kept here rather than behind the
    /// type-erased `Cell` because it doesn't depend on the actor's
    /// `Message`/`Error` types, so other actors can reach it directly
    /// through a `WeakHandle`/`StrongHandle` without downcasting.
    attachables: AttachableList,
}

impl ControlBlock {
    /// Allocates a fresh control block with `strong_refs = 1`,
    /// `weak_refs = 1` (spec §3.2) and installs its type-erased cell.
    fn new(actor_id: ActorId, node_id: NodeId, cell: Box<dyn Cell>) -> Arc<Self> {
        Arc::new(ControlBlock {
            actor_id,
            node_id,
            strong_refs: AtomicUsize::new(1),
            weak_refs: AtomicUsize::new(1),
            cell: Mutex::new(Some(cell)),
            attachables: AttachableList::new(),
        })
    }

    pub fn attachables(&self) -> &AttachableList {
        &self.attachables
    }

    /// Current strong reference count; exposed for tests and diagnostics.
    pub fn strong_count(&self) -> usize {
        self.strong_refs.load(Ordering::Acquire)
    }

    /// Current weak reference count; exposed for tests and diagnostics.
    pub fn weak_count(&self) -> usize {
        self.weak_refs.load(Ordering::Acquire)
    }

    /// `true` while the actor body is alive (strong count > 0).
    pub fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }

    /// Runs `f` against the installed [`Cell`] if the actor is still alive,
    /// returning `None` if the body has already been destroyed.
    ///
    /// Takes the cell's lock for the duration of `f`, which both protects
    /// the actor's internal state and gives `f` exclusive (`&mut`) access —
    /// `resume`, `enqueue`, and `cleanup` all go through here, so at most
    /// one of them runs against a given actor at a time.
    ///
    /// `cleanup` (called from within `f`, e.g. by `resume` noticing the
    /// actor is no longer alive) commonly drops the registry's own
    /// `StrongHandle`, which can be the last one outstanding. That drop
    /// would otherwise try to re-take this very lock from the same thread
    /// (see `destroy_body`'s `try_lock`); the check below is what actually
    /// finishes that destruction once `f` has returned and the lock is
    /// still ours to use.
    pub fn with_cell<R>(&self, f: impl FnOnce(&mut dyn Cell) -> R) -> Option<R> {
        let mut guard = self.cell.lock();
        let result = guard.as_deref_mut().map(f);
        if self.strong_refs.load(Ordering::Acquire) == 0 {
            guard.take();
        }
        result
    }

    fn destroy_body(&self) {
        // A normal (non-reentrant) drop: nothing else holds the lock, so
        // this runs immediately. If the last strong ref instead drops from
        // *inside* a `with_cell` call on this same thread (cleanup dropping
        // the registry's own handle), `try_lock` fails here and `with_cell`'s
        // own post-`f` check above finishes the job once it releases the
        // guard — avoids a self-deadlock on the non-reentrant inner mutex.
        if let Some(mut guard) = self.cell.try_lock() {
            guard.take();
        }
    }
}

/// Owning reference to an actor. The last `StrongHandle` dropped destroys
/// the actor body.
pub struct StrongHandle(Arc<ControlBlock>);

impl StrongHandle {
    /// Allocates a new actor and returns its first (and, at this point,
    /// only) strong handle.
    pub fn allocate(actor_id: ActorId, node_id: NodeId, cell: Box<dyn Cell>) -> Self {
        StrongHandle(ControlBlock::new(actor_id, node_id, cell))
    }

    pub fn control_block(&self) -> &ControlBlock {
        &self.0
    }

    /// Produces a non-owning [`WeakHandle`] to the same actor.
    pub fn downgrade(&self) -> WeakHandle {
        self.0.weak_refs.fetch_add(1, Ordering::AcqRel);
        WeakHandle(Arc::clone(&self.0))
    }

    /// Produces an unchecked [`RawPointer`] for hot internal paths.
    ///
    /// # Safety contract
    /// The caller must not let the `RawPointer` outlive every `StrongHandle`
    /// / `WeakHandle` keeping the block allocated.
    pub fn raw(&self) -> RawPointer {
        RawPointer(Arc::as_ptr(&self.0))
    }
}

impl Clone for StrongHandle {
    fn clone(&self) -> Self {
        self.0.strong_refs.fetch_add(1, Ordering::AcqRel);
        StrongHandle(Arc::clone(&self.0))
    }
}

impl Drop for StrongHandle {
    fn drop(&mut self) {
        if self.0.strong_refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.destroy_body();
        }
    }
}

impl std::ops::Deref for StrongHandle {
    type Target = ControlBlock;
    fn deref(&self) -> &ControlBlock {
        &self.0
    }
}

/// Non-owning reference to an actor; upgradeable to a [`StrongHandle`] iff
/// the actor's strong count is still above zero at the moment of the
/// attempt (spec §3.2 invariant: a dead actor's weak handle never upgrades).
#[derive(Clone)]
pub struct WeakHandle(Arc<ControlBlock>);

impl WeakHandle {
    pub fn control_block(&self) -> &ControlBlock {
        &self.0
    }

    /// Attempts to upgrade to a strong handle via a CAS loop so a
    /// concurrent drop-to-zero can never be observed as a successful
    /// upgrade (mirrors CAF's `intrusive_ptr_upgrade_weak`).
    pub fn upgrade(&self) -> Option<StrongHandle> {
        let mut current = self.0.strong_refs.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return None;
            }
            match self.0.strong_refs.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(StrongHandle(Arc::clone(&self.0))),
                Err(observed) => current = observed,
            }
        }
    }

    pub fn actor_id(&self) -> ActorId {
        self.0.actor_id
    }

    pub fn node_id(&self) -> &NodeId {
        &self.0.node_id
    }
}

impl Drop for WeakHandle {
    fn drop(&mut self) {
        self.0.weak_refs.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Unchecked pointer to a [`ControlBlock`], for hot paths inside the
/// scheduler and mailbox that already hold a strong/weak handle elsewhere
/// and want to avoid the atomic traffic of another clone.
#[derive(Clone, Copy)]
pub struct RawPointer(*const ControlBlock);

impl RawPointer {
    /// # Safety
    /// The caller must guarantee a `StrongHandle` or `WeakHandle` to the
    /// same block outlives this pointer's use.
    pub unsafe fn get(&self) -> &ControlBlock {
        &*self.0
    }
}

// Safety: ControlBlock itself is Sync (atomics + Mutex<Option<Box<dyn Cell>>>
// where Cell: Send + Sync), so a raw pointer to it is safe to share across
// threads under the caller's lifetime contract above.
unsafe impl Send for RawPointer {}
unsafe impl Sync for RawPointer {}
