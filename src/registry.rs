//! Process-local directory of every live actor on this node: [`Registry`].
//!
//! Keeps the `StrongHandle` that keeps a spawned actor alive once its
//! spawner's own handle goes out of scope — dropped only by
//! [`Registry::remove`], called as step (3) of `Cell::cleanup` (spec §4.1).

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::control_block::StrongHandle;
use crate::id::{ActorId, ActorIdAllocator};

/// `ActorId -> StrongHandle` directory for one runtime instance.
///
/// Adapted from `broker::registry::ActorRegistry`'s `DashMap`-based lookup
/// pattern, simplified to a single map keyed by id (no pools/routing keys —
/// those served `ActorAddress` resolution, which this crate doesn't have).
pub struct Registry {
    actors: DashMap<ActorId, StrongHandle>,
    allocator: ActorIdAllocator,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            actors: DashMap::new(),
            allocator: ActorIdAllocator::new(),
        }
    }

    /// Allocates the next [`ActorId`] for a newly spawned actor.
    pub fn next_actor_id(&self) -> ActorId {
        self.allocator.allocate()
    }

    /// Registers a freshly spawned actor, keeping it alive until
    /// [`Registry::remove`] drops this handle.
    pub fn insert(&self, id: ActorId, handle: StrongHandle) {
        self.actors.insert(id, handle);
    }

    pub fn lookup(&self, id: ActorId) -> Option<StrongHandle> {
        self.actors.get(&id).map(|entry| entry.value().clone())
    }

    /// Unregisters `id`, dropping the registry's own strong reference. If
    /// this was the last one outstanding, the actor body is destroyed as
    /// part of this call returning (see `ControlBlock::with_cell`).
    pub fn remove(&self, id: ActorId) -> bool {
        self.actors.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_block::{Cell, WeakHandle};
    use crate::error::ExitReason;
    use crate::id::NodeId;
    use crate::mailbox::MailboxElement;
    use crate::resumable::{ResumeResult, Resumable};

    struct NoopCell;
    impl Resumable for NoopCell {
        fn resume(&mut self, _budget: usize) -> ResumeResult {
            ResumeResult::Done
        }
    }
    impl Cell for NoopCell {
        fn attach_self(&mut self, _weak: WeakHandle) {}
        fn enqueue(&self, _element: MailboxElement) -> bool {
            true
        }
        fn cleanup(&mut self, _reason: ExitReason) -> bool {
            true
        }
        fn is_terminated(&self) -> bool {
            false
        }
    }

    #[test]
    fn allocator_skips_reserved_zero_and_is_monotonic() {
        let registry = Registry::new();
        let a = registry.next_actor_id();
        let b = registry.next_actor_id();
        assert_eq!(a.raw(), 1);
        assert_eq!(b.raw(), 2);
    }

    #[test]
    fn insert_lookup_remove_round_trip() {
        let registry = Registry::new();
        let id = registry.next_actor_id();
        let handle = StrongHandle::allocate(id, NodeId::local(), Box::new(NoopCell));
        registry.insert(id, handle);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(id).is_some());
        assert!(registry.remove(id));
        assert!(registry.lookup(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn removing_last_strong_handle_destroys_the_body() {
        let registry = Registry::new();
        let id = registry.next_actor_id();
        let handle = StrongHandle::allocate(id, NodeId::local(), Box::new(NoopCell));
        let weak = handle.downgrade();
        registry.insert(id, handle);
        assert!(registry.remove(id));
        assert!(weak.upgrade().is_none());
    }
}
