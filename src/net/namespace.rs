//! [`ActorNamespace`]: de-duplicating registry of remote proxies (spec §4.7).
//!
//! Grounded on `io/basp/remote_group.hpp`'s proxy-registry pattern and the
//! teacher's `registry::Registry` (same `DashMap`-keyed-directory shape,
//! keyed here by `(NodeId, ActorId)` instead of bare `ActorId`).

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::control_block::{StrongHandle, WeakHandle};
use crate::id::{ActorId, NodeId};

/// Maps `(NodeId, ActorId) -> WeakHandle` for every locally known remote
/// proxy (spec §4.7).
pub struct ActorNamespace {
    proxies: DashMap<(NodeId, ActorId), WeakHandle>,
}

impl ActorNamespace {
    pub fn new() -> Self {
        ActorNamespace { proxies: DashMap::new() }
    }

    /// Upgrades the existing proxy for `(node, actor_id)` if it is still
    /// alive, otherwise builds a new one via `factory` and registers it
    /// (spec §4.7: "`get_or_put` upgrades an existing proxy or constructs a
    /// new one using a backend-provided factory").
    pub fn get_or_put(
        &self,
        node: NodeId,
        actor_id: ActorId,
        factory: impl FnOnce() -> StrongHandle,
    ) -> StrongHandle {
        let key = (node, actor_id);
        if let Some(existing) = self.proxies.get(&key) {
            if let Some(strong) = existing.upgrade() {
                return strong;
            }
        }
        let strong = factory();
        self.proxies.insert(key, strong.downgrade());
        strong
    }

    /// Number of proxies currently registered for `node` (alive or not —
    /// callers wanting only live ones should use [`ActorNamespace::live_proxy_count`]).
    pub fn count_proxies(&self, node: &NodeId) -> usize {
        self.proxies.iter().filter(|entry| &entry.key().0 == node).count()
    }

    /// Number of *still-upgradable* proxies for `node` — what actually
    /// decides spec §9's peer close policy ("no local strong or weak proxy
    /// references its node remain"), since a dead weak entry lingering here
    /// until the next `erase` doesn't keep the connection meaningfully in
    /// use.
    pub fn live_proxy_count(&self, node: &NodeId) -> usize {
        self.proxies
            .iter()
            .filter(|entry| &entry.key().0 == node && entry.value().upgrade().is_some())
            .count()
    }

    /// Removes every proxy entry for `node` (spec §4.7: "wholesale cleanup
    /// when a peer dies").
    pub fn erase(&self, node: &NodeId) {
        self.proxies.retain(|key, _| &key.0 != node);
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

impl Default for ActorNamespace {
    fn default() -> Self {
        ActorNamespace::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_block::Cell;
    use crate::error::ExitReason;
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

    fn node(tag: u32) -> NodeId {
        NodeId::new(vec![tag as u8; 16], tag)
    }

    #[test]
    fn get_or_put_reuses_live_proxy() {
        let namespace = ActorNamespace::new();
        let node = node(1);
        let actor_id = ActorId::from_raw(5);
        let mut builds = 0;
        let first = namespace.get_or_put(node.clone(), actor_id, || {
            builds += 1;
            StrongHandle::allocate(actor_id, node.clone(), Box::new(NoopCell))
        });
        let second = namespace.get_or_put(node.clone(), actor_id, || {
            builds += 1;
            StrongHandle::allocate(actor_id, node.clone(), Box::new(NoopCell))
        });
        assert_eq!(builds, 1);
        assert_eq!(first.control_block().actor_id, second.control_block().actor_id);
    }

    #[test]
    fn get_or_put_rebuilds_after_proxy_dies() {
        let namespace = ActorNamespace::new();
        let node = node(2);
        let actor_id = ActorId::from_raw(6);
        {
            let first = namespace.get_or_put(node.clone(), actor_id, || {
                StrongHandle::allocate(actor_id, node.clone(), Box::new(NoopCell))
            });
            drop(first);
        }
        let mut rebuilt = false;
        namespace.get_or_put(node.clone(), actor_id, || {
            rebuilt = true;
            StrongHandle::allocate(actor_id, node.clone(), Box::new(NoopCell))
        });
        assert!(rebuilt);
    }

    #[test]
    fn live_proxy_count_excludes_dead_weak_entries() {
        let namespace = ActorNamespace::new();
        let node = node(4);
        {
            let first = namespace.get_or_put(node.clone(), ActorId::from_raw(1), || {
                StrongHandle::allocate(ActorId::from_raw(1), node.clone(), Box::new(NoopCell))
            });
            drop(first);
        }
        let _second = namespace.get_or_put(node.clone(), ActorId::from_raw(2), || {
            StrongHandle::allocate(ActorId::from_raw(2), node.clone(), Box::new(NoopCell))
        });
        assert_eq!(namespace.count_proxies(&node), 2, "the dead entry for actor 1 is still present until erase");
        assert_eq!(namespace.live_proxy_count(&node), 1, "only actor 2's proxy is still upgradable");
    }

    #[test]
    fn erase_removes_every_proxy_for_node() {
        let namespace = ActorNamespace::new();
        let node = node(3);
        namespace.get_or_put(node.clone(), ActorId::from_raw(1), || {
            StrongHandle::allocate(ActorId::from_raw(1), node.clone(), Box::new(NoopCell))
        });
        namespace.get_or_put(node.clone(), ActorId::from_raw(2), || {
            StrongHandle::allocate(ActorId::from_raw(2), node.clone(), Box::new(NoopCell))
        });
        assert_eq!(namespace.count_proxies(&node), 2);
        namespace.erase(&node);
        assert_eq!(namespace.count_proxies(&node), 0);
    }
}
