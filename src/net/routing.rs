//! [`RoutingTable`]: direct and indirect node reachability (spec §3.7, §4.7).
//!
//! Grounded on `io/basp/routing_table.hpp`'s mutex-guarded direct/indirect
//! maps; adapted from `std::unordered_map`/`std::set` to `HashMap`/`HashSet`
//! behind a single `parking_lot::Mutex` (the teacher's `registry.rs` prefers
//! `DashMap` for its keyed directory, but this table's cross-map invariants
//! — point 2 below — need one lock spanning both maps, which a sharded map
//! cannot give cheaply).

// Layer 1: Standard library imports
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::id::NodeId;

/// Opaque identifier for one live peer connection, handed out by
/// [`super::multiplexer::Multiplexer`] when a connection is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    pub fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Outcome of [`RoutingTable::resolve`] (spec §4.7 "Routing lookup order").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct(ConnectionId),
    Indirect(ConnectionId),
    Unreachable,
}

struct Inner {
    direct: HashMap<NodeId, ConnectionId>,
    indirect: HashMap<NodeId, HashSet<NodeId>>,
}

/// Direct `NodeId ↔ ConnectionId` bijection plus an indirect
/// `NodeId → {NodeId}` next-hop map, both mutex-guarded (spec §3.7).
pub struct RoutingTable {
    inner: Mutex<Inner>,
}

impl RoutingTable {
    pub fn new() -> Self {
        RoutingTable {
            inner: Mutex::new(Inner {
                direct: HashMap::new(),
                indirect: HashMap::new(),
            }),
        }
    }

    /// Adds a direct route. A node present in `indirect` is evicted first,
    /// preserving invariant (1) from spec §3.7: a node never appears in both.
    pub fn insert_direct(&self, node: NodeId, connection: ConnectionId) {
        let mut inner = self.inner.lock();
        inner.indirect.remove(&node);
        inner.direct.insert(node, connection);
    }

    /// Adds an indirect route via `hop`. Refused if `target` already has a
    /// direct route or `hop` has no direct route of its own (spec §4.7).
    pub fn insert_indirect(&self, target: NodeId, hop: NodeId) -> bool {
        let mut inner = self.inner.lock();
        if inner.direct.contains_key(&target) || !inner.direct.contains_key(&hop) {
            return false;
        }
        inner.indirect.entry(target).or_default().insert(hop);
        true
    }

    /// Removes `node`'s direct route. Also invalidates every indirect route
    /// whose only remaining hop was `node` (spec §3.7 invariant 3).
    pub fn remove_direct(&self, node: &NodeId) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.direct.remove(node).is_some();
        if removed {
            inner.indirect.retain(|_, hops| {
                hops.remove(node);
                !hops.is_empty()
            });
        }
        removed
    }

    /// Resolves `target` to a connection, direct routes taking priority over
    /// indirect, lazily evicting stale hops it encounters along the way
    /// (spec §4.7).
    pub fn resolve(&self, target: &NodeId) -> Route {
        let mut inner = self.inner.lock();
        if let Some(connection) = inner.direct.get(target) {
            return Route::Direct(*connection);
        }
        let Some(hops) = inner.indirect.get(target).cloned() else {
            return Route::Unreachable;
        };
        for hop in &hops {
            if let Some(connection) = inner.direct.get(hop).copied() {
                return Route::Indirect(connection);
            }
        }
        // Every hop is stale; evict them so later lookups don't repeat the work.
        inner.indirect.remove(target);
        Route::Unreachable
    }

    pub fn is_direct(&self, node: &NodeId) -> bool {
        self.inner.lock().direct.contains_key(node)
    }

    /// Snapshot of every node currently reachable by a direct route, for
    /// `Multiplexer`'s last-proxy-exited sweep (spec §9's peer close
    /// policy), which needs to walk "every connected node" rather than
    /// resolve one at a time.
    pub fn direct_nodes(&self) -> Vec<NodeId> {
        self.inner.lock().direct.keys().cloned().collect()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        RoutingTable::new()
    }
}
