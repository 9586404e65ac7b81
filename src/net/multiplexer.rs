//! [`Multiplexer`]: connection registry and dispatch (spec §4.5, module H).
//!
//! Grounded on `io/middleman_actor.hpp` and the reactor described in
//! `io/network/default_multiplexer.hpp`: CAF's multiplexer owns the raw-fd
//! event loop itself. `tokio` already supplies that reactor for every
//! [`super::socket::TokioStream`], so this layer narrows to what the reactor
//! doesn't give for free: a table of live connections, the `connect`/`listen`
//! entry points that turn a socket into a [`super::peer::PeerStateMachine`]
//! task, and `run_later` for posting work onto the runtime from outside it.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// Layer 3: Internal module imports
use crate::control_block::StrongHandle;
use crate::error::IoError;
use crate::id::{ActorId, NodeId};
use crate::registry::Registry;

use super::namespace::ActorNamespace;
use super::peer::{LocalIdentity, PeerStateMachine, Shared};
use super::proxy::{OutboundFrame, RemoteProxy};
use super::routing::{ConnectionId, Route, RoutingTable};
use super::socket::TokioStream;

/// Default grace period `G` for spec §9's peer close policy: a connection
/// whose node has had zero live proxies for at least this long is closed.
pub const DEFAULT_PEER_CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(30);

struct Connection {
    outbound: UnboundedSender<OutboundFrame>,
    task: JoinHandle<()>,
}

/// Owns the cross-connection substrate ([`RoutingTable`], [`ActorNamespace`])
/// and the connect/listen entry points spec §4.5 assigns the reactor. Each
/// accepted or dialed connection becomes its own [`PeerStateMachine`] task;
/// this struct never reads or writes a socket directly.
pub struct Multiplexer {
    local: LocalIdentity,
    registry: Arc<Registry>,
    routing: Arc<RoutingTable>,
    namespace: Arc<ActorNamespace>,
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    shutting_down: AtomicBool,
    shutdown_notify: Notify,
    peer_close_grace_period: Duration,
    zero_proxies_since: Mutex<HashMap<NodeId, Instant>>,
}

impl Multiplexer {
    pub fn new(local: LocalIdentity, registry: Arc<Registry>) -> Arc<Self> {
        Self::with_grace_period(local, registry, DEFAULT_PEER_CLOSE_GRACE_PERIOD)
    }

    /// Same as [`Multiplexer::new`] but with an explicit peer close grace
    /// period `G` (spec §9), instead of [`DEFAULT_PEER_CLOSE_GRACE_PERIOD`].
    pub fn with_grace_period(local: LocalIdentity, registry: Arc<Registry>, grace_period: Duration) -> Arc<Self> {
        let this = Arc::new(Multiplexer {
            local,
            registry,
            routing: Arc::new(RoutingTable::new()),
            namespace: Arc::new(ActorNamespace::new()),
            connections: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            peer_close_grace_period: grace_period,
            zero_proxies_since: Mutex::new(HashMap::new()),
        });
        this.spawn_proxy_sweep();
        this
    }

    /// Periodically closes connections to nodes that have had zero live
    /// proxies for at least `peer_close_grace_period` (spec §9's peer close
    /// policy: "a peer connection is closed when no local strong or weak
    /// proxy references its node remain for a grace period G"). Distinct
    /// from [`PeerStateMachine::fail`]'s teardown, which reacts to an I/O
    /// failure rather than a locally-observed drop in proxy references.
    fn spawn_proxy_sweep(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let poll_interval = (this.peer_close_grace_period / 4).max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    biased;
                    _ = this.shutdown_notify.notified() => return,
                    _ = interval.tick() => this.sweep_idle_peers(),
                }
            }
        });
    }

    fn sweep_idle_peers(&self) {
        let now = Instant::now();
        let mut zero_since = self.zero_proxies_since.lock();
        let mut to_close = Vec::new();
        for node in self.routing.direct_nodes() {
            if self.namespace.live_proxy_count(&node) > 0 {
                zero_since.remove(&node);
                continue;
            }
            let since = *zero_since.entry(node.clone()).or_insert(now);
            if now.duration_since(since) >= self.peer_close_grace_period {
                to_close.push(node.clone());
                zero_since.remove(&node);
            }
        }
        drop(zero_since);
        for node in to_close {
            self.close_peer(&node);
        }
    }

    /// Tears down the direct route and aborts the connection task for
    /// `node`, mirroring `PeerStateMachine::fail`'s teardown shape but
    /// triggered by proxy absence rather than an I/O error.
    fn close_peer(&self, node: &NodeId) {
        let Route::Direct(connection_id) = self.routing.resolve(node) else {
            return;
        };
        // `count_proxies` (raw directory size, dead entries included) vs.
        // `live_proxy_count` (what triggered this close) differ whenever
        // proxies died without ever being erased; surfacing both tells an
        // operator how much of this teardown is stale bookkeeping.
        let stale_entries = self.namespace.count_proxies(node);
        self.routing.remove_direct(node);
        self.namespace.erase(node);
        if let Some(connection) = self.connections.lock().remove(&connection_id) {
            connection.task.abort();
            info!(%node, ?connection_id, stale_entries, "closed peer connection: no live proxies within grace period");
        }
    }

    pub fn routing(&self) -> &Arc<RoutingTable> {
        &self.routing
    }

    pub fn namespace(&self) -> &Arc<ActorNamespace> {
        &self.namespace
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    fn shared(&self) -> Shared {
        Shared {
            registry: Arc::clone(&self.registry),
            routing: Arc::clone(&self.routing),
            namespace: Arc::clone(&self.namespace),
        }
    }

    /// Dials `addr`, runs the handshake, and hands the connection to its own
    /// framing-loop task (spec §4.5/§4.6).
    pub async fn connect(self: &Arc<Self>, addr: SocketAddr) -> Result<ConnectionId, IoError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(IoError::ConnectionClosed);
        }
        let stream = TokioStream::connect(addr).await?;
        Ok(self.spawn_connection(stream))
    }

    /// Binds `addr` and spawns one [`PeerStateMachine`] per accepted
    /// connection. The returned task runs until [`Multiplexer::shutdown`] is
    /// called or the listener itself errors.
    pub fn listen(self: &Arc<Self>, addr: SocketAddr) -> JoinHandle<Result<(), IoError>> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| IoError::Other(e.to_string()))?;
            info!(%addr, "multiplexer listening");
            loop {
                tokio::select! {
                    biased;
                    _ = this.shutdown_notify.notified() => {
                        info!(%addr, "multiplexer listener stopping");
                        return Ok(());
                    }
                    accepted = listener.accept() => {
                        let (socket, peer_addr) = accepted.map_err(|e| IoError::Other(e.to_string()))?;
                        let _ = socket.set_nodelay(true);
                        debug!(%peer_addr, "accepted peer connection");
                        this.spawn_connection(TokioStream::new(socket));
                    }
                }
            }
        })
    }

    fn spawn_connection(self: &Arc<Self>, stream: TokioStream) -> ConnectionId {
        let peer = PeerStateMachine::new(stream, self.local.clone(), self.shared());
        let connection_id = peer.connection_id();
        let outbound = peer.outbound_sender();
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            peer.run().await;
            this.connections.lock().remove(&connection_id);
        });
        self.connections.lock().insert(connection_id, Connection { outbound, task });
        connection_id
    }

    /// Resolves or builds the local [`RemoteProxy`] handle for `actor_id` on
    /// `node`, for application code addressing a remote actor it hasn't
    /// heard from yet — the outbound-side mirror of the lazy lookup
    /// [`PeerStateMachine::dispatch`] does for frames it receives.
    pub fn proxy_for(&self, node: &NodeId, actor_id: ActorId) -> Option<StrongHandle> {
        let connection_id = match self.routing.resolve(node) {
            Route::Direct(id) | Route::Indirect(id) => id,
            Route::Unreachable => return None,
        };
        let outbound = self.connections.lock().get(&connection_id)?.outbound.clone();
        Some(self.namespace.get_or_put(node.clone(), actor_id, || {
            StrongHandle::allocate(actor_id, node.clone(), Box::new(RemoteProxy::new(actor_id, node.clone(), outbound)))
        }))
    }

    /// Runs `fun` on the runtime this multiplexer is driven by (spec §4.5
    /// "`run_later`"). `tokio`'s scheduler replaces the self-pipe wakeup the
    /// original reactor used to cross threads.
    pub fn run_later<F>(&self, fun: F)
    where
        F: FnOnce() + Send + 'static,
    {
        tokio::spawn(async move { fun() });
    }

    /// Stops accepting new connections and aborts every tracked connection
    /// task (spec §4.5 "Graceful shutdown"). `tokio`'s `TcpStream` has no
    /// read-half-only shutdown, so unlike the fd-level original this closes
    /// both directions at once rather than draining in-flight writes first.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown_notify.notify_waiters();
        let connections = std::mem::take(&mut *self.connections.lock());
        for (connection_id, connection) in connections {
            connection.task.abort();
            debug!(?connection_id, "multiplexer aborted connection on shutdown");
        }
        if !self.namespace.is_empty() {
            warn!("multiplexer shut down with remote proxies still registered");
        }
    }
}
