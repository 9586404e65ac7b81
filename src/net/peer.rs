//! [`PeerStateMachine`]: per-connection handshake and message framing
//! (spec §4.6, module J).
//!
//! Grounded on `io/basp/default_peer.hpp`: an event-handler with buffered
//! writing, driven here by an async task instead of the multiplexer's
//! raw-fd callback (`tokio` already supplies the reactor — see
//! `net::socket`). State progresses
//! `wait_for_handshake -> wait_for_header -> read_message(N) -> wait_for_header`,
//! collapsing to `closed` on any I/O error (spec §4.6).

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use bytes::{Buf, BufMut, BytesMut};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

// Layer 3: Internal module imports
use crate::attachable::{Attachable, MonitorPriority};
use crate::control_block::{Cell, StrongHandle, WeakHandle};
use crate::error::{ExitReason, IoError};
use crate::id::{ActorId, MessageId, NodeId};
use crate::mailbox::{Category, MailboxElement};
use crate::registry::Registry;

use super::namespace::ActorNamespace;
use super::proxy::{OutboundFrame, RemoteProxy};
use super::queue::MessageQueue;
use super::routing::{ConnectionId, RoutingTable};
use super::socket::AsyncByteStream;
use super::wire::{Handshake, Header, MessageType, HEADER_LEN, MAX_SIGNATURES, MAX_SIGNATURE_LEN};

/// Per-connection payload cap (spec §4.6: "bounded by a per-connection
/// max"). Frames claiming more are treated as malformed rather than read.
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

/// Identity and capabilities this node advertises during the handshake.
#[derive(Clone)]
pub struct LocalIdentity {
    pub node_id: NodeId,
    pub published_actor_id: ActorId,
    pub interface_signatures: Vec<String>,
}

/// Shared substrate state a [`PeerStateMachine`] reaches into while
/// dispatching decoded frames.
pub struct Shared {
    pub registry: Arc<Registry>,
    pub routing: Arc<RoutingTable>,
    pub namespace: Arc<ActorNamespace>,
}

enum State {
    WaitForHandshake,
    WaitForHeader,
    ReadMessage(Header),
    Closed,
}

/// One peer connection: handshake exchange, then a header/payload framing
/// loop, generic over the byte-stream backend (spec §6).
pub struct PeerStateMachine<S: AsyncByteStream> {
    stream: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
    outbound: UnboundedReceiver<OutboundFrame>,
    outbound_tx: UnboundedSender<OutboundFrame>,
    local: LocalIdentity,
    shared: Shared,
    connection_id: ConnectionId,
    peer_node: Option<NodeId>,
    queue: MessageQueue,
    /// Proxies this side created for actors living on the peer, keyed by
    /// their id on the peer's node. Holds the owning [`StrongHandle`]: a
    /// proxy attached to a peer-originated `Monitor`/`Link`, or merely
    /// pre-registered by `AnnounceProxy`, has no other owner, so without
    /// this the attach would be notifying a handle that died the instant
    /// `dispatch` returned. `KillProxy` and connection failure are the two
    /// paths that ever drop an entry back out (spec §4.8).
    remote_proxies: HashMap<ActorId, StrongHandle>,
    state: State,
}

impl<S: AsyncByteStream> PeerStateMachine<S> {
    pub fn new(stream: S, local: LocalIdentity, shared: Shared) -> Self {
        let (outbound_tx, outbound) = mpsc::unbounded_channel();
        PeerStateMachine {
            stream,
            read_buf: BytesMut::new(),
            write_buf: BytesMut::new(),
            outbound,
            outbound_tx,
            local,
            shared,
            connection_id: ConnectionId::next(),
            peer_node: None,
            queue: MessageQueue::new(),
            remote_proxies: HashMap::new(),
            state: State::WaitForHandshake,
        }
    }

    /// A sender new [`RemoteProxy`]s targeting this connection's peer should
    /// forward frames through.
    pub fn outbound_sender(&self) -> UnboundedSender<OutboundFrame> {
        self.outbound_tx.clone()
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Drives the connection until it closes, one way or another. Runs the
    /// handshake first, then alternates between draining the outbound queue
    /// and reading the next frame (spec §4.6's buffered write path). Writes
    /// queued while a read is in flight drain at the top of the next loop
    /// iteration rather than preempting it — true interleaving of the two
    /// belongs to the multiplexer (H) fanning many connections across one
    /// reactor, which this per-connection task approximates.
    pub async fn run(mut self) {
        if let Err(err) = self.handshake().await {
            warn!(error = %err, "peer handshake failed");
            self.fail(err).await;
            return;
        }
        loop {
            while let Ok(frame) = self.outbound.try_recv() {
                if let Err(err) = self.write_frame(frame).await {
                    warn!(error = %err, "peer write failed");
                    self.fail(err).await;
                    return;
                }
            }
            if let Err(err) = self.step().await {
                debug!(error = %err, "peer connection closed");
                self.fail(err).await;
                return;
            }
            if matches!(self.state, State::Closed) {
                return;
            }
        }
    }

    async fn handshake(&mut self) -> Result<(), IoError> {
        let outgoing = Handshake {
            published_actor_id: self.local.published_actor_id,
            process_id: self.local.node_id.process_id(),
            host_hash: self.local.node_id.host_hash().to_vec(),
            interface_signatures: self.local.interface_signatures.clone(),
        };
        self.write_all(&outgoing.encode()).await?;

        let incoming = self.read_handshake().await?;
        let peer_node = NodeId::new(incoming.host_hash, incoming.process_id);

        if peer_node == self.local.node_id {
            // Loopback: collapse to the local registry, no routing entry needed.
            debug!("peer handshake resolved to local node, skipping route registration");
        } else {
            self.shared.routing.insert_direct(peer_node.clone(), self.connection_id);
        }
        self.peer_node = Some(peer_node);
        self.state = State::WaitForHeader;
        Ok(())
    }

    async fn read_handshake(&mut self) -> Result<Handshake, IoError> {
        let mut buf = BytesMut::new();

        let head = self.read_n(12).await?;
        buf.extend_from_slice(&head);
        let host_hash_len = u32::from_be_bytes(head[8..12].try_into().unwrap()) as usize;

        let host_hash = self.read_n(host_hash_len).await?;
        buf.extend_from_slice(&host_hash);

        let count_bytes = self.read_n(4).await?;
        buf.extend_from_slice(&count_bytes);
        let count = u32::from_be_bytes(count_bytes[..4].try_into().unwrap());
        if count > MAX_SIGNATURES {
            return Err(IoError::HandshakeFailed(format!(
                "signature count {count} exceeds {MAX_SIGNATURES}"
            )));
        }

        for _ in 0..count {
            let len_bytes = self.read_n(4).await?;
            buf.extend_from_slice(&len_bytes);
            let len = u32::from_be_bytes(len_bytes[..4].try_into().unwrap());
            if len > MAX_SIGNATURE_LEN {
                return Err(IoError::HandshakeFailed(format!(
                    "signature length {len} exceeds {MAX_SIGNATURE_LEN}"
                )));
            }
            let sig = self.read_n(len as usize).await?;
            buf.extend_from_slice(&sig);
        }

        Handshake::decode(&buf)
    }

    /// One iteration of the header/payload framing loop (spec §4.6).
    async fn step(&mut self) -> Result<(), IoError> {
        match &self.state {
            State::WaitForHeader => {
                let bytes = self.read_n(HEADER_LEN).await?;
                let header = Header::decode(&bytes)?;
                if header.payload_len > MAX_PAYLOAD_LEN {
                    return Err(IoError::MalformedFrame(format!(
                        "payload_len {} exceeds {MAX_PAYLOAD_LEN}",
                        header.payload_len
                    )));
                }
                self.state = State::ReadMessage(header);
                Ok(())
            }
            State::ReadMessage(header) => {
                let header = *header;
                let payload = self.read_n(header.payload_len as usize).await?;
                self.dispatch(header, payload.to_vec());
                self.state = State::WaitForHeader;
                Ok(())
            }
            State::WaitForHandshake | State::Closed => Ok(()),
        }
    }

    fn dispatch(&mut self, header: Header, payload: Vec<u8>) {
        let Some(peer_node) = self.peer_node.clone() else {
            return;
        };
        let id = self.queue.new_id();
        let receiver = self.shared.registry.lookup(header.dest_actor_id);
        let Some(receiver) = receiver else {
            self.queue.drop_id(id);
            debug!(dest = %header.dest_actor_id, "dropping frame for unknown local actor");
            return;
        };
        let sender = self.sender_proxy_for(&peer_node, header.source_actor_id);

        let ready = match header.message_type {
            MessageType::DirectMessage => {
                let element = MailboxElement::new(sender, header.message_id, Box::new(payload), Category::Normal);
                self.queue.push(id, receiver.downgrade(), element)
            }
            MessageType::Monitor => {
                receiver.attachables().attach(Attachable::Monitor {
                    observer: self.proxy_handle_for(&peer_node, header.source_actor_id).downgrade(),
                    priority: MonitorPriority::Normal,
                });
                self.queue.drop_id(id);
                Vec::new()
            }
            MessageType::Link => {
                receiver.attachables().attach(Attachable::Link {
                    peer: self.proxy_handle_for(&peer_node, header.source_actor_id).downgrade(),
                });
                self.queue.drop_id(id);
                Vec::new()
            }
            MessageType::Unlink => {
                receiver
                    .attachables()
                    .detach_link(&self.proxy_handle_for(&peer_node, header.source_actor_id).downgrade());
                self.queue.drop_id(id);
                Vec::new()
            }
            MessageType::Down => {
                let message = super::wire::decode_lifecycle_message(header.source_actor_id, &payload);
                let element = MailboxElement::new(None, MessageId::none(), Box::new(message), Category::Urgent);
                self.queue.push(id, receiver.downgrade(), element)
            }
            MessageType::AnnounceProxy => {
                let _ = self.proxy_handle_for(&peer_node, header.source_actor_id);
                self.queue.drop_id(id);
                Vec::new()
            }
            MessageType::KillProxy => {
                if let Some(strong) = self.remote_proxies.remove(&header.source_actor_id) {
                    strong.with_cell(|cell| cell.cleanup(ExitReason::Normal));
                }
                self.queue.drop_id(id);
                Vec::new()
            }
        };

        for (target, element) in ready {
            if let Some(strong) = target.upgrade() {
                if !strong.with_cell(|cell| cell.enqueue(element)).unwrap_or(false) {
                    warn!(actor_id = %strong.control_block().actor_id, "dropped frame on terminated local actor");
                }
            }
        }
    }

    /// Lazily builds (or reuses) the local [`RemoteProxy`] standing in for
    /// `actor_id` on `peer_node`, used as a message's sender identity.
    fn sender_proxy_for(&mut self, peer_node: &NodeId, actor_id: ActorId) -> Option<WeakHandle> {
        if !actor_id.is_some() {
            return None;
        }
        Some(self.proxy_handle_for(peer_node, actor_id).downgrade())
    }

    fn proxy_handle_for(&mut self, peer_node: &NodeId, actor_id: ActorId) -> StrongHandle {
        let outbound = self.outbound_tx.clone();
        let namespace = Arc::clone(&self.shared.namespace);
        let handle = namespace.get_or_put(peer_node.clone(), actor_id, || {
            StrongHandle::allocate(actor_id, peer_node.clone(), Box::new(RemoteProxy::new(actor_id, peer_node.clone(), outbound)))
        });
        self.remote_proxies.insert(actor_id, handle.clone());
        handle
    }

    async fn write_frame(&mut self, frame: OutboundFrame) -> Result<(), IoError> {
        self.write_buf.put(frame.header.encode());
        self.write_buf.put_slice(&frame.payload);
        self.flush().await
    }

    /// Drains `write_buf`, rotating the head forward on a short write (spec
    /// §4.6's buffered write path).
    async fn flush(&mut self) -> Result<(), IoError> {
        while !self.write_buf.is_empty() {
            let n = self.stream.write_some(&self.write_buf).await?;
            if n == 0 {
                return Err(IoError::ConnectionClosed);
            }
            self.write_buf.advance(n);
        }
        Ok(())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        self.write_buf.put_slice(bytes);
        self.flush().await
    }

    /// Reads exactly `n` bytes, buffering any extra the backend handed back
    /// in one call for the next read (spec §4.6 payload framing).
    async fn read_n(&mut self, n: usize) -> Result<BytesMut, IoError> {
        let mut scratch = [0u8; 4096];
        while self.read_buf.len() < n {
            let read = self.stream.read_some(&mut scratch).await?;
            if read == 0 {
                return Err(IoError::ConnectionClosed);
            }
            self.read_buf.extend_from_slice(&scratch[..read]);
        }
        Ok(self.read_buf.split_to(n))
    }

    /// Tears the connection down: erases its direct route (cascading
    /// indirect invalidation), tombstones every proxy for the peer's node,
    /// and closes the backend (spec §4.6 "Failure").
    async fn fail(&mut self, _err: IoError) {
        self.state = State::Closed;
        if let Some(peer_node) = &self.peer_node {
            self.shared.routing.remove_direct(peer_node);
            self.shared.namespace.erase(peer_node);
        }
        for (actor_id, strong) in self.remote_proxies.drain() {
            strong.with_cell(|cell| cell.cleanup(ExitReason::Normal));
            // A local actor may be linked to this now-unreachable remote
            // actor (via a peer-originated `Link` frame attaching onto the
            // proxy's own control block, or `ctx.link_to` on our own side).
            // Notify it the same way a graceful `Down` frame would have, so
            // the connection dying has the same observable effect as the
            // remote actor dying.
            strong.control_block().attachables().notify_all(actor_id, &ExitReason::Normal);
        }
        self.stream.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExitReason as ER;
    use crate::resumable::{ResumeResult, Resumable};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct RecordingCell {
        sink: std::sync::Arc<parking_lot::Mutex<Vec<u8>>>,
    }
    impl Resumable for RecordingCell {
        fn resume(&mut self, _budget: usize) -> ResumeResult {
            ResumeResult::Done
        }
    }
    impl Cell for RecordingCell {
        fn attach_self(&mut self, _weak: WeakHandle) {}
        fn enqueue(&self, element: MailboxElement) -> bool {
            if let Ok(bytes) = element.payload.downcast::<Vec<u8>>() {
                self.sink.lock().extend_from_slice(&bytes);
            }
            true
        }
        fn cleanup(&mut self, _reason: ER) -> bool {
            true
        }
        fn is_terminated(&self) -> bool {
            false
        }
    }

    struct DuplexStream(tokio::io::DuplexStream);

    #[async_trait::async_trait]
    impl AsyncByteStream for DuplexStream {
        async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
            self.0.read(buf).await.map_err(|e| IoError::Other(e.to_string()))
        }
        async fn write_some(&mut self, buf: &[u8]) -> Result<usize, IoError> {
            self.0.write(buf).await.map_err(|e| IoError::Other(e.to_string()))
        }
        async fn close(&mut self) {
            let _ = self.0.shutdown().await;
        }
    }

    fn identity(tag: u8) -> LocalIdentity {
        LocalIdentity {
            node_id: NodeId::new(vec![tag; 16], tag as u32),
            published_actor_id: ActorId::none(),
            interface_signatures: vec!["demo.v1".to_string()],
        }
    }

    #[tokio::test]
    async fn handshake_exchanges_peer_node_id_and_registers_direct_route() {
        let (a, b) = tokio::io::duplex(4096);
        let shared_a = Shared {
            registry: Arc::new(Registry::new()),
            routing: Arc::new(RoutingTable::new()),
            namespace: Arc::new(ActorNamespace::new()),
        };
        let shared_b = Shared {
            registry: Arc::new(Registry::new()),
            routing: Arc::new(RoutingTable::new()),
            namespace: Arc::new(ActorNamespace::new()),
        };
        let routing_a = Arc::clone(&shared_a.routing);

        let mut peer_a = PeerStateMachine::new(DuplexStream(a), identity(1), shared_a);
        let mut peer_b = PeerStateMachine::new(DuplexStream(b), identity(2), shared_b);

        let (r1, r2) = tokio::join!(peer_a.handshake(), peer_b.handshake());
        r1.expect("a handshake");
        r2.expect("b handshake");

        assert_eq!(peer_a.peer_node.unwrap(), NodeId::new(vec![2; 16], 2));
        assert!(routing_a.is_direct(&NodeId::new(vec![2; 16], 2)));
    }

    #[tokio::test]
    async fn direct_message_frame_delivers_payload_to_registered_actor() {
        let (a, b) = tokio::io::duplex(4096);
        let registry = Arc::new(Registry::new());
        let sink = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let actor_id = registry.next_actor_id();
        registry.insert(
            actor_id,
            StrongHandle::allocate(actor_id, NodeId::local(), Box::new(RecordingCell { sink: std::sync::Arc::clone(&sink) })),
        );
        let shared_recv = Shared {
            registry: Arc::clone(&registry),
            routing: Arc::new(RoutingTable::new()),
            namespace: Arc::new(ActorNamespace::new()),
        };
        let shared_send = Shared {
            registry: Arc::new(Registry::new()),
            routing: Arc::new(RoutingTable::new()),
            namespace: Arc::new(ActorNamespace::new()),
        };

        let mut receiver_peer = PeerStateMachine::new(DuplexStream(a), identity(1), shared_recv);
        let mut sender_peer = PeerStateMachine::new(DuplexStream(b), identity(2), shared_send);
        let (hr, hs) = tokio::join!(receiver_peer.handshake(), sender_peer.handshake());
        hr.expect("receiver handshake");
        hs.expect("sender handshake");

        let header = Header {
            message_type: MessageType::DirectMessage,
            flags: 0,
            payload_len: 5,
            message_id: MessageId::none(),
            source_actor_id: ActorId::none(),
            dest_actor_id: actor_id,
        };
        sender_peer
            .write_all(&header.encode())
            .await
            .expect("write header");
        sender_peer.write_all(b"hello").await.expect("write payload");

        receiver_peer.step().await.expect("read header");
        receiver_peer.step().await.expect("read payload");

        assert_eq!(sink.lock().as_slice(), b"hello");
    }

    /// A byte-stream double whose `write_some` never accepts more than
    /// `cap` bytes per call, regardless of how much the caller offers —
    /// simulates a socket reporting short writes under backpressure.
    struct ShortWriteStream {
        sink: std::sync::Arc<parking_lot::Mutex<Vec<u8>>>,
        cap: usize,
    }

    #[async_trait::async_trait]
    impl AsyncByteStream for ShortWriteStream {
        async fn read_some(&mut self, _buf: &mut [u8]) -> Result<usize, IoError> {
            Ok(0)
        }
        async fn write_some(&mut self, buf: &[u8]) -> Result<usize, IoError> {
            let n = buf.len().min(self.cap);
            self.sink.lock().extend_from_slice(&buf[..n]);
            Ok(n)
        }
        async fn close(&mut self) {}
    }

    #[tokio::test]
    #[allow(clippy::expect_used)]
    async fn write_frame_retains_the_unwritten_suffix_across_short_writes() {
        let sink = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let stream = ShortWriteStream { sink: std::sync::Arc::clone(&sink), cap: 3 };
        let shared = Shared {
            registry: Arc::new(Registry::new()),
            routing: Arc::new(RoutingTable::new()),
            namespace: Arc::new(ActorNamespace::new()),
        };
        let mut peer = PeerStateMachine::new(stream, identity(1), shared);

        let payload = b"a payload long enough to need several short writes".to_vec();
        let header = Header {
            message_type: MessageType::DirectMessage,
            flags: 0,
            payload_len: payload.len() as u32,
            message_id: MessageId::none(),
            source_actor_id: ActorId::from_raw(1),
            dest_actor_id: ActorId::from_raw(2),
        };
        let expected: Vec<u8> = header.encode().iter().copied().chain(payload.iter().copied()).collect();

        peer.write_frame(OutboundFrame { header, payload: payload.clone() })
            .await
            .expect("write_frame must drain fully despite short writes");

        assert_eq!(sink.lock().as_slice(), expected.as_slice());
    }
}
