//! Spec §8 scenario 2: two peers connected over an in-memory duplex stream.
//! B links to A's worker actor (a peer-originated `Link` frame, exactly what
//! `ActorContext::link_to` would cause a real connection to send). Killing
//! the worker with a custom exit reason must deliver that reason to B's
//! local watcher actor as a `SystemMessage::Exit`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use vesper_rt::attachable::SystemMessage;
use vesper_rt::control_block::{Cell, StrongHandle, WeakHandle};
use vesper_rt::error::{ExitReason, IoError};
use vesper_rt::id::{ActorId, NodeId};
use vesper_rt::mailbox::MailboxElement;
use vesper_rt::net::{
    ActorNamespace, AsyncByteStream, Header, LocalIdentity, MessageType, OutboundFrame, PeerStateMachine, RoutingTable, Shared,
};
use vesper_rt::registry::Registry;
use vesper_rt::resumable::{ResumeResult, Resumable};

struct WorkerCell {
    self_weak: Option<WeakHandle>,
    terminated: bool,
}
impl Resumable for WorkerCell {
    fn resume(&mut self, _budget: usize) -> ResumeResult {
        ResumeResult::Done
    }
}
impl Cell for WorkerCell {
    fn attach_self(&mut self, weak: WeakHandle) {
        self.self_weak = Some(weak);
    }
    fn enqueue(&self, _element: MailboxElement) -> bool {
        true
    }
    fn cleanup(&mut self, reason: ExitReason) -> bool {
        if self.terminated {
            return false;
        }
        self.terminated = true;
        if let Some(weak) = &self.self_weak {
            weak.control_block().attachables().notify_all(weak.actor_id(), &reason);
        }
        true
    }
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

struct WatcherCell {
    received: Arc<Mutex<Vec<SystemMessage>>>,
}
impl Resumable for WatcherCell {
    fn resume(&mut self, _budget: usize) -> ResumeResult {
        ResumeResult::Done
    }
}
impl Cell for WatcherCell {
    fn attach_self(&mut self, _weak: WeakHandle) {}
    fn enqueue(&self, element: MailboxElement) -> bool {
        if let Ok(message) = element.payload.downcast::<SystemMessage>() {
            self.received.lock().push(*message);
        }
        true
    }
    fn cleanup(&mut self, _reason: ExitReason) -> bool {
        true
    }
    fn is_terminated(&self) -> bool {
        false
    }
}

struct DuplexStream(tokio::io::DuplexStream);

#[async_trait]
impl AsyncByteStream for DuplexStream {
    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        use tokio::io::AsyncReadExt;
        self.0.read(buf).await.map_err(|e| IoError::Other(e.to_string()))
    }
    async fn write_some(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        use tokio::io::AsyncWriteExt;
        self.0.write(buf).await.map_err(|e| IoError::Other(e.to_string()))
    }
    async fn close(&mut self) {
        use tokio::io::AsyncWriteExt;
        let _ = self.0.shutdown().await;
    }
}

fn identity(node: NodeId, published_actor_id: ActorId) -> LocalIdentity {
    LocalIdentity { node_id: node, published_actor_id, interface_signatures: vec!["demo.v1".to_string()] }
}

#[tokio::test]
#[allow(clippy::expect_used)]
async fn killing_a_linked_remote_worker_delivers_its_exit_reason() {
    let node_a = NodeId::new(vec![1; 16], 1);
    let node_b = NodeId::new(vec![2; 16], 2);

    let registry_a = Arc::new(Registry::new());
    let worker_id = registry_a.next_actor_id();
    let worker = StrongHandle::allocate(worker_id, node_a.clone(), Box::new(WorkerCell { self_weak: None, terminated: false }));
    let worker_weak = worker.downgrade();
    worker.with_cell(|cell| cell.attach_self(worker_weak));
    registry_a.insert(worker_id, worker.clone());

    let registry_b = Arc::new(Registry::new());
    let watcher_id = registry_b.next_actor_id();
    let received = Arc::new(Mutex::new(Vec::new()));
    let watcher = StrongHandle::allocate(watcher_id, node_b.clone(), Box::new(WatcherCell { received: Arc::clone(&received) }));
    registry_b.insert(watcher_id, watcher.clone());

    let shared_a = Shared { registry: Arc::clone(&registry_a), routing: Arc::new(RoutingTable::new()), namespace: Arc::new(ActorNamespace::new()) };
    let shared_b = Shared { registry: Arc::clone(&registry_b), routing: Arc::new(RoutingTable::new()), namespace: Arc::new(ActorNamespace::new()) };

    let (a, b) = tokio::io::duplex(8192);
    let peer_a = PeerStateMachine::new(DuplexStream(a), identity(node_a.clone(), worker_id), shared_a);
    let peer_b = PeerStateMachine::new(DuplexStream(b), identity(node_b.clone(), ActorId::none()), shared_b);
    let outbound_b = peer_b.outbound_sender();

    tokio::spawn(peer_a.run());
    tokio::spawn(peer_b.run());
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Mirrors what `ActorContext::link_to` would have caused a real
    // connection to send: B asks A to attach a link from watcher to worker.
    outbound_b
        .send(OutboundFrame {
            header: Header {
                message_type: MessageType::Link,
                flags: 0,
                payload_len: 0,
                message_id: vesper_rt::id::MessageId::none(),
                source_actor_id: watcher_id,
                dest_actor_id: worker_id,
            },
            payload: Vec::new(),
        })
        .expect("send link frame");
    tokio::time::sleep(Duration::from_millis(50)).await;

    worker.with_cell(|cell| cell.cleanup(ExitReason::User("shutdown".to_string())));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let received = received.lock();
    assert_eq!(received.len(), 1, "watcher must receive exactly one lifecycle notification");
    assert_eq!(
        received[0],
        SystemMessage::Exit { actor_id: worker_id, reason: ExitReason::User("shutdown".to_string()) }
    );
}
