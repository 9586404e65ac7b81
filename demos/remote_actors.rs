//! Remote Actors Over TCP
//!
//! Demonstrates the peer-to-peer remoting layer: two `Multiplexer`s bind to
//! loopback TCP ports, one dials the other, and a message is forwarded
//! across the wire to a local actor on the far side via its `RemoteProxy`
//! stand-in.
//!
//! Per `net::proxy`'s documented Non-goal, this crate is not a general RPC
//! library: forwarded payloads are raw `Vec<u8>`, and turning those bytes
//! back into a typed message is the application's job. This demo just
//! prints the bytes it receives.
//!
//! Run with: cargo run --example remote_actors

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vesper_rt::control_block::{Cell, StrongHandle, WeakHandle};
use vesper_rt::error::ExitReason;
use vesper_rt::id::{ActorId, NodeId};
use vesper_rt::mailbox::{Category, MailboxElement};
use vesper_rt::net::{LocalIdentity, Multiplexer};
use vesper_rt::registry::Registry;
use vesper_rt::resumable::{ResumeResult, Resumable};

/// A minimal `Cell` that prints whatever raw bytes land in its mailbox.
/// Stands in for a real `Actor` here only because the demo wants direct
/// control over the delivered bytes; a normal local actor would be spawned
/// through `SystemHandle::spawn` instead.
struct PrinterCell {
    name: &'static str,
    received: Arc<AtomicBool>,
}

impl Resumable for PrinterCell {
    fn resume(&mut self, _budget: usize) -> ResumeResult {
        ResumeResult::Done
    }
}

impl Cell for PrinterCell {
    fn attach_self(&mut self, _weak: WeakHandle) {}

    fn enqueue(&self, element: MailboxElement) -> bool {
        if let Ok(bytes) = element.payload.downcast::<Vec<u8>>() {
            println!("  [{}] received: {}", self.name, String::from_utf8_lossy(&bytes));
            self.received.store(true, Ordering::SeqCst);
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Remote Actors Over TCP ===\n");

    let node_a = NodeId::new(vec![0xA; 16], std::process::id());
    let node_b = NodeId::new(vec![0xB; 16], std::process::id());

    let registry_a = Arc::new(Registry::new());
    let greeter_id = registry_a.next_actor_id();
    let received = Arc::new(AtomicBool::new(false));
    let greeter = StrongHandle::allocate(
        greeter_id,
        node_a.clone(),
        Box::new(PrinterCell { name: "node-a greeter", received: Arc::clone(&received) }),
    );
    registry_a.insert(greeter_id, greeter.clone());

    let registry_b = Arc::new(Registry::new());

    let multiplexer_a = Multiplexer::new(
        LocalIdentity { node_id: node_a.clone(), published_actor_id: greeter_id, interface_signatures: vec!["demo.v1".to_string()] },
        Arc::clone(&registry_a),
    );
    let multiplexer_b = Multiplexer::new(
        LocalIdentity { node_id: node_b.clone(), published_actor_id: ActorId::none(), interface_signatures: vec!["demo.v1".to_string()] },
        Arc::clone(&registry_b),
    );

    let addr: SocketAddr = "127.0.0.1:47381".parse()?;
    println!("1. Node A listening on {addr}...");
    multiplexer_a.listen(addr);
    tokio::time::sleep(Duration::from_millis(20)).await;

    println!("2. Node B dialing node A...");
    multiplexer_b.connect(addr).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("3. Node B resolving a proxy for node A's greeter and sending a message...");
    let proxy = multiplexer_b
        .proxy_for(&node_a, greeter_id)
        .ok_or("node B could not resolve a route to node A yet")?;
    let element = MailboxElement::new(None, vesper_rt::id::MessageId::none(), Box::new(b"hello from node B".to_vec()), Category::Normal);
    proxy.with_cell(|cell| cell.enqueue(element));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !received.load(Ordering::SeqCst) && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    println!("   delivered: {}", received.load(Ordering::SeqCst));

    multiplexer_a.shutdown().await;
    multiplexer_b.shutdown().await;

    println!("\n=== Example Complete ===");
    Ok(())
}
