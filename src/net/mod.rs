//! Binary peer-to-peer remoting (spec §3, modules H–M): the reactor,
//! connection state machine, routing table, and proxy layer that together
//! reconstruct a remote actor as a local [`control_block::Cell`] and forward
//! messages to it transparently.
//!
//! Grounded throughout on CAF's `libcaf_io` (`io/basp/*`,
//! `io/network/default_multiplexer.hpp`): the module boundaries below mirror
//! that library's, adapted to `tokio` supplying the reactor and async I/O
//! that CAF's own event loop otherwise provides.

mod multiplexer;
mod namespace;
mod peer;
mod proxy;
mod queue;
mod routing;
mod socket;
mod wire;

pub use multiplexer::Multiplexer;
pub use namespace::ActorNamespace;
pub use peer::{LocalIdentity, PeerStateMachine, Shared, MAX_PAYLOAD_LEN};
pub use proxy::{OutboundFrame, RemoteProxy};
pub use queue::MessageQueue;
pub use routing::{ConnectionId, Route, RoutingTable};
pub use socket::{AsyncByteStream, TokioStream};
pub use wire::{Handshake, Header, MessageType, HEADER_LEN, MAX_SIGNATURES, MAX_SIGNATURE_LEN};
