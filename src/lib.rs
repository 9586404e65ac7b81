//! # vesper-rt — process-local actor runtime with binary peer-to-peer remoting
//!
//! A work-stealing, message-passing actor runtime built around typed
//! mailboxes, cooperative scheduling, and an explicit [`system::SystemHandle`]
//! in place of process-wide singletons. The design follows the C++ Actor
//! Framework's `scheduled_actor`/`resumable` split, adapted to Rust's
//! ownership model: actors are driven by `async fn handle_message` instead
//! of a behavior stack, and every collaborator threads a cloned
//! [`system::SystemHandle`] rather than reaching for a global.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vesper_rt::prelude::*;
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! struct Increment;
//!
//! impl Message for Increment {
//!     const KIND: &'static str = "counter.increment";
//! }
//!
//! struct Counter {
//!     count: u64,
//! }
//!
//! #[async_trait]
//! impl Actor for Counter {
//!     type Message = Increment;
//!     type Error = std::convert::Infallible;
//!
//!     async fn handle_message(
//!         &mut self,
//!         _message: Increment,
//!         _ctx: &mut ActorContext<'_, Self>,
//!     ) -> Result<(), Self::Error> {
//!         self.count += 1;
//!         Ok(())
//!     }
//! }
//!
//! fn main() {
//!     let system = SystemHandle::start(SystemConfig::default());
//!     let handle = system.spawn(Counter { count: 0 });
//!     system.send::<Counter>(&handle.downgrade(), Increment);
//!     system.shutdown(None).expect("shutdown");
//! }
//! ```
//!
//! # Module Organization
//!
//! ## Core actor system
//! - [`actor`] — the `Actor`/`Behavior` traits, `ActorContext`, and the
//!   scheduler-facing `ActorCell`.
//! - [`message`] — the `Message` trait every payload type implements.
//! - [`mailbox`] — bounded, priority-banded mailbox with backpressure.
//! - [`control_block`] — the strong/weak handle pair and the type-erased
//!   `Cell` trait the scheduler drives.
//! - [`attachable`] — link/monitor bookkeeping and exit-reason propagation.
//! - [`registry`] — process-local actor id → handle directory.
//!
//! ## Runtime
//! - [`scheduler`] — the work-stealing worker pool.
//! - [`clock`] — the single-writer timer dispatcher behind request timeouts
//!   and periodic scheduling.
//! - [`system`] — [`system::SystemConfig`] and [`system::SystemHandle`], the
//!   runtime façade every collaborator holds.
//!
//! ## Remoting
//! - [`net`] — the binary peer-to-peer wire protocol, connection state
//!   machine, and routing table for actors that live on other nodes.
//!
//! ## Observability
//! - [`monitoring`] — pluggable event sinks for actor/system/mailbox events.
//!
//! ## Shared types
//! - [`id`] — `ActorId`, `NodeId`, `MessageId`.
//! - [`error`] — the crate's error taxonomy (`SystemError`, `ExitReason`,
//!   `RequestError`, `RuntimeError`, ...).
//! - [`resumable`] — the `Resumable` trait bridging actors to the scheduler.
//! - [`util`] — small serde helpers shared across config types.

pub mod actor;
pub mod attachable;
pub mod clock;
pub mod control_block;
pub mod error;
pub mod id;
pub mod mailbox;
pub mod message;
pub mod monitoring;
pub mod net;
pub mod prelude;
pub mod registry;
pub mod resumable;
pub mod scheduler;
pub mod system;
pub mod util;

pub use actor::{Actor, ActorContext, Behavior, ErrorAction};
pub use error::{ExitReason, RequestError, RuntimeError, SystemError};
pub use id::{ActorId, MessageId, NodeId};
pub use message::Message;
pub use system::{SystemConfig, SystemHandle};
