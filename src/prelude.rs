//! Convenient single-import surface for building actors on this runtime.
//!
//! ```rust,ignore
//! use vesper_rt::prelude::*;
//! ```
//!
//! # What's included
//!
//! ## Core actor system
//! - [`Actor`], [`ActorContext`], [`Behavior`], [`ErrorAction`] — the traits
//!   and context every actor implementation touches.
//! - [`Message`] — the payload marker trait.
//! - [`Cell`], [`StrongHandle`], [`WeakHandle`] — the scheduler-facing
//!   handle pair behind every actor and remote proxy.
//! - [`Category`], [`MailboxElement`] — mailbox primitives exposed to
//!   `ActorContext`-level code.
//! - [`Attachable`], [`MonitorPriority`], [`SystemMessage`] — link/monitor
//!   bookkeeping.
//!
//! ## Runtime
//! - [`SystemConfig`], [`SystemConfigBuilder`], [`SystemHandle`] — boot and
//!   drive a runtime instance.
//! - [`Registry`] — the actor id → handle directory.
//!
//! ## Errors and identifiers
//! - [`ActorId`], [`MessageId`], [`NodeId`] — the crate's identifier types.
//! - [`ExitReason`], [`RequestError`], [`RuntimeError`], [`SystemError`] — the
//!   error taxonomy.
//!
//! ## Monitoring
//! - [`Monitor`], [`MonitoringEvent`], [`EventSeverity`] — the observation
//!   trait surface.
//! - [`InMemoryMonitor`], [`NoopMonitor`] — the two shipped sinks.
//!
//! # Example
//!
//! ```rust,ignore
//! use vesper_rt::prelude::*;
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! struct Ping;
//!
//! impl Message for Ping {
//!     const KIND: &'static str = "demo.ping";
//! }
//!
//! struct Counter {
//!     count: u64,
//! }
//!
//! #[async_trait]
//! impl Actor for Counter {
//!     type Message = Ping;
//!     type Error = std::convert::Infallible;
//!
//!     async fn handle_message(
//!         &mut self,
//!         _message: Ping,
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
//!     system.send::<Counter>(&handle.downgrade(), Ping);
//!     system.shutdown(None).expect("shutdown");
//! }
//! ```

// Core actor system
pub use crate::actor::{Actor, ActorContext, Behavior, ErrorAction, ResponseResult};
pub use crate::attachable::{Attachable, MonitorPriority, SystemMessage};
pub use crate::control_block::{Cell, StrongHandle, WeakHandle};
pub use crate::mailbox::{Category, MailboxElement};
pub use crate::message::Message;

// Runtime
pub use crate::registry::Registry;
pub use crate::system::{SystemConfig, SystemConfigBuilder, SystemHandle};

// Errors and identifiers
pub use crate::error::{ExitReason, RequestError, RuntimeError, SystemError};
pub use crate::id::{ActorId, MessageId, NodeId};

// Monitoring
pub use crate::monitoring::{EventSeverity, InMemoryMonitor, Monitor, MonitoringEvent, NoopMonitor};
