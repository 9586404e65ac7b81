//! [`SystemHandle`]: the "global singletons, made explicit" runtime façade
//! (spec §9) that owns the registry, scheduler, and clock, and that every
//! [`crate::actor::ActorContext`]/[`crate::actor::cell::ActorCell`] call goes
//! through rather than reaching for a process-wide static.

// Layer 1: Standard library imports
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::{debug, info};

// Layer 3: Internal module imports
use crate::actor::{Actor, ActorCell, ResponseResult};
use crate::clock::{Clock, ClockHandle};
use crate::control_block::{Cell, StrongHandle, WeakHandle};
use crate::error::{ExitReason, SystemError};
use crate::id::{ActorId, MessageId, NodeId};
use crate::mailbox::{Category, Mailbox, MailboxElement};
use crate::message::Message;
use crate::registry::Registry;
use crate::scheduler::{Scheduler, SchedulerHandle};

use super::config::SystemConfig;

struct Inner {
    node_id: NodeId,
    config: SystemConfig,
    registry: Registry,
    scheduler_handle: SchedulerHandle,
    clock_handle: ClockHandle,
    request_counter: AtomicU64,
    scheduler: Mutex<Option<Scheduler>>,
    clock: Mutex<Option<Clock>>,
    shut_down: AtomicBool,
}

/// Cheap-to-clone handle to one running runtime instance. Every actor, every
/// `ActorContext`, and every worker thread holds one of these rather than a
/// raw pointer into a process-wide singleton (spec §9's redesign of CAF's
/// `caf::actor_system`/`caf::scheduler::coordinator` statics).
#[derive(Clone)]
pub struct SystemHandle {
    inner: Arc<Inner>,
}

impl SystemHandle {
    /// Boots the scheduler and clock and returns a handle to the whole
    /// runtime. There is deliberately no registry of `SystemHandle`s
    /// themselves — each call site is expected to hold or clone the one it
    /// was given, same as CAF's `actor_system&` threaded through every
    /// `scheduled_actor`.
    pub fn start(config: SystemConfig) -> Self {
        let scheduler = Scheduler::start(config.scheduler.clone());
        let scheduler_handle = scheduler.handle.clone();
        let clock = Clock::start();
        let clock_handle = clock.handle.clone();
        info!(workers = scheduler_handle.worker_count(), "runtime started");

        SystemHandle {
            inner: Arc::new(Inner {
                node_id: NodeId::local(),
                config,
                registry: Registry::new(),
                scheduler_handle,
                clock_handle,
                request_counter: AtomicU64::new(1),
                scheduler: Mutex::new(Some(scheduler)),
                clock: Mutex::new(Some(clock)),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.inner.node_id
    }

    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.inner.scheduler_handle
    }

    pub fn clock(&self) -> &ClockHandle {
        &self.inner.clock_handle
    }

    /// Allocates the next [`MessageId`]; `high_priority` sets the wire-level
    /// urgent bit (spec §3.1).
    pub fn next_message_id(&self, high_priority: bool) -> MessageId {
        let raw = self.inner.request_counter.fetch_add(1, Ordering::Relaxed);
        MessageId::new_request(raw, high_priority)
    }

    /// Spawns `actor` under this runtime and submits it to the scheduler for
    /// its first resume. Returns the spawner's own strong handle; the
    /// registry keeps a second one alive independently (spec §4.1 "Actor
    /// lifecycle").
    pub fn spawn<A: Actor>(&self, actor: A) -> StrongHandle {
        let id = self.inner.registry.next_actor_id();
        let (mailbox, consumer) = Mailbox::new();
        let cell = ActorCell::new(actor, self.clone(), mailbox, consumer);
        let handle = StrongHandle::allocate(id, self.inner.node_id.clone(), Box::new(cell));
        let weak = handle.downgrade();
        handle.with_cell(|cell| cell.attach_self(weak));
        self.inner.registry.insert(id, handle.clone());
        self.inner.scheduler_handle.submit(handle.clone());
        debug!(actor_id = %id, "actor spawned");
        handle
    }

    /// Looks an actor up by id, for collaborators (e.g. `net::proxy`) that
    /// only have an [`ActorId`] and this handle, not a live [`WeakHandle`].
    pub fn lookup(&self, id: ActorId) -> Result<StrongHandle, SystemError> {
        self.inner.registry.lookup(id).ok_or(SystemError::ActorNotFound(id))
    }

    /// Fire-and-forget send; `B` pins the payload's concrete type so the
    /// receiving `ActorCell<B>` can downcast it back out.
    pub fn send<B: Actor>(&self, target: &WeakHandle, message: B::Message) {
        self.deliver(target, None, MessageId::none(), Box::new(message), Category::Normal);
    }

    /// Sends a correlated request: `sender` receives the eventual response
    /// tagged with `mid.response_id()` (spec §3.1).
    pub fn send_request<B: Actor>(
        &self,
        target: &WeakHandle,
        message: B::Message,
        mid: MessageId,
        sender: WeakHandle,
    ) {
        self.deliver(target, Some(sender), mid, Box::new(message), Category::Normal);
    }

    /// Delivers a correlated response (or bounce/timeout) back to `target`.
    pub fn deliver_response(&self, target: &WeakHandle, response_id: MessageId, result: ResponseResult) {
        self.deliver(
            target,
            None,
            response_id,
            Box::new(result) as Box<dyn Any + Send>,
            Category::Urgent,
        );
    }

    /// Synthesizes an `exit` system message to `target`, used when
    /// `link_to` discovers its peer already terminated (spec §4.1).
    pub fn deliver_exit(&self, target: &WeakHandle, actor_id: ActorId, reason: ExitReason) {
        let message = crate::attachable::SystemMessage::Exit { actor_id, reason };
        self.deliver(
            target,
            None,
            MessageId::none(),
            Box::new(message) as Box<dyn Any + Send>,
            Category::Urgent,
        );
    }

    /// Synthesizes a `down` system message to `target`, used when `monitor`
    /// discovers its target already terminated (spec §4.1, mirrors
    /// `deliver_exit`'s treatment of `link_to`).
    pub fn deliver_down(&self, target: &WeakHandle, actor_id: ActorId, reason: ExitReason) {
        let message = crate::attachable::SystemMessage::Down { actor_id, reason };
        self.deliver(
            target,
            None,
            MessageId::none(),
            Box::new(message) as Box<dyn Any + Send>,
            Category::Urgent,
        );
    }

    fn deliver(
        &self,
        target: &WeakHandle,
        sender: Option<WeakHandle>,
        message_id: MessageId,
        payload: Box<dyn Any + Send>,
        category: Category,
    ) {
        let Some(strong) = target.upgrade() else {
            return;
        };
        let element = MailboxElement::new(sender, message_id, payload, category);
        strong.with_cell(|cell| cell.enqueue(element));
    }

    /// Stops accepting new work and blocks until every worker thread and the
    /// clock dispatcher has exited, or `timeout` elapses (spec §4.3
    /// "Shutdown", using `SystemConfig::shutdown_timeout` when `None`).
    ///
    /// Idempotent: a second call is a no-op.
    pub fn shutdown(&self, timeout: Option<Duration>) -> Result<(), SystemError> {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let deadline_timeout = timeout.unwrap_or(self.inner.config.shutdown_timeout);
        let started = std::time::Instant::now();

        if let Some(scheduler) = self.inner.scheduler.lock().take() {
            scheduler.shutdown();
        }
        if let Some(clock) = self.inner.clock.lock().take() {
            clock.shutdown();
        }
        info!("runtime shut down");

        if started.elapsed() > deadline_timeout {
            return Err(SystemError::ShutdownTimeout(deadline_timeout));
        }
        Ok(())
    }
}
