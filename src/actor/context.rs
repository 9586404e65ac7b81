//! [`ActorContext`]: the per-resume handle passed into every actor hook.
//!
//! Borrows into the owning [`super::cell::ActorCell`]'s state rather than
//! duplicating it. `become`/`quit` can't mutate the behavior stack directly
//! mid-call (the active [`Behavior`] is itself popped out of that stack for
//! the duration of the call — see `actor::cell::Inner::consume_one`), so
//! they record a pending operation the consume loop applies afterward.

// Layer 1: Standard library imports
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

// Layer 3: Internal module imports
use crate::control_block::{StrongHandle, WeakHandle};
use crate::error::ExitReason;
use crate::id::{ActorId, MessageId, NodeId};

use super::behavior::{Behavior, BehaviorOp};
use super::response::{Awaited, ResponseHandler, ResponseResult};
use super::traits::Actor;

/// The execution-unit handle an actor's hooks run against. Lives only for
/// the duration of one `consume_one` call.
pub struct ActorContext<'a, A: Actor + ?Sized> {
    pub(crate) self_weak: &'a WeakHandle,
    pub(crate) system: &'a crate::system::SystemHandle,
    pub(crate) awaited: &'a mut VecDeque<Awaited<A>>,
    pub(crate) multiplexed: &'a mut HashMap<u64, ResponseHandler<A>>,
    pub(crate) open_streams: &'a mut HashSet<u32>,
    pub(crate) behavior_op: &'a mut Option<BehaviorOp<A>>,
    pub(crate) quit: &'a mut Option<ExitReason>,
    pub(crate) current_sender: Option<WeakHandle>,
    pub(crate) current_message_id: MessageId,
}

impl<'a, A: Actor> ActorContext<'a, A> {
    pub fn actor_id(&self) -> ActorId {
        self.self_weak.actor_id()
    }

    pub fn node_id(&self) -> &NodeId {
        self.self_weak.node_id()
    }

    pub fn self_handle(&self) -> WeakHandle {
        self.self_weak.clone()
    }

    pub fn system(&self) -> &crate::system::SystemHandle {
        self.system
    }

    /// Spawns a new, unrelated actor under the same system.
    pub fn spawn<B: Actor>(&self, actor: B) -> StrongHandle {
        self.system.spawn(actor)
    }

    /// Fire-and-forget send; no response is expected.
    pub fn send<B: Actor>(&self, target: &WeakHandle, message: B::Message) {
        self.system.send::<B>(target, message);
    }

    /// Sends `message` to `target` and installs `handler` in
    /// `awaited_responses`, keyed by the freshly allocated request id's
    /// correlation key. Returns the id so the caller can later cancel via
    /// `request_response_timeout` or track it manually.
    pub fn request<B: Actor>(
        &mut self,
        target: &WeakHandle,
        message: B::Message,
        handler: ResponseHandler<A>,
    ) -> MessageId {
        let mid = self.system.next_message_id(false);
        self.awaited.push_back(Awaited {
            key: mid.correlation_key(),
            handler,
        });
        self.system
            .send_request::<B>(target, message, mid, self.self_weak.clone());
        mid
    }

    /// Same as [`ActorContext::request`] but the handler is looked up by id
    /// rather than FIFO order (spec §3.4 `multiplexed_responses`); use this
    /// when several requests may be outstanding to the same or different
    /// actors and responses may arrive out of send order.
    pub fn request_multiplexed<B: Actor>(
        &mut self,
        target: &WeakHandle,
        message: B::Message,
        handler: ResponseHandler<A>,
    ) -> MessageId {
        let mid = self.system.next_message_id(false);
        self.multiplexed.insert(mid.correlation_key(), handler);
        self.system
            .send_request::<B>(target, message, mid, self.self_weak.clone());
        mid
    }

    /// Replies to whoever sent the message currently being handled, if any
    /// (system messages and locally-originated sends have no sender).
    pub fn reply<T: Send + 'static>(&self, value: T) {
        let Some(sender) = &self.current_sender else {
            return;
        };
        self.system.deliver_response(
            sender,
            self.current_message_id.response_id(),
            ResponseResult::Ok(Box::new(value) as Box<dyn Any + Send>),
        );
    }

    /// Schedules a synthetic timeout response for `mid`, delivered to self
    /// after `duration` unless cancelled first (spec §4.1, §5).
    pub fn request_response_timeout(&self, duration: Duration, mid: MessageId) {
        self.system
            .clock()
            .schedule_timeout(self.self_weak.clone(), duration, mid);
    }

    /// Installs a bidirectional link with `other` (spec §4.1). If `other`
    /// has already terminated, synthesizes an immediate exit notification
    /// to self instead of attaching.
    ///
    /// `other.upgrade()` alone isn't enough to tell "still alive" from
    /// "mid-`cleanup`": `cleanup` notifies attachables (step 2) before
    /// unregistering from the system (step 3, the drop that actually frees
    /// the registry's own strong ref), so a strong handle can still upgrade
    /// after `other`'s attachables have already fired their one-shot
    /// notification. Attaching here in that window would install a `Link`
    /// that never fires, so `is_terminated` is checked explicitly and
    /// treated the same as a failed upgrade.
    pub fn link_to(&self, other: &WeakHandle) {
        let attached = match other.upgrade() {
            Some(strong) => match strong.with_cell(|cell| cell.is_terminated()) {
                Some(false) => {
                    strong
                        .control_block()
                        .attachables()
                        .attach(crate::attachable::Attachable::Link {
                            peer: self.self_weak.clone(),
                        });
                    self.self_weak
                        .control_block()
                        .attachables()
                        .attach(crate::attachable::Attachable::Link { peer: other.clone() });
                    true
                }
                _ => false,
            },
            None => false,
        };
        if !attached {
            self.system
                .deliver_exit(self.self_weak, other.actor_id(), ExitReason::Normal);
        }
    }

    pub fn unlink_from(&self, other: &WeakHandle) {
        self.self_weak.control_block().attachables().detach_link(other);
        if let Some(strong) = other.upgrade() {
            strong.control_block().attachables().detach_link(self.self_weak);
        }
    }

    /// Monitors `other`: installs an [`Attachable::Monitor`][m] so this actor
    /// receives a `down` system message when `other` terminates (spec §8's
    /// round-trip law `monitor(x); x.quit(r); wait_for(down)`). If `other`
    /// has already terminated — including mid-`cleanup`, for the same reason
    /// [`ActorContext::link_to`] checks `is_terminated` — synthesizes the
    /// `down` message immediately instead of attaching.
    ///
    /// [m]: crate::attachable::Attachable::Monitor
    pub fn monitor(&self, other: &WeakHandle) {
        let attached = match other.upgrade() {
            Some(strong) => match strong.with_cell(|cell| cell.is_terminated()) {
                Some(false) => {
                    strong
                        .control_block()
                        .attachables()
                        .attach(crate::attachable::Attachable::Monitor {
                            observer: self.self_weak.clone(),
                            priority: crate::attachable::MonitorPriority::Normal,
                        });
                    true
                }
                _ => false,
            },
            None => false,
        };
        if !attached {
            self.system
                .deliver_down(self.self_weak, other.actor_id(), ExitReason::Normal);
        }
    }

    /// Registers `slot` as an open downstream/upstream batch flow, keeping
    /// the actor alive even if its behavior stack and response maps are both
    /// empty (spec §4.1 step 4's `streams` aliveness term).
    pub fn open_stream(&mut self, slot: u32) {
        self.open_streams.insert(slot);
    }

    /// Marks `slot` closed; once no streams remain, aliveness falls back to
    /// the behavior stack and outstanding responses.
    pub fn close_stream(&mut self, slot: u32) {
        self.open_streams.remove(&slot);
    }

    /// Pushes or replaces the top of the behavior stack, effective for the
    /// *next* dispatched message (spec §4.1 `become`).
    pub fn become_(&mut self, behavior: Box<dyn Behavior<A>>, keep: bool) {
        *self.behavior_op = Some(BehaviorOp { behavior, keep });
    }

    /// Requests termination once the current handler returns (spec §4.1
    /// `quit`).
    pub fn quit(&mut self, reason: ExitReason) {
        *self.quit = Some(reason);
    }
}
