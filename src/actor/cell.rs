//! [`ActorCell`]: the concrete [`Cell`] + [`Resumable`] implementation,
//! generic over one [`Actor`] type, that every `ControlBlock` boxes up
//! (spec §4.1).
//!
//! Everything non-`&self` in here (the behavior stack, the response maps,
//! `consumer`) is touched only while the owning `ControlBlock`'s cell lock
//! is held — `with_cell` hands out one `&mut dyn Cell` shared by the
//! mailbox-enqueue path, the scheduler's `resume`, and `cleanup`, so there
//! is never more than one writer.

// Layer 1: Standard library imports
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

// Layer 2: Third-party crate imports
use tracing::{trace, warn};

// Layer 3: Internal module imports
use crate::attachable::SystemMessage;
use crate::control_block::{Cell, WeakHandle};
use crate::error::{ExitReason, RequestError};
use crate::id::{ActorId, MessageId};
use crate::mailbox::{Mailbox, MailboxConsumer, MailboxElement, PopResult, PushOutcome};
use crate::message::Message;
use crate::resumable::{ResumeResult, Resumable};
use crate::system::SystemHandle;

use super::behavior::{Behavior, BehaviorOp, DefaultBehavior};
use super::context::ActorContext;
use super::response::{Awaited, ResponseHandler, ResponseResult};
use super::traits::{Actor, ErrorAction};

thread_local! {
    // Scheduler workers are plain std threads, not tokio tasks (spec §4.3's
    // work-stealing pool is bespoke). `Actor::handle_message` and friends are
    // still `async fn` for ergonomic parity with the rest of the crate's
    // async-trait surface, so each worker drives them to completion on a
    // lightweight current-thread runtime of its own rather than pulling the
    // whole scheduler onto tokio's.
    static LOCAL_RT: RefCell<tokio::runtime::Runtime> = RefCell::new(
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("failed to build actor cell's local tokio runtime"),
    );
}

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    LOCAL_RT.with(|rt| rt.borrow().block_on(fut))
}

enum DispatchOutcome {
    Handled,
    Skipped,
}

pub struct ActorCell<A: Actor> {
    self_weak: OnceLock<WeakHandle>,
    system: SystemHandle,
    mailbox: Mailbox,
    consumer: MailboxConsumer,
    actor: A,
    behavior_stack: Vec<Box<dyn Behavior<A>>>,
    awaited: VecDeque<Awaited<A>>,
    multiplexed: HashMap<u64, ResponseHandler<A>>,
    open_streams: HashSet<u32>,
    pending_cache: VecDeque<MailboxElement>,
    started: bool,
    terminated: bool,
    traps_exit: bool,
}

impl<A: Actor> ActorCell<A> {
    pub fn new(actor: A, system: SystemHandle, mailbox: Mailbox, consumer: MailboxConsumer) -> Self {
        ActorCell {
            self_weak: OnceLock::new(),
            system,
            mailbox,
            consumer,
            actor,
            behavior_stack: vec![Box::new(DefaultBehavior)],
            awaited: VecDeque::new(),
            multiplexed: HashMap::new(),
            open_streams: HashSet::new(),
            pending_cache: VecDeque::new(),
            started: false,
            terminated: false,
            traps_exit: false,
        }
    }

    /// Whether subsequently-received `exit` system messages should be routed
    /// through `handle_down`-style delivery instead of the default
    /// propagate-and-quit. Not yet exposed on [`Actor`]; defaults to `false`
    /// (CAF's own default: actors do not trap exits unless they opt in).
    pub fn set_traps_exit(&mut self, traps_exit: bool) {
        self.traps_exit = traps_exit;
    }

    fn self_weak(&self) -> &WeakHandle {
        self.self_weak
            .get()
            .expect("attach_self must run before the first resume")
    }

    fn is_alive(&self) -> bool {
        !self.behavior_stack.is_empty()
            || !self.awaited.is_empty()
            || !self.multiplexed.is_empty()
            || !self.open_streams.is_empty()
    }

    fn apply_behavior_op(&mut self, op: Option<BehaviorOp<A>>) {
        if let Some(BehaviorOp { behavior, keep }) = op {
            if !keep {
                self.behavior_stack.pop();
            }
            self.behavior_stack.push(behavior);
        }
    }

    /// `quit(reason)`: drains the behavior stack so the next aliveness check
    /// sees the actor as done (spec §4.1 `quit`) — unless it still has open
    /// streams, which per the aliveness formula (step 4) keep it alive until
    /// `close_stream` drains them, the same way an outstanding `awaited`
    /// response would.
    fn apply_quit(&mut self, reason: Option<ExitReason>) {
        if reason.is_some() {
            self.behavior_stack.clear();
        }
    }

    fn run_pre_start(&mut self) {
        let self_weak = self.self_weak().clone();
        let mut behavior_op = None;
        let mut quit = None;
        let result = {
            let mut ctx = ActorContext {
                self_weak: &self_weak,
                system: &self.system,
                awaited: &mut self.awaited,
                multiplexed: &mut self.multiplexed,
                open_streams: &mut self.open_streams,
                behavior_op: &mut behavior_op,
                quit: &mut quit,
                current_sender: None,
                current_message_id: MessageId::none(),
            };
            block_on(self.actor.pre_start(&mut ctx))
        };
        self.apply_behavior_op(behavior_op);
        match result {
            Ok(()) => self.apply_quit(quit),
            Err(err) => {
                warn!(error = %err, "pre_start failed; terminating actor");
                self.apply_quit(Some(ExitReason::UnhandledException(err.to_string())));
            }
        }
    }

    fn dispatch(&mut self, element: MailboxElement) -> DispatchOutcome {
        if element.message_id.is_response() {
            self.dispatch_response(element)
        } else if element.payload.is::<SystemMessage>() {
            self.dispatch_system(element);
            DispatchOutcome::Handled
        } else {
            self.dispatch_ordinary(element);
            DispatchOutcome::Handled
        }
    }

    /// response-awaited: pop the matching entry from `awaited_responses` if
    /// it's at the head, or from `multiplexed_responses` by key; otherwise
    /// skip and cache it for a later sweep (spec §4.1 step 2).
    fn dispatch_response(&mut self, element: MailboxElement) -> DispatchOutcome {
        let key = element.message_id.correlation_key();
        let at_head = matches!(self.awaited.front(), Some(a) if a.key == key);
        if !at_head && !self.multiplexed.contains_key(&key) {
            self.pending_cache.push_back(element);
            return DispatchOutcome::Skipped;
        }
        let handler = if at_head {
            self.awaited
                .pop_front()
                .expect("front checked to match key above")
                .handler
        } else {
            self.multiplexed
                .remove(&key)
                .expect("contains_key checked above")
        };
        let mid = element.message_id;
        let sender = element.sender.clone();
        let result = match element.payload.downcast::<ResponseResult>() {
            Ok(boxed) => *boxed,
            Err(_) => {
                warn!(%mid, "response payload had an unexpected concrete type");
                ResponseResult::Err(RequestError::InvalidDelegate)
            }
        };
        let self_weak = self.self_weak().clone();
        let mut behavior_op = None;
        let mut quit = None;
        {
            let mut ctx = ActorContext {
                self_weak: &self_weak,
                system: &self.system,
                awaited: &mut self.awaited,
                multiplexed: &mut self.multiplexed,
                open_streams: &mut self.open_streams,
                behavior_op: &mut behavior_op,
                quit: &mut quit,
                current_sender: sender,
                current_message_id: mid,
            };
            handler(&mut self.actor, result, &mut ctx);
        }
        self.apply_behavior_op(behavior_op);
        self.apply_quit(quit);
        DispatchOutcome::Handled
    }

    /// internal: the type-specific default hooks for `exit`/`down`/
    /// `node-down`/`error` (spec §4.1 "Failure semantics"). `open-stream" is
    /// handled directly through `ActorContext::open_stream` rather than a
    /// dispatched message, since it's the actor declaring its own state
    /// rather than something delivered to it.
    fn dispatch_system(&mut self, element: MailboxElement) {
        let msg = match element.payload.downcast::<SystemMessage>() {
            Ok(boxed) => *boxed,
            Err(_) => return,
        };
        match msg {
            SystemMessage::Down { actor_id, reason } => self.run_handle_down(actor_id, reason),
            SystemMessage::Exit { actor_id, reason } => {
                if self.traps_exit {
                    trace!(%actor_id, %reason, "exit message suppressed: actor traps exits");
                } else {
                    self.apply_quit(Some(reason));
                }
            }
            SystemMessage::NodeDown { node_id, reason } => {
                trace!(%node_id, %reason, "node-down message (no node-monitor hook installed): dropping");
            }
            SystemMessage::Error(err) => {
                warn!(error = %err, "stream error delivered; terminating actor");
                self.apply_quit(Some(ExitReason::UnhandledException(err.to_string())));
            }
        }
    }

    /// Delivers a `down` message to `Actor::handle_down` (spec §4.1 "down" ⇒
    /// delegate to user callback), applying whatever `become`/`quit` the
    /// handler requested the same way ordinary dispatch does.
    fn run_handle_down(&mut self, actor_id: ActorId, reason: ExitReason) {
        let self_weak = self.self_weak().clone();
        let mut behavior_op = None;
        let mut quit = None;
        let result = {
            let mut ctx = ActorContext {
                self_weak: &self_weak,
                system: &self.system,
                awaited: &mut self.awaited,
                multiplexed: &mut self.multiplexed,
                open_streams: &mut self.open_streams,
                behavior_op: &mut behavior_op,
                quit: &mut quit,
                current_sender: None,
                current_message_id: MessageId::none(),
            };
            block_on(self.actor.handle_down(actor_id, reason, &mut ctx))
        };
        self.apply_behavior_op(behavior_op);
        match result {
            Ok(()) => self.apply_quit(quit),
            Err(err) => {
                warn!(error = %err, %actor_id, "handle_down failed; terminating actor");
                self.apply_quit(Some(ExitReason::UnhandledException(err.to_string())));
            }
        }
    }

    /// ordinary: dispatch to the top of the behavior stack, falling back to
    /// the "print and drop" default when the payload doesn't match
    /// `A::Message` or the stack is empty.
    fn dispatch_ordinary(&mut self, element: MailboxElement) {
        let mid = element.message_id;
        let sender = element.sender.clone();
        let message = match element.payload.downcast::<A::Message>() {
            Ok(boxed) => *boxed,
            Err(_) => {
                warn!(%mid, kind = A::Message::KIND, "dropping message of unexpected type (default handler)");
                return;
            }
        };

        let self_weak = self.self_weak().clone();
        let mut top = self.behavior_stack.pop();
        let mut behavior_op = None;
        let mut quit = None;
        let result = {
            let mut ctx = ActorContext {
                self_weak: &self_weak,
                system: &self.system,
                awaited: &mut self.awaited,
                multiplexed: &mut self.multiplexed,
                open_streams: &mut self.open_streams,
                behavior_op: &mut behavior_op,
                quit: &mut quit,
                current_sender: sender,
                current_message_id: mid,
            };
            match top.as_mut() {
                Some(behavior) => block_on(behavior.handle(&mut self.actor, message, &mut ctx)),
                None => {
                    trace!("behavior stack empty; dropping message (default handler)");
                    Ok(())
                }
            }
        };
        if let Some(behavior) = top {
            self.behavior_stack.push(behavior);
        }
        self.apply_behavior_op(behavior_op);

        let Err(err) = result else {
            self.apply_quit(quit);
            return;
        };
        let reason_text = err.to_string();
        let mut error_behavior_op = None;
        let mut error_quit = quit;
        let action = {
            let mut ctx = ActorContext {
                self_weak: &self_weak,
                system: &self.system,
                awaited: &mut self.awaited,
                multiplexed: &mut self.multiplexed,
                open_streams: &mut self.open_streams,
                behavior_op: &mut error_behavior_op,
                quit: &mut error_quit,
                current_sender: None,
                current_message_id: MessageId::none(),
            };
            block_on(self.actor.on_error(err, &mut ctx))
        };
        self.apply_behavior_op(error_behavior_op);
        match action {
            ErrorAction::Resume => self.apply_quit(error_quit),
            ErrorAction::Stop => {
                let reason = error_quit.unwrap_or(ExitReason::UnhandledException(reason_text));
                self.apply_quit(Some(reason));
            }
        }
    }

    /// Rejects `element` with `request-response-bounced` if it was itself a
    /// request awaiting a reply (spec §4.2 "Cancellation").
    fn bounce(&self, element: MailboxElement) {
        if element.message_id.is_response() || element.message_id == MessageId::none() {
            return;
        }
        let Some(sender) = &element.sender else {
            return;
        };
        self.system.deliver_response(
            sender,
            element.message_id.response_id(),
            ResponseResult::Err(RequestError::Bounced),
        );
    }
}

impl<A: Actor> Resumable for ActorCell<A> {
    fn resume(&mut self, budget: usize) -> ResumeResult {
        if self.terminated {
            return ResumeResult::Done;
        }
        if !self.started {
            self.started = true;
            self.run_pre_start();
            if !self.is_alive() {
                self.cleanup(ExitReason::Normal);
                return ResumeResult::Shutdown;
            }
        }

        let mut processed = 0usize;
        loop {
            if processed >= budget {
                return ResumeResult::ResumeLater;
            }
            let element = match self.consumer.pop() {
                PopResult::Some(elem) => elem,
                PopResult::Retry => continue,
                PopResult::Blocked => match self.pending_cache.pop_front() {
                    Some(cached) => cached,
                    None => return ResumeResult::AwaitingMessage,
                },
            };
            let waited = element.waited();
            let outcome = self.dispatch(element);
            processed += 1;
            if matches!(outcome, DispatchOutcome::Handled) {
                trace!(waited_micros = waited.as_micros() as u64, "dispatched mailbox element");
            }
            if !self.is_alive() {
                self.cleanup(ExitReason::Normal);
                return ResumeResult::Shutdown;
            }
        }
    }
}

impl<A: Actor> Cell for ActorCell<A> {
    fn attach_self(&mut self, weak: WeakHandle) {
        let _ = self.self_weak.set(weak);
    }

    fn enqueue(&self, element: MailboxElement) -> bool {
        if self.terminated {
            return false;
        }
        if let PushOutcome::WokeBlocked = self.mailbox.push(element) {
            if let Some(weak) = self.self_weak.get() {
                self.system.scheduler().reschedule(weak.clone());
            }
        }
        true
    }

    fn cleanup(&mut self, reason: ExitReason) -> bool {
        if self.terminated {
            return false;
        }
        self.terminated = true;
        let self_weak = self.self_weak().clone();
        let actor_id = self_weak.actor_id();

        // (1) swap-out attachables head under lock, (2) deliver each exit
        // notification on this thread.
        self_weak.control_block().attachables().notify_all(actor_id, &reason);
        // (3) unregister from the system.
        self.system.registry().remove(actor_id);

        for elem in self.mailbox.bounce_all() {
            self.bounce(elem);
        }
        for elem in self.pending_cache.drain(..) {
            self.bounce(elem);
        }

        // (4) call the user's cleanup hook.
        let mut behavior_op = None;
        let mut quit = None;
        let result = {
            let mut ctx = ActorContext {
                self_weak: &self_weak,
                system: &self.system,
                awaited: &mut self.awaited,
                multiplexed: &mut self.multiplexed,
                open_streams: &mut self.open_streams,
                behavior_op: &mut behavior_op,
                quit: &mut quit,
                current_sender: None,
                current_message_id: MessageId::none(),
            };
            block_on(self.actor.post_stop(&mut ctx))
        };
        if let Err(err) = result {
            warn!(error = %err, %actor_id, "post_stop returned an error");
        }
        true
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }
}
