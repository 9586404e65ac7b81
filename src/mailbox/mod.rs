//! Multi-queue actor inbox with a deficit-round-robin dequeue policy
//! (spec §3.3, §4.2).
//!
//! A [`Mailbox`] is the many-producer side: any thread holding one can
//! `push` a [`MailboxElement`] into one of the four categories. A
//! [`MailboxConsumer`] is the single-consumer side owned exclusively by the
//! scheduler on the actor's behalf; it drains categories in weighted
//! round-robin order and implements the try-block / try-unblock-or-enqueue
//! handshake that lets the scheduler park an actor with an empty mailbox
//! without missing a wakeup.

mod element;

pub use element::{Category, MailboxElement};

// Layer 1: Standard library imports
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::error::RequestError;

const EMPTY: u8 = 0;
const NONEMPTY: u8 = 1;
const BLOCKED: u8 = 2;

/// Default DRR quantum (elements drained per visit) for each category,
/// indexed by [`Category::index`]. Urgent gets the largest share.
pub const DEFAULT_QUANTA: [usize; 4] = [8, 4, 2, 2];

/// The Downstream category's own nested queue: stream batches are further
/// keyed by `slot_id` (spec §3.3) and dispatched across those sub-queues in
/// round robin, one element per active slot per visit, rather than being
/// flattened into a single FIFO like the other three categories.
struct DownstreamQueues {
    slots: HashMap<u32, VecDeque<MailboxElement>>,
    order: VecDeque<u32>,
}

impl DownstreamQueues {
    fn new() -> Self {
        DownstreamQueues { slots: HashMap::new(), order: VecDeque::new() }
    }

    fn push(&mut self, slot: u32, element: MailboxElement) {
        match self.slots.entry(slot) {
            Entry::Occupied(mut occupied) => occupied.get_mut().push_back(element),
            Entry::Vacant(vacant) => {
                let mut queue = VecDeque::new();
                queue.push_back(element);
                vacant.insert(queue);
                self.order.push_back(slot);
            }
        }
    }

    /// Pops the next element from the slot at the front of the round-robin
    /// order, recycling that slot to the back if it still has data and
    /// dropping it from rotation once drained.
    fn pop(&mut self) -> Option<MailboxElement> {
        for _ in 0..self.order.len() {
            let slot = self.order.pop_front()?;
            let Some(queue) = self.slots.get_mut(&slot) else {
                continue;
            };
            let popped = queue.pop_front();
            if queue.is_empty() {
                self.slots.remove(&slot);
            } else {
                self.order.push_back(slot);
            }
            if popped.is_some() {
                return popped;
            }
        }
        None
    }

    fn len(&self) -> usize {
        self.slots.values().map(VecDeque::len).sum()
    }

    fn drain_all(&mut self) -> Vec<MailboxElement> {
        let drained = self.slots.values_mut().flat_map(std::mem::take).collect();
        self.slots.clear();
        self.order.clear();
        drained
    }
}

struct Shared {
    /// Urgent, Normal, and Upstream, indexed by [`Category::index`] (0-2).
    queues: [(Sender<MailboxElement>, Receiver<MailboxElement>); 3],
    downstream: Mutex<DownstreamQueues>,
    state: AtomicU8,
}

/// The producer-side, cloneable handle to an actor's inbox.
#[derive(Clone)]
pub struct Mailbox {
    shared: Arc<Shared>,
}

/// Outcome of [`Mailbox::push`]: tells the caller whether it just became
/// responsible for re-scheduling a parked actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The mailbox was already runnable; no scheduling action needed.
    Enqueued,
    /// The mailbox had transitioned out of `blocked`; the caller must
    /// re-schedule the actor (this is "try-unblock-or-enqueue", spec §4.2).
    WokeBlocked,
}

/// Outcome of a single [`MailboxConsumer::pop`] attempt.
pub enum PopResult {
    Some(MailboxElement),
    /// The mailbox is now `blocked`; the scheduler may deschedule the actor.
    Blocked,
    /// A concurrent push raced the block attempt; the caller should retry.
    Retry,
}

impl Mailbox {
    pub fn new() -> (Mailbox, MailboxConsumer) {
        let queues = [crossbeam_channel::unbounded(), crossbeam_channel::unbounded(), crossbeam_channel::unbounded()];
        let shared = Arc::new(Shared {
            queues,
            downstream: Mutex::new(DownstreamQueues::new()),
            state: AtomicU8::new(EMPTY),
        });
        let consumer = MailboxConsumer {
            shared: Arc::clone(&shared),
            deficits: [0; 4],
            quanta: DEFAULT_QUANTA,
        };
        (Mailbox { shared }, consumer)
    }

    /// Places `element`, returning whether the caller must re-schedule the
    /// actor (spec §4.2 "Push (producer)"). Downstream elements are fanned
    /// out by `downstream_slot` into their own sub-queue (spec §3.3); a
    /// Downstream element with no slot set falls back to slot 0.
    pub fn push(&self, element: MailboxElement) -> PushOutcome {
        match element.category {
            Category::Downstream => {
                let slot = element.downstream_slot.unwrap_or(0);
                self.shared.downstream.lock().push(slot, element);
            }
            _ => {
                let idx = element.category.index();
                // An unbounded channel send only fails if every receiver
                // dropped, which only happens once the mailbox itself is gone.
                let _ = self.shared.queues[idx].0.send(element);
            }
        }
        let prev = self.shared.state.swap(NONEMPTY, Ordering::AcqRel);
        if prev == BLOCKED {
            PushOutcome::WokeBlocked
        } else {
            PushOutcome::Enqueued
        }
    }

    /// Approximate total number of queued elements across all categories.
    pub fn len(&self) -> usize {
        let flat: usize = self.shared.queues.iter().map(|(_, rx)| rx.len()).sum();
        flat + self.shared.downstream.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains every queued element. Turning a drained request into a
    /// `request-response-bounced` reply is the actor module's job (it knows
    /// the concrete message type); this just hands back the raw elements.
    pub fn bounce_all(&self) -> Vec<MailboxElement> {
        let mut drained = Vec::new();
        for (_, rx) in &self.shared.queues {
            while let Ok(elem) = rx.try_recv() {
                drained.push(elem);
            }
        }
        drained.extend(self.shared.downstream.lock().drain_all());
        drained
    }
}

/// The single-consumer side of a [`Mailbox`], owned by the scheduler while
/// the actor is runnable.
pub struct MailboxConsumer {
    shared: Arc<Shared>,
    deficits: [isize; 4],
    quanta: [usize; 4],
}

impl MailboxConsumer {
    /// Attempts one deficit-round-robin pop across the four categories,
    /// or begins the try-block protocol if every queue looks empty.
    pub fn pop(&mut self) -> PopResult {
        if let Some(elem) = self.drr_pop() {
            return PopResult::Some(elem);
        }
        // Nothing to hand back this sweep. Declare empty, then double-check
        // for a race before committing to `blocked` (spec §4.2).
        self.shared.state.store(EMPTY, Ordering::Release);
        if let Some(elem) = self.drr_pop() {
            self.shared.state.store(NONEMPTY, Ordering::Release);
            return PopResult::Some(elem);
        }
        match self.shared.state.compare_exchange(
            EMPTY,
            BLOCKED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => PopResult::Blocked,
            Err(_) => PopResult::Retry,
        }
    }

    fn drr_pop(&mut self) -> Option<MailboxElement> {
        // One full DRR sweep: grant each category its quantum as deficit,
        // then drain while deficit remains and data is available. Downstream
        // draws from its own slot-multiplexed sub-queue instead of a flat
        // channel (spec §3.3).
        for _ in 0..Category::ALL.len() {
            for cat in Category::ALL {
                let idx = cat.index();
                self.deficits[idx] += self.quanta[idx] as isize;
                if self.deficits[idx] > 0 {
                    let popped = match cat {
                        Category::Downstream => self.shared.downstream.lock().pop(),
                        _ => self.shared.queues[idx].1.try_recv().ok(),
                    };
                    if let Some(elem) = popped {
                        self.deficits[idx] -= 1;
                        return Some(elem);
                    }
                    // Queue empty: reset the unused deficit so it cannot
                    // accumulate across sweeps (DRR convention).
                    self.deficits[idx] = 0;
                }
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        let flat: usize = self.shared.queues.iter().map(|(_, rx)| rx.len()).sum();
        flat + self.shared.downstream.lock().len()
    }
}

pub fn bounced_error() -> RequestError {
    RequestError::Bounced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::MessageId;

    fn elem(category: Category, tag: u8) -> MailboxElement {
        MailboxElement::new(None, MessageId::none(), Box::new(tag), category)
    }

    #[test]
    fn push_reports_woke_blocked_only_when_previously_blocked() {
        let (mbox, mut consumer) = Mailbox::new();
        assert_eq!(mbox.push(elem(Category::Normal, 1)), PushOutcome::Enqueued);
        // Drain it so the consumer can legitimately block.
        assert!(matches!(consumer.pop(), PopResult::Some(_)));
        assert!(matches!(consumer.pop(), PopResult::Blocked));
        assert_eq!(mbox.push(elem(Category::Normal, 2)), PushOutcome::WokeBlocked);
    }

    #[test]
    fn urgent_messages_are_preferred_within_a_sweep() {
        let (mbox, mut consumer) = Mailbox::new();
        mbox.push(elem(Category::Normal, 1));
        mbox.push(elem(Category::Urgent, 2));
        let first = match consumer.pop() {
            PopResult::Some(e) => *e.payload.downcast::<u8>().unwrap(),
            _ => panic!("expected an element"),
        };
        assert_eq!(first, 2);
    }

    #[test]
    fn bounce_all_drains_every_category() {
        let (mbox, _consumer) = Mailbox::new();
        mbox.push(elem(Category::Normal, 1));
        mbox.push(elem(Category::Urgent, 2));
        mbox.push(elem(Category::Upstream, 3));
        let drained = mbox.bounce_all();
        assert_eq!(drained.len(), 3);
        assert!(mbox.is_empty());
    }

    fn downstream(tag: u8, slot: u32) -> MailboxElement {
        MailboxElement::downstream(None, MessageId::none(), Box::new(tag), slot)
    }

    #[test]
    fn downstream_round_robins_by_slot_instead_of_plain_fifo() {
        let (mbox, mut consumer) = Mailbox::new();
        // Two batches queued on slot 10, one on slot 20: a plain FIFO would
        // hand these back 1, 2, 3. The slot round robin must interleave
        // slot 20 ahead of slot 10's second batch instead.
        mbox.push(downstream(1, 10));
        mbox.push(downstream(2, 10));
        mbox.push(downstream(3, 20));

        let mut order = Vec::new();
        for _ in 0..3 {
            match consumer.pop() {
                PopResult::Some(e) => order.push(*e.payload.downcast::<u8>().unwrap()),
                _ => panic!("expected an element"),
            }
        }
        assert_eq!(order, vec![1, 3, 2]);
    }

    #[test]
    fn downstream_slot_drops_out_of_rotation_once_drained() {
        let (mbox, mut consumer) = Mailbox::new();
        mbox.push(downstream(1, 10));
        assert!(matches!(consumer.pop(), PopResult::Some(_)));
        // Slot 10 is now empty; a fresh push must still work after the slot
        // was dropped from the rotation, not get stuck behind a dead entry.
        mbox.push(downstream(2, 10));
        match consumer.pop() {
            PopResult::Some(e) => assert_eq!(*e.payload.downcast::<u8>().unwrap(), 2),
            _ => panic!("expected an element"),
        }
    }

    #[test]
    fn bounce_all_drains_downstream_slots_too() {
        let (mbox, _consumer) = Mailbox::new();
        mbox.push(downstream(1, 10));
        mbox.push(downstream(2, 20));
        let drained = mbox.bounce_all();
        assert_eq!(drained.len(), 2);
        assert!(mbox.is_empty());
    }
}
