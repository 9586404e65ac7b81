//! [`MailboxElement`] and the four mailbox categories (spec §3.3).

// Layer 1: Standard library imports
use std::any::Any;
use std::time::Instant;

// Layer 3: Internal module imports
use crate::control_block::WeakHandle;
use crate::id::MessageId;

/// Which of the mailbox's four queues an element belongs to (spec §3.3).
/// Urgent, Normal, and Upstream are flat FIFOs; Downstream is itself
/// slot-multiplexed (see `downstream_slot`). Dequeued in weighted
/// round-robin by [`super::Mailbox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// High-priority asynchronous messages.
    Urgent,
    /// Default asynchronous messages.
    Normal,
    /// Flow-control back-pressure signals.
    Upstream,
    /// Stream batches, further keyed by `slot_id` within this category.
    Downstream,
}

impl Category {
    pub(crate) const ALL: [Category; 4] = [
        Category::Urgent,
        Category::Normal,
        Category::Upstream,
        Category::Downstream,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Category::Urgent => 0,
            Category::Normal => 1,
            Category::Upstream => 2,
            Category::Downstream => 3,
        }
    }
}

/// One message sitting in a mailbox (spec §3.3).
///
/// `stages` is the sender-forward stack for multi-hop delegation; per the
/// Open Question this resolves to (§9, SPEC_FULL §3), it is always empty in
/// this implementation.
pub struct MailboxElement {
    pub sender: Option<WeakHandle>,
    pub message_id: MessageId,
    pub payload: Box<dyn Any + Send>,
    pub stages: Vec<WeakHandle>,
    pub category: Category,
    pub downstream_slot: Option<u32>,
    pub enqueued_at: Instant,
}

impl MailboxElement {
    pub fn new(
        sender: Option<WeakHandle>,
        message_id: MessageId,
        payload: Box<dyn Any + Send>,
        category: Category,
    ) -> Self {
        MailboxElement {
            sender,
            message_id,
            payload,
            stages: Vec::new(),
            category,
            downstream_slot: None,
            enqueued_at: Instant::now(),
        }
    }

    pub fn downstream(
        sender: Option<WeakHandle>,
        message_id: MessageId,
        payload: Box<dyn Any + Send>,
        slot: u32,
    ) -> Self {
        let mut elem = MailboxElement::new(sender, message_id, payload, Category::Downstream);
        elem.downstream_slot = Some(slot);
        elem
    }

    /// Time this element has spent waiting in the mailbox, observed on
    /// dispatch (spec §4.1 step 3's mailbox-time histogram).
    pub fn waited(&self) -> std::time::Duration {
        self.enqueued_at.elapsed()
    }
}
