//! The scheduler/actor boundary: [`Resumable`] and [`ResumeResult`].
//!
//! CAF splits this out as an abstract `resumable` base so the scheduler's
//! worker loop never needs to know it is running actors specifically — it
//! just holds a queue of things with a `resume` method. Keeping the same
//! split here means `scheduler` has zero dependency on `actor`; only
//! `actor::cell` depends on this module, implementing it for [`ActorCell`](crate::actor::cell::ActorCell).

/// Outcome of one [`Resumable::resume`] call (spec §4.3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeResult {
    /// The budget ran out with runnable work still queued; re-enqueue at
    /// the back of the worker's deque.
    ResumeLater,
    /// The unit of work finished for good (actor terminated); drop it.
    Done,
    /// The mailbox went empty mid-resume; the unit parked itself via
    /// try-block and will re-enqueue itself on the next `push`
    /// (spec §4.2's try-unblock-or-enqueue).
    AwaitingMessage,
    /// The scheduler is shutting down and this call only drained the
    /// bouncer; the caller should not reschedule regardless of remaining work.
    Shutdown,
}

/// A unit of schedulable work. Implemented by `actor::cell::ActorCell<A>`;
/// the scheduler only ever sees `Box<dyn Resumable>`.
pub trait Resumable: Send {
    /// Runs up to `budget` units of work (typically mailbox elements for an
    /// actor), returning why it stopped.
    fn resume(&mut self, budget: usize) -> ResumeResult;
}
