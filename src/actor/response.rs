//! Response-correlation bookkeeping for `awaited_responses` and
//! `multiplexed_responses` (spec §3.4).

// Layer 1: Standard library imports
use std::any::Any;

// Layer 3: Internal module imports
use crate::error::RequestError;

use super::context::ActorContext;
use super::traits::Actor;

/// What a request ultimately resolved to: the decoded reply payload, or a
/// reason it never arrived (bounced, timed out, receiver down).
pub enum ResponseResult {
    Ok(Box<dyn Any + Send>),
    Err(RequestError),
}

/// A one-shot continuation run when a correlated response arrives.
///
/// Synchronous by design (spec §5: "there is no in-handler async/await" —
/// continuations run to completion inline during `consume`, the same as
/// any other message handler).
pub type ResponseHandler<A> =
    Box<dyn FnOnce(&mut A, ResponseResult, &mut ActorContext<'_, A>) + Send>;

/// Entry held in `awaited_responses`: ordered, head has priority (spec §4.1
/// "pop the matching entry... if the id is at the head, invoke; otherwise
/// skip").
pub struct Awaited<A: Actor> {
    pub key: u64,
    pub handler: ResponseHandler<A>,
}
