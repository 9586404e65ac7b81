//! The behavior stack (spec §3.4, §4.1 `become`/`quit`).

// Layer 2: Third-party crate imports
use async_trait::async_trait;

use super::context::ActorContext;
use super::traits::Actor;

/// One entry of an actor's behavior stack. The top entry is the active
/// handler for ordinary messages; `become` pushes or replaces it.
#[async_trait]
pub trait Behavior<A: Actor + ?Sized>: Send {
    async fn handle(
        &mut self,
        actor: &mut A,
        message: A::Message,
        ctx: &mut ActorContext<'_, A>,
    ) -> Result<(), A::Error>;
}

/// The behavior installed at spawn time: delegates straight to
/// [`Actor::handle_message`]. Every behavior stack starts with exactly one
/// of these so the stack is never empty while the actor is alive.
pub(crate) struct DefaultBehavior;

#[async_trait]
impl<A: Actor> Behavior<A> for DefaultBehavior {
    async fn handle(
        &mut self,
        actor: &mut A,
        message: A::Message,
        ctx: &mut ActorContext<'_, A>,
    ) -> Result<(), A::Error> {
        actor.handle_message(message, ctx).await
    }
}

/// A pending stack mutation requested via [`ActorContext::become_`], applied
/// by the consume loop after the current handler call returns (see
/// `actor::cell` for why this can't happen mid-call: the active behavior is
/// popped out of the stack for the duration of the call, so the stack itself
/// is free for `ActorContext` to describe a pending change to).
pub(crate) struct BehaviorOp<A: Actor> {
    pub behavior: Box<dyn Behavior<A>>,
    pub keep: bool,
}
