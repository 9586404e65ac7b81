//! Core [`Actor`] trait and [`ErrorAction`] (spec §3.4, §4.1).

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use crate::error::ExitReason;
use crate::id::ActorId;
use crate::message::Message;

use super::context::ActorContext;

/// What happens after a user handler returns an error (spec §4.1 "Failure
/// semantics": the `exception_handler` returns an error; a non-empty error
/// triggers cleanup with that error).
///
/// This crate has no restart-strategy supervisor (see `DESIGN.md`'s early
/// drops) — `on_error` only decides whether the actor swallows the error and
/// keeps running, or terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Swallow the error; the actor keeps running.
    Resume,
    /// Terminate the actor; `cleanup` runs with an `ExitReason::UnhandledException`
    /// built from the error's `Display` output.
    Stop,
}

impl Default for ErrorAction {
    fn default() -> Self {
        ErrorAction::Stop
    }
}

/// An actor: a type with a mutable body, a single message type, and a set of
/// lifecycle hooks. Spawned via [`crate::system::SystemHandle::spawn`], which
/// wraps it in an [`super::cell::ActorCell`] and a [`crate::control_block::StrongHandle`].
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    type Message: Message;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handles one ordinary (non-system, non-response) message. This is the
    /// body of the actor's default behavior; `become`-installed behaviors
    /// may delegate back to it or replace it entirely.
    async fn handle_message(
        &mut self,
        message: Self::Message,
        ctx: &mut ActorContext<'_, Self>,
    ) -> Result<(), Self::Error>;

    /// Runs once, before the first message is processed.
    async fn pre_start(&mut self, _ctx: &mut ActorContext<'_, Self>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Runs once, as the last step of `cleanup`'s user-visible hook.
    async fn post_stop(&mut self, _ctx: &mut ActorContext<'_, Self>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Supervision decision for an error returned by `handle_message`.
    async fn on_error(
        &mut self,
        _error: Self::Error,
        _ctx: &mut ActorContext<'_, Self>,
    ) -> ErrorAction {
        ErrorAction::Stop
    }

    /// Called when an actor this one is monitoring (via
    /// [`ActorContext::monitor`]) terminates (spec §4.1 "down" ⇒ delegate to
    /// user callback; spec §8's `monitor(x); x.quit(r); wait_for(down)` law).
    /// Default is a no-op, matching `on_error`'s "nothing installed" default.
    async fn handle_down(
        &mut self,
        _actor_id: ActorId,
        _reason: ExitReason,
        _ctx: &mut ActorContext<'_, Self>,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}
