//! Crate-wide error taxonomy (spec §7).
//!
//! Every error kind the spec names — `system`, `actor`, `request`, `io`,
//! `stream` — gets its own `thiserror` enum, the way `airssys-rt` roots
//! `SystemError`/`BrokerError`/`MonitoringError` per subsystem rather than
//! one flat enum. [`RuntimeError`] composes them for callers that cross
//! subsystem boundaries (e.g. `Actor::cleanup` receiving either a local
//! failure or a bounced request).

use std::time::Duration;

use thiserror::Error;

use crate::id::ActorId;

/// `system` category (spec §7): operational failures of the runtime itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SystemError {
    #[error("node or actor unreachable")]
    Unreachable,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("value out of range: {0}")]
    OutOfRange(String),
    #[error("actor {0} not found")]
    ActorNotFound(ActorId),
    #[error("failed to spawn actor: {0}")]
    SpawnFailed(String),
    #[error("system is shutting down")]
    ShuttingDown,
    #[error("actor limit exceeded: {current} of {max}")]
    ActorLimitExceeded { current: usize, max: usize },
    #[error("shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}

impl SystemError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SystemError::Unreachable | SystemError::ShuttingDown)
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SystemError::InvalidArgument(_) | SystemError::OutOfRange(_) | SystemError::ActorNotFound(_)
        )
    }
}

/// `actor` category (spec §7): the reason an actor's lifetime ended.
///
/// Doubles as the `reason` argument threaded through `cleanup`, exit
/// messages, and down messages (spec §3.5, §4.1).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExitReason {
    #[error("normal exit")]
    Normal,
    #[error("killed")]
    Kill,
    #[error("unhandled exception: {0}")]
    UnhandledException(String),
    #[error("out of workers")]
    OutOfWorkers,
    /// A reason supplied by user code via `quit(reason)`.
    #[error("user reason: {0}")]
    User(String),
}

impl Default for ExitReason {
    fn default() -> Self {
        ExitReason::Normal
    }
}

/// `request` category (spec §7): failures specific to request/response correlation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("request timed out")]
    Timeout,
    #[error("receiver is down")]
    ReceiverDown,
    #[error("invalid delegate target")]
    InvalidDelegate,
    #[error("request bounced: actor terminated before it could respond")]
    Bounced,
}

/// `io` category (spec §7): remoting/transport failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IoError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("peer disconnected during handshake")]
    DisconnectDuringHandshake,
    /// A non-blocking socket operation would have blocked (spec §6's socket
    /// backend contract: `open_stream`/`read_some`/`write_some` surface this
    /// rather than blocking the caller).
    #[error("operation would block")]
    WouldBlock,
    /// Peer reset the connection (TCP RST or equivalent).
    #[error("connection reset by peer")]
    Reset,
    /// Catch-all for backend errors outside the above (spec §6: `other(errno)`).
    #[error("io error: {0}")]
    Other(String),
}

/// `stream` category (spec §7): downstream/upstream batch-flow failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream initialization failed: {0}")]
    StreamInitFailed(String),
    #[error("invalid upstream")]
    InvalidUpstream,
}

/// Umbrella error joining every subsystem category, for call sites that
/// cross component boundaries (spec §7: "local failures... are routed to
/// the actor's exit path").
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error(transparent)]
    System(#[from] SystemError),
    #[error("actor exited: {0}")]
    Actor(#[from] ExitReason),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
