//! Process-wide identifiers: [`NodeId`], [`ActorId`], and [`MessageId`].
//!
//! These are the three identity types the rest of the crate is built on
//! (spec §3.1). `NodeId` survives for the lifetime of one runtime instance
//! and is what the remoting layer exchanges during a handshake; `ActorId`
//! is a per-instance monotonic counter; `MessageId` tags requests so
//! responses can be correlated back to the handler that is waiting for them.

// Layer 1: Standard library imports
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

/// Reserved [`ActorId`] meaning "anonymous / none" (spec §3.1).
pub const NO_ACTOR: u32 = 0;

/// Top bit of a [`MessageId`]'s 64-bit representation marks the high-priority tag.
const PRIORITY_BIT: u64 = 1 << 63;
/// Bit 62 marks "this id is a response to a previously sent request".
const RESPONSE_BIT: u64 = 1 << 62;
const ID_MASK: u64 = !(PRIORITY_BIT | RESPONSE_BIT);

/// Globally unique identifier of a runtime instance.
///
/// A `NodeId` is a host hash (16-20 bytes, opaque) paired with the
/// originating process's PID. Two node ids are equal iff both components
/// match; ordering is the lexicographic order of `(host_hash, process_id)`,
/// which gives `RoutingTable` and `ActorNamespace` a total order to use as
/// map keys.
#[derive(Clone, Eq, Serialize, Deserialize)]
pub struct NodeId {
    host_hash: Vec<u8>,
    process_id: u32,
}

impl NodeId {
    /// Builds a `NodeId` from an explicit host hash and process id.
    ///
    /// `host_hash` must be 16-20 bytes; this is enforced at the call site
    /// (handshake parsing, §4.6) rather than here, since a locally
    /// constructed `NodeId` (via [`NodeId::local`]) always satisfies it.
    pub fn new(host_hash: Vec<u8>, process_id: u32) -> Self {
        NodeId { host_hash, process_id }
    }

    /// Computes the `NodeId` for the current process.
    ///
    /// The host hash is derived from the hostname (falling back to a fixed
    /// label when unavailable) so that two runtime instances on the same
    /// machine share a host component and differ only by `process_id`.
    pub fn local() -> Self {
        let hostname = hostname_best_effort();
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        hostname.hash(&mut hasher);
        let digest = hasher.finish().to_be_bytes();
        // Pad to 16 bytes, the minimum width the spec allows.
        let mut host_hash = Vec::with_capacity(16);
        host_hash.extend_from_slice(&digest);
        host_hash.extend_from_slice(&digest);
        NodeId::new(host_hash, std::process::id())
    }

    /// The opaque host-hash bytes, as carried on the wire during a handshake.
    pub fn host_hash(&self) -> &[u8] {
        &self.host_hash
    }

    /// The originating process id.
    pub fn process_id(&self) -> u32 {
        self.process_id
    }
}

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.host_hash == other.host_hash && self.process_id == other.process_id
    }
}

impl Hash for NodeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host_hash.hash(state);
        self.process_id.hash(state);
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.host_hash
            .cmp(&other.host_hash)
            .then(self.process_id.cmp(&other.process_id))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}@{})", hex(&self.host_hash), self.process_id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", hex(&self.host_hash), self.process_id)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hostname_best_effort() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

/// 32-bit monotonically-assigned actor identifier, unique within one runtime
/// instance (spec §3.1). `0` is reserved for "anonymous / none"
/// ([`NO_ACTOR`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(u32);

impl ActorId {
    /// Wraps a raw id. Only the [`registry`](crate::registry) allocator and
    /// wire deserialization should construct ids this way.
    pub const fn from_raw(raw: u32) -> Self {
        ActorId(raw)
    }

    /// The reserved "no actor" id.
    pub const fn none() -> Self {
        ActorId(NO_ACTOR)
    }

    /// `true` for every id except [`ActorId::none`].
    pub fn is_some(&self) -> bool {
        self.0 != NO_ACTOR
    }

    /// The raw `u32` value, e.g. for placing into a wire header.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process-wide counter backing [`ActorId`] allocation; see
/// [`crate::registry::Registry::next_actor_id`] for the only intended caller.
#[derive(Debug, Default)]
pub struct ActorIdAllocator {
    next: AtomicU32,
}

impl ActorIdAllocator {
    pub fn new() -> Self {
        // id 1 is the first live actor; 0 stays reserved for "none".
        ActorIdAllocator { next: AtomicU32::new(1) }
    }

    pub fn allocate(&self) -> ActorId {
        ActorId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// 63-bit opaque counter with a 1-bit priority tag (spec §3.1).
///
/// Every message carries one. Request messages carry non-zero ids; a
/// response echoes the request's id with the response bit set, which is
/// how [`crate::actor::Actor`] correlates replies to `awaited_responses`
/// entries without a separate correlation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    /// Builds a fresh request id with the given priority tag.
    pub fn new_request(raw: u64, high_priority: bool) -> Self {
        let mut bits = raw & ID_MASK;
        if high_priority {
            bits |= PRIORITY_BIT;
        }
        MessageId(bits)
    }

    /// Zero id used for fire-and-forget asynchronous messages that expect no reply.
    pub const fn none() -> Self {
        MessageId(0)
    }

    /// Whether this id was tagged high-priority at creation.
    pub fn is_high_priority(&self) -> bool {
        self.0 & PRIORITY_BIT != 0
    }

    /// Whether this id denotes a response rather than the original request.
    pub fn is_response(&self) -> bool {
        self.0 & RESPONSE_BIT != 0
    }

    /// Derives the response id that echoes this request: same low bits,
    /// response bit set, priority tag preserved.
    pub fn response_id(&self) -> MessageId {
        MessageId(self.0 | RESPONSE_BIT)
    }

    /// The bits used for correlation lookups (priority/response tags masked out).
    pub fn correlation_key(&self) -> u64 {
        self.0 & ID_MASK
    }

    /// Raw 64-bit wire representation.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Reconstructs a `MessageId` from its wire representation.
    pub fn from_u64(raw: u64) -> Self {
        MessageId(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mid:{:#x}", self.0)
    }
}
