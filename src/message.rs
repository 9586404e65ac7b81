//! The [`Message`] trait every actor's payload type implements.

/// Marker trait for actor message payloads.
///
/// `KIND` names the message for tracing spans and, for messages that cross
/// the wire, the type tag carried in `net::wire`'s envelope.
pub trait Message: Send + 'static {
    const KIND: &'static str;
}
