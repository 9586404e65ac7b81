//! The binary frame header and handshake payload (spec §4.6, §6).
//!
//! Grounded on `io/basp/header.hpp`/`io/basp/constants.hpp`: a fixed-width
//! header followed by a length-prefixed payload. This implementation pins
//! the Open Question from spec §9/SPEC_FULL §3 to the 28-byte header
//! (`source_actor_id`/`dest_actor_id: u32`, `message_id: u64`) — see
//! `DESIGN.md`.

// Layer 1: Standard library imports
use std::convert::TryFrom;

// Layer 2: Third-party crate imports
use bytes::{Buf, BufMut, Bytes, BytesMut};

// Layer 3: Internal module imports
use crate::attachable::SystemMessage;
use crate::error::{ExitReason, IoError};
use crate::id::{ActorId, MessageId};

/// Byte width of [`Header`] on the wire (spec §6): four `u32` fields, one
/// `u64`, two more `u32` fields.
pub const HEADER_LEN: usize = 28;

/// Upper bound on the number of interface signatures a handshake may carry
/// (spec §4.6: "4-byte interface-signature count (≤ 100)").
pub const MAX_SIGNATURES: u32 = 100;
/// Upper bound on one signature's UTF-8 byte length (spec §4.6: "≤ 500").
pub const MAX_SIGNATURE_LEN: u32 = 500;

/// Frame kind carried in [`Header::message_type`] (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    DirectMessage,
    AnnounceProxy,
    KillProxy,
    Monitor,
    Down,
    Link,
    Unlink,
}

impl MessageType {
    fn as_u32(self) -> u32 {
        match self {
            MessageType::DirectMessage => 0,
            MessageType::AnnounceProxy => 1,
            MessageType::KillProxy => 2,
            MessageType::Monitor => 3,
            MessageType::Down => 4,
            MessageType::Link => 5,
            MessageType::Unlink => 6,
        }
    }
}

impl TryFrom<u32> for MessageType {
    type Error = IoError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(MessageType::DirectMessage),
            1 => Ok(MessageType::AnnounceProxy),
            2 => Ok(MessageType::KillProxy),
            3 => Ok(MessageType::Monitor),
            4 => Ok(MessageType::Down),
            5 => Ok(MessageType::Link),
            6 => Ok(MessageType::Unlink),
            other => Err(IoError::MalformedFrame(format!("unknown message_type {other}"))),
        }
    }
}

/// Fixed-width frame header (spec §4.6, §6, bit-exact big-endian layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub message_type: MessageType,
    pub flags: u32,
    pub payload_len: u32,
    pub message_id: MessageId,
    pub source_actor_id: ActorId,
    pub dest_actor_id: ActorId,
}

impl Header {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN);
        buf.put_u32(self.message_type.as_u32());
        buf.put_u32(self.flags);
        buf.put_u32(self.payload_len);
        buf.put_u64(self.message_id.as_u64());
        buf.put_u32(self.source_actor_id.raw());
        buf.put_u32(self.dest_actor_id.raw());
        buf.freeze()
    }

    pub fn decode(mut bytes: &[u8]) -> Result<Self, IoError> {
        if bytes.len() < HEADER_LEN {
            return Err(IoError::MalformedFrame(format!(
                "header needs {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let message_type = MessageType::try_from(bytes.get_u32())?;
        let flags = bytes.get_u32();
        let payload_len = bytes.get_u32();
        let message_id = MessageId::from_u64(bytes.get_u64());
        let source_actor_id = ActorId::from_raw(bytes.get_u32());
        let dest_actor_id = ActorId::from_raw(bytes.get_u32());
        Ok(Header {
            message_type,
            flags,
            payload_len,
            message_id,
            source_actor_id,
            dest_actor_id,
        })
    }
}

/// Encodes an [`ExitReason`] as a `Down`/`Unlink` frame's payload: one tag
/// byte, followed by a length-prefixed UTF-8 string for the two variants
/// that carry one.
pub fn encode_exit_reason(reason: &ExitReason) -> Vec<u8> {
    let mut buf = BytesMut::new();
    match reason {
        ExitReason::Normal => buf.put_u8(0),
        ExitReason::Kill => buf.put_u8(1),
        ExitReason::UnhandledException(text) => {
            buf.put_u8(2);
            buf.put_u32(text.len() as u32);
            buf.put_slice(text.as_bytes());
        }
        ExitReason::OutOfWorkers => buf.put_u8(3),
        ExitReason::User(text) => {
            buf.put_u8(4);
            buf.put_u32(text.len() as u32);
            buf.put_slice(text.as_bytes());
        }
    }
    buf.to_vec()
}

/// Inverse of [`encode_exit_reason`]. An empty or malformed payload decodes
/// to [`ExitReason::Normal`] rather than failing the connection; losing the
/// precise reason is preferable to tearing down the peer over it.
pub fn decode_exit_reason(mut bytes: &[u8]) -> ExitReason {
    if bytes.is_empty() {
        return ExitReason::Normal;
    }
    let tag = bytes.get_u8();
    let text = |bytes: &mut &[u8]| -> String {
        if bytes.len() < 4 {
            return String::new();
        }
        let len = bytes.get_u32() as usize;
        if bytes.len() < len {
            return String::new();
        }
        let text = std::str::from_utf8(&bytes[..len]).unwrap_or("").to_string();
        bytes.advance(len);
        text
    };
    match tag {
        1 => ExitReason::Kill,
        2 => ExitReason::UnhandledException(text(&mut bytes)),
        3 => ExitReason::OutOfWorkers,
        4 => ExitReason::User(text(&mut bytes)),
        _ => ExitReason::Normal,
    }
}

/// Encodes a lifecycle notification ([`SystemMessage::Down`] or
/// [`SystemMessage::Exit`]) as a `Down` wire frame's payload. Spec §4.6's
/// message type list has no dedicated `exit` verb, so the distinction
/// travels as the payload's first byte (0 = Down, 1 = Exit) rather than a
/// separate [`MessageType`]; the notified actor's id travels in the
/// frame's `source_actor_id` header field, not here.
pub fn encode_lifecycle_message(message: &SystemMessage) -> Vec<u8> {
    let (kind, reason) = match message {
        SystemMessage::Down { reason, .. } => (0u8, reason),
        SystemMessage::Exit { reason, .. } => (1u8, reason),
    };
    let mut buf = vec![kind];
    buf.extend(encode_exit_reason(reason));
    buf
}

/// Inverse of [`encode_lifecycle_message`]. `actor_id` is the frame's
/// `source_actor_id`, not part of the payload. An empty payload decodes to
/// a `Down` notification with [`ExitReason::Normal`].
pub fn decode_lifecycle_message(actor_id: ActorId, payload: &[u8]) -> SystemMessage {
    let (kind, rest) = payload.split_first().unwrap_or((&0, [].as_slice()));
    let reason = decode_exit_reason(rest);
    if *kind == 1 {
        SystemMessage::Exit { actor_id, reason }
    } else {
        SystemMessage::Down { actor_id, reason }
    }
}

/// Per-connection handshake payload (spec §4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub published_actor_id: ActorId,
    pub process_id: u32,
    pub host_hash: Vec<u8>,
    pub interface_signatures: Vec<String>,
}

impl Handshake {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32(self.published_actor_id.raw());
        buf.put_u32(self.process_id);
        buf.put_u32(self.host_hash.len() as u32);
        buf.put_slice(&self.host_hash);
        buf.put_u32(self.interface_signatures.len() as u32);
        for sig in &self.interface_signatures {
            buf.put_u32(sig.len() as u32);
            buf.put_slice(sig.as_bytes());
        }
        buf.freeze()
    }

    pub fn decode(mut bytes: &[u8]) -> Result<Self, IoError> {
        let need = |n: usize, label: &str| -> Result<(), IoError> {
            if bytes.len() < n {
                Err(IoError::HandshakeFailed(format!("truncated {label}")))
            } else {
                Ok(())
            }
        };

        need(4, "actor id")?;
        let published_actor_id = ActorId::from_raw(bytes.get_u32());
        need(4, "process id")?;
        let process_id = bytes.get_u32();
        need(4, "host hash length")?;
        let host_hash_len = bytes.get_u32() as usize;
        need(host_hash_len, "host hash")?;
        let host_hash = bytes[..host_hash_len].to_vec();
        bytes.advance(host_hash_len);

        need(4, "signature count")?;
        let count = bytes.get_u32();
        if count > MAX_SIGNATURES {
            return Err(IoError::HandshakeFailed(format!(
                "signature count {count} exceeds {MAX_SIGNATURES}"
            )));
        }
        let mut interface_signatures = Vec::with_capacity(count as usize);
        for _ in 0..count {
            need(4, "signature length")?;
            let len = bytes.get_u32();
            if len > MAX_SIGNATURE_LEN {
                return Err(IoError::HandshakeFailed(format!(
                    "signature length {len} exceeds {MAX_SIGNATURE_LEN}"
                )));
            }
            need(len as usize, "signature bytes")?;
            let text = std::str::from_utf8(&bytes[..len as usize])
                .map_err(|e| IoError::HandshakeFailed(format!("non-utf8 signature: {e}")))?
                .to_string();
            bytes.advance(len as usize);
            interface_signatures.push(text);
        }

        Ok(Handshake {
            published_actor_id,
            process_id,
            host_hash,
            interface_signatures,
        })
    }
}
