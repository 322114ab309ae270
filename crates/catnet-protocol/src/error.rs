//! Error types for the protocol layer.
//!
//! Reading past the end of a buffer is a [`StreamError`]; everything that
//! goes wrong while turning bytes into a packet (or a packet into bytes) is
//! a [`ProtocolError`]. Neither is ever fatal: callers drop the offending
//! message and carry on.

use crate::PacketId;

/// Errors raised by [`ByteReader`](crate::ByteReader).
///
/// Every failed read leaves the reader's cursor exactly where it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Not enough bytes left to satisfy the read.
    #[error(
        "read of {requested} bytes at offset {position} exceeds buffer \
         ({available} bytes remaining)"
    )]
    OutOfBounds {
        position: usize,
        requested: usize,
        available: usize,
    },

    /// The bytes do not form a valid value of the requested type
    /// (for example a `bool` byte other than 0 or 1).
    #[error("invalid {type_name} value at offset {position}")]
    InvalidValue {
        type_name: &'static str,
        position: usize,
    },

    /// A string field is not valid UTF-8.
    #[error("string at offset {position} is not valid UTF-8")]
    InvalidUtf8 { position: usize },
}

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A low-level read failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A packet type with this id is already registered.
    #[error("packet id {0} is already registered")]
    DuplicatePacketId(PacketId),

    /// No packet type is registered for this id.
    #[error("no packet registered for id {0}")]
    UnknownPacket(PacketId),

    /// The packet body could not be decoded.
    #[error("malformed packet {id}: {reason}")]
    Malformed { id: PacketId, reason: String },

    /// The message decoded but violates a protocol rule,
    /// e.g. a string field longer than the packet allows.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
