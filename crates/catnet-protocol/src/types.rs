//! Identity types shared by every catnet layer.
//!
//! Both are newtype wrappers around a small integer. The wrapper keeps a
//! packet id from being passed where a user id is expected, even though
//! each is just a number on the wire.

use std::fmt;

use crate::stream::Fixed;

// ---------------------------------------------------------------------------
// PacketId
// ---------------------------------------------------------------------------

/// The one-byte tag that leads every encoded packet.
///
/// The registry maps each id to a factory, so an id names exactly one
/// packet type within a registry. Printed in hex, e.g. `0x05`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(pub u8);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl From<u8> for PacketId {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl Fixed for PacketId {
    const SIZE: usize = 1;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.0);
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        u8::decode(bytes).map(Self)
    }
}

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// A small-integer user identifier, drawn from `0..capacity` of a
/// user table.
///
/// Ids are recycled: after a release the same number may be handed to a
/// different peer. Printed as `U-3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u16);

impl UserId {
    /// The id as a table index.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

impl Fixed for UserId {
    const SIZE: usize = u16::SIZE;

    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        u16::decode(bytes).map(Self)
    }
}
