//! The packet contract every message type implements.
//!
//! A packet knows how to write its own fields and read them back, and
//! optionally how to act on itself once decoded. It never touches its own
//! [`PacketId`]: the pipeline writes the id byte before `serialize` runs
//! and consumes it before `deserialize` runs.
//!
//! ```text
//! encode:  [id] ← pipeline      [fields ...] ← Packet::serialize
//! decode:  [id] → registry      [fields ...] → Packet::deserialize → process
//! ```

use std::fmt;

use catnet_transport::PeerHandle;

use crate::{ByteReader, ByteWriter, PacketId, ProtocolError, UserId};

/// A message type with its own binary encoding and handling logic.
///
/// Packets are created in their default state by a
/// [`PacketRegistry`](crate::PacketRegistry) factory and then filled in by
/// [`deserialize`](Self::deserialize). They are `Send` so a decoded packet
/// can be handed to another task.
///
/// # Example
///
/// ```rust
/// use catnet_protocol::{ByteReader, ByteWriter, Packet, PacketId, ProtocolError};
///
/// #[derive(Debug, Default)]
/// struct Ping {
///     nonce: u64,
/// }
///
/// impl Packet for Ping {
///     fn id(&self) -> PacketId {
///         PacketId(0x10)
///     }
///
///     fn serialize(&self, writer: &mut ByteWriter) -> Result<(), ProtocolError> {
///         writer.write(self.nonce);
///         Ok(())
///     }
///
///     fn deserialize(&mut self, reader: &mut ByteReader) -> Result<(), ProtocolError> {
///         self.nonce = reader.read()?;
///         Ok(())
///     }
/// }
/// ```
pub trait Packet: fmt::Debug + Send + 'static {
    /// The id this packet is registered under.
    fn id(&self) -> PacketId;

    /// Writes this packet's fields, not including the id byte.
    fn serialize(&self, writer: &mut ByteWriter) -> Result<(), ProtocolError>;

    /// Reads this packet's fields; the id byte is already consumed.
    ///
    /// On error the packet is left in an unspecified but safe state and
    /// should be dropped.
    fn deserialize(
        &mut self,
        reader: &mut ByteReader,
    ) -> Result<(), ProtocolError>;

    /// Runs this message's side effects.
    ///
    /// Pure-data packets can rely on the default, which does nothing.
    fn process(&mut self, ctx: &mut PacketContext) -> ProcessResult {
        let _ = ctx;
        ProcessResult::Success
    }
}

/// The outcome of [`Packet::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// The message was handled.
    Success,
    /// The message was understood but rejected.
    Failure,
    /// Handling broke down.
    Error(String),
}

impl ProcessResult {
    /// Returns `true` for [`ProcessResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

// ---------------------------------------------------------------------------
// PacketContext
// ---------------------------------------------------------------------------

/// A packet queued by [`Packet::process`] for delivery after it returns.
#[derive(Debug)]
pub enum Outgoing {
    /// Send back to the peer the message came from.
    Reply(Box<dyn Packet>),
    /// Send to every active user.
    Broadcast(Box<dyn Packet>),
}

/// Where a message came from, plus an outbox for responses.
///
/// `process` cannot reach the network directly. Instead it queues
/// packets here and the owner of the transport sends them once `process`
/// returns.
#[derive(Debug)]
pub struct PacketContext {
    peer: PeerHandle,
    user: Option<UserId>,
    outbox: Vec<Outgoing>,
}

impl PacketContext {
    /// Creates a context for a message from `peer`, known as `user` if the
    /// peer holds a user id.
    pub fn new(peer: PeerHandle, user: Option<UserId>) -> Self {
        Self {
            peer,
            user,
            outbox: Vec::new(),
        }
    }

    /// The peer the message came from.
    pub fn peer(&self) -> PeerHandle {
        self.peer
    }

    /// The sender's user id, if it has one.
    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    /// Queues `packet` for the origin peer.
    pub fn reply(&mut self, packet: impl Packet) {
        self.outbox.push(Outgoing::Reply(Box::new(packet)));
    }

    /// Queues `packet` for every active user.
    pub fn broadcast(&mut self, packet: impl Packet) {
        self.outbox.push(Outgoing::Broadcast(Box::new(packet)));
    }

    /// Packets queued so far, in order.
    pub fn outbox(&self) -> &[Outgoing] {
        &self.outbox
    }

    /// Empties the outbox, returning its packets in queue order.
    pub fn take_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }
}
