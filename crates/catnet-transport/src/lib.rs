//! Transport abstraction layer for catnet.
//!
//! Provides the [`Transport`] trait: the narrow capability set the rest of
//! catnet needs from a datagram host (create a server or client host,
//! connect, poll for events, send bytes to a peer). Connection setup,
//! reliability and congestion handling all live behind this trait.
//!
//! # Feature Flags
//!
//! - `udp` (default) — [`UdpTransport`], a datagram host on tokio's UDP socket

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "udp")]
mod frame;
#[cfg(feature = "udp")]
mod udp;

pub use error::TransportError;
#[cfg(feature = "udp")]
pub use udp::{UdpTransport, MAX_PAYLOAD};

use std::fmt;
use std::net::SocketAddr;
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

/// Opaque handle for a remote endpoint, owned by the transport.
///
/// Handles are never reused within one process, so a stale handle can
/// never alias a newer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerHandle(u64);

impl PeerHandle {
    /// Creates a new `PeerHandle` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Delivery flags attached to an outgoing message.
///
/// The flags travel with the message and are reported verbatim on the
/// receiving side in [`RawEvent::Receive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SendFlags(u32);

impl SendFlags {
    /// No flags: unreliable, sequenced.
    pub const NONE: Self = Self(0);
    /// Request reliable delivery.
    pub const RELIABLE: Self = Self(1 << 0);
    /// Request unsequenced delivery.
    pub const UNSEQUENCED: Self = Self(1 << 1);
    /// Fragment large unreliable payloads instead of upgrading them.
    pub const UNRELIABLE_FRAGMENT: Self = Self(1 << 3);

    /// Builds flags from their raw bit representation.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bit representation.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SendFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SendFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A network event produced by [`Transport::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// A peer finished connecting.
    Connect { peer: PeerHandle },

    /// A peer disconnected or refused the connection.
    Disconnect { peer: PeerHandle },

    /// One complete message arrived from a peer.
    Receive {
        peer: PeerHandle,
        channel: u8,
        flags: SendFlags,
        data: Vec<u8>,
    },
}

impl RawEvent {
    /// Returns the peer that generated this event.
    pub fn peer(&self) -> PeerHandle {
        match self {
            Self::Connect { peer }
            | Self::Disconnect { peer }
            | Self::Receive { peer, .. } => *peer,
        }
    }
}

/// A message-oriented host that can act as a server or a client.
///
/// The lifecycle mirrors a classic datagram library:
///
/// ```text
/// initialize() → create_server() | create_client() → connect()
///      → poll() / send() … → disconnect() → deinitialize()
/// ```
///
/// Each received message is delivered as exactly one
/// [`RawEvent::Receive`]; no additional framing is needed above this layer.
pub trait Transport: Send + 'static {
    /// Prepares the transport for use. Calling it again is a no-op.
    fn initialize(&mut self) -> Result<(), TransportError>;

    /// Destroys the host (if any) and forgets every peer.
    fn deinitialize(&mut self);

    /// Creates a server host listening on `host:port`.
    async fn create_server(
        &mut self,
        host: &str,
        port: u16,
        channels: u8,
        max_peers: usize,
    ) -> Result<(), TransportError>;

    /// Creates a client host with a single outgoing peer slot.
    async fn create_client(
        &mut self,
        channels: u8,
    ) -> Result<(), TransportError>;

    /// Starts connecting to a remote server.
    ///
    /// The returned handle becomes usable once a [`RawEvent::Connect`] for
    /// it is reported by [`poll`](Self::poll). `channels == 0` requests the
    /// host's own channel limit.
    async fn connect(
        &mut self,
        host: &str,
        port: u16,
        channels: u8,
    ) -> Result<PeerHandle, TransportError>;

    /// Drops the client's connection immediately, notifying the server.
    ///
    /// No local [`RawEvent::Disconnect`] is generated.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Drops one peer immediately, notifying it. Unknown peers are ignored.
    ///
    /// No local [`RawEvent::Disconnect`] is generated.
    async fn disconnect_peer(
        &mut self,
        peer: PeerHandle,
    ) -> Result<(), TransportError>;

    /// Waits up to `timeout` for the first event, then drains every event
    /// that is already queued without waiting further.
    async fn poll(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<RawEvent>, TransportError>;

    /// Sends one message to a connected peer.
    async fn send(
        &mut self,
        peer: PeerHandle,
        channel: u8,
        data: &[u8],
        flags: SendFlags,
    ) -> Result<(), TransportError>;

    /// Returns the local address of the host, if one exists.
    fn local_addr(&self) -> Option<SocketAddr>;
}
