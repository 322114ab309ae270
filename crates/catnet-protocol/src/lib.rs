//! Wire protocol for catnet.
//!
//! This crate turns raw message bytes into typed packets and back:
//!
//! - **Streams** ([`ByteWriter`], [`ByteReader`]) append and read
//!   fixed-width values and length-prefixed strings.
//! - **Packets** ([`Packet`] trait) are message types that encode their
//!   own fields and optionally act on themselves once decoded.
//! - **Registry** ([`PacketRegistry`]) maps a one-byte [`PacketId`] to a
//!   factory for the matching packet type.
//! - **Pipeline** ([`encode_packet`], [`decode_packet`], [`dispatch`])
//!   strings the three together.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (user identity). It knows nothing about connections; the only
//! transport type it uses is [`PeerHandle`](catnet_transport::PeerHandle),
//! to tell a packet who sent it.
//!
//! ```text
//! Transport (bytes) → Protocol (Packet) → application logic
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod error;
mod packet;
mod pipeline;
mod registry;
mod stream;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::{ProtocolError, StreamError};
pub use packet::{Outgoing, Packet, PacketContext, ProcessResult};
pub use pipeline::{decode_packet, dispatch, encode_packet};
pub use registry::PacketRegistry;
pub use stream::{ByteReader, ByteWriter, Fixed};
pub use types::{PacketId, UserId};
