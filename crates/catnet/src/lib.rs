//! # catnet
//!
//! Packet-oriented client/server networking over a datagram transport.
//!
//! catnet turns a message-oriented transport into typed packets: you
//! implement [`Packet`](catnet_protocol::Packet) for each message, register
//! the types in a [`PacketRegistry`](catnet_protocol::PacketRegistry), and
//! the [`Server`] and [`Client`] handle connections, user ids, decoding
//! and dispatch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catnet::prelude::*;
//!
//! # async fn run() -> Result<(), CatnetError> {
//! let mut server = Server::builder()
//!     .config(NetConfig { port: 9000, ..NetConfig::default() })
//!     .registry(PacketRegistry::new())
//!     .build(UdpTransport::new())
//!     .await?;
//!
//! loop {
//!     server.poll().await?;
//! }
//! # }
//! ```

mod client;
mod config;
mod error;
mod events;
mod handler;
mod server;
pub mod telemetry;

pub use client::{Client, ClientBuilder, ClientState};
pub use config::{ConfigError, NetConfig};
pub use error::CatnetError;
pub use events::{EventHandlers, EventKind, NetEvent};
pub use server::{Server, ServerBuilder};

pub use catnet_protocol as protocol;
pub use catnet_session as session;
pub use catnet_transport as transport;

/// Everything needed to write a server or client.
pub mod prelude {
    pub use crate::{
        CatnetError, Client, ClientBuilder, ClientState, EventKind, NetConfig,
        NetEvent, Server, ServerBuilder,
    };
    pub use catnet_protocol::{
        ByteReader, ByteWriter, Packet, PacketContext, PacketId,
        PacketRegistry, ProcessResult, ProtocolError, UserId,
    };
    pub use catnet_session::{SharedUserTable, UserTable};
    pub use catnet_transport::{PeerHandle, Transport, UdpTransport};
}
