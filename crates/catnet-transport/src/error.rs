use crate::PeerHandle;

/// Errors that can occur in the transport layer.
///
/// Host lifecycle mistakes (creating a host twice, using one before
/// initialization) are reported here as values instead of aborting.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// `initialize()` has not been called, or `deinitialize()` ran since.
    #[error("transport is not initialized")]
    NotInitialized,

    /// A server or client host already exists on this transport.
    #[error("a host already exists on this transport")]
    HostAlreadyExists,

    /// The operation needs a host but none has been created.
    #[error("no host has been created")]
    NoHost,

    /// Every peer slot of the host is in use.
    #[error("no available peers for initiating a connection")]
    NoAvailablePeers,

    /// The peer is not connected to this host.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerHandle),

    /// The channel is outside the range negotiated for the peer.
    #[error("channel {channel} out of range (limit {limit})")]
    InvalidChannel { channel: u8, limit: u8 },

    /// The payload does not fit in a single datagram.
    #[error("payload of {size} bytes exceeds maximum of {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// The remote address could not be resolved.
    #[error("could not resolve address {0}")]
    AddressResolution(String),

    /// The host socket cannot reach an address of the other IP family.
    #[error("local socket {local} cannot reach {remote}")]
    AddressFamily {
        local: std::net::SocketAddr,
        remote: std::net::SocketAddr,
    },

    /// Binding the local socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
