//! Datagram transport implementation using tokio's `UdpSocket`.
//!
//! Connections are a two-message handshake (connect → accept) on top of
//! plain datagrams. Delivery is best effort: [`SendFlags`] are carried to
//! the receiver but no retransmission happens at this layer.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::frame::{DATA_HEADER_LEN, Frame};
use crate::{PeerHandle, RawEvent, SendFlags, Transport, TransportError};

/// Counter for generating unique peer handles.
static NEXT_PEER_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Largest UDP payload over IPv4.
const MAX_DATAGRAM: usize = 65_507;

/// Largest application payload that fits in one data frame.
pub const MAX_PAYLOAD: usize = MAX_DATAGRAM - DATA_HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Server,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    /// Connect sent, waiting for the remote accept.
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    addr: SocketAddr,
    channels: u8,
    state: LinkState,
}

/// The socket plus everything known about its peers.
struct Host {
    role: Role,
    socket: Arc<UdpSocket>,
    channels: u8,
    max_peers: usize,
    links: HashMap<PeerHandle, Link>,
    by_addr: HashMap<SocketAddr, PeerHandle>,
}

impl Host {
    fn new(
        role: Role,
        socket: UdpSocket,
        channels: u8,
        max_peers: usize,
    ) -> Self {
        Self {
            role,
            socket: Arc::new(socket),
            channels,
            max_peers,
            links: HashMap::new(),
            by_addr: HashMap::new(),
        }
    }

    fn insert(&mut self, addr: SocketAddr, link: Link) -> PeerHandle {
        let peer = PeerHandle::new(
            NEXT_PEER_HANDLE.fetch_add(1, Ordering::Relaxed),
        );
        self.links.insert(peer, link);
        self.by_addr.insert(addr, peer);
        peer
    }

    fn remove(&mut self, peer: PeerHandle) -> Option<Link> {
        let link = self.links.remove(&peer)?;
        self.by_addr.remove(&link.addr);
        Some(link)
    }
}

/// A UDP-based [`Transport`].
///
/// One instance holds at most one host: either a server bound to a known
/// address, or a client bound to an ephemeral port with a single peer slot.
pub struct UdpTransport {
    initialized: bool,
    host: Option<Host>,
    recv_buf: Vec<u8>,
    send_buf: Vec<u8>,
}

impl UdpTransport {
    /// Creates an uninitialized transport.
    pub fn new() -> Self {
        Self {
            initialized: false,
            host: None,
            recv_buf: Vec::new(),
            send_buf: Vec::new(),
        }
    }

    /// Returns `true` if `initialize()` has been called.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the number of peers currently known to the host.
    pub fn peer_count(&self) -> usize {
        self.host.as_ref().map_or(0, |host| host.links.len())
    }

    fn ensure_can_create(&self) -> Result<(), TransportError> {
        if !self.initialized {
            return Err(TransportError::NotInitialized);
        }
        if self.host.is_some() {
            return Err(TransportError::HostAlreadyExists);
        }
        Ok(())
    }

    /// Encodes `frame` into the reusable send buffer and sends it.
    async fn send_frame(
        socket: &UdpSocket,
        buf: &mut Vec<u8>,
        frame: Frame<'_>,
        addr: SocketAddr,
    ) -> Result<(), TransportError> {
        buf.clear();
        frame.encode(buf);
        socket
            .send_to(buf, addr)
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(())
    }

    /// Sends a handshake answer. Failures are logged, not returned, so one
    /// unreachable address never costs the rest of a poll batch.
    async fn answer(
        socket: &UdpSocket,
        buf: &mut Vec<u8>,
        frame: Frame<'_>,
        addr: SocketAddr,
    ) -> bool {
        match Self::send_frame(socket, buf, frame, addr).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(%addr, error = %e, "handshake answer not sent");
                false
            }
        }
    }

    /// Applies one received datagram to the host state.
    async fn handle_datagram(
        &mut self,
        len: usize,
        addr: SocketAddr,
        events: &mut Vec<RawEvent>,
    ) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        let Some(frame) = Frame::decode(&self.recv_buf[..len]) else {
            tracing::trace!(%addr, len, "ignoring malformed datagram");
            return;
        };
        let socket = Arc::clone(&host.socket);
        let known = host.by_addr.get(&addr).copied();

        match (frame, known) {
            (Frame::Connect { channels }, None) if host.role == Role::Server => {
                if host.links.len() >= host.max_peers {
                    tracing::debug!(%addr, "refusing connect: peer limit reached");
                    Self::answer(
                        &socket,
                        &mut self.send_buf,
                        Frame::Disconnect,
                        addr,
                    )
                    .await;
                    return;
                }
                let channels = negotiate(channels, host.channels);
                let peer = host.insert(
                    addr,
                    Link {
                        addr,
                        channels,
                        state: LinkState::Connected,
                    },
                );
                let accepted = Self::answer(
                    &socket,
                    &mut self.send_buf,
                    Frame::Accept { channels },
                    addr,
                )
                .await;
                if accepted {
                    tracing::debug!(%peer, %addr, channels, "accepted connection");
                    events.push(RawEvent::Connect { peer });
                } else {
                    // The remote never learned of the link; a retried connect
                    // starts over.
                    host.remove(peer);
                }
            }
            (Frame::Connect { .. }, Some(peer)) => {
                // The accept was lost; answer again without a second event.
                let channels =
                    host.links.get(&peer).map_or(host.channels, |l| l.channels);
                Self::answer(
                    &socket,
                    &mut self.send_buf,
                    Frame::Accept { channels },
                    addr,
                )
                .await;
            }
            (Frame::Accept { channels }, Some(peer)) => {
                if let Some(link) = host.links.get_mut(&peer) {
                    if link.state == LinkState::Connecting {
                        link.state = LinkState::Connected;
                        link.channels = negotiate(channels, link.channels);
                        tracing::debug!(%peer, %addr, "connection established");
                        events.push(RawEvent::Connect { peer });
                    }
                }
            }
            (Frame::Disconnect, Some(peer)) => {
                host.remove(peer);
                tracing::debug!(%peer, %addr, "peer disconnected");
                events.push(RawEvent::Disconnect { peer });
            }
            (
                Frame::Data {
                    channel,
                    flags,
                    payload,
                },
                Some(peer),
            ) => {
                let Some(link) = host
                    .links
                    .get(&peer)
                    .filter(|link| link.state == LinkState::Connected)
                else {
                    return;
                };
                if channel >= link.channels {
                    tracing::trace!(
                        %peer,
                        channel,
                        limit = link.channels,
                        "ignoring data on unnegotiated channel"
                    );
                    return;
                }
                events.push(RawEvent::Receive {
                    peer,
                    channel,
                    flags,
                    data: payload.to_vec(),
                });
            }
            (_, _) => {
                tracing::trace!(%addr, "ignoring datagram from unknown address");
            }
        }
    }
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Picks the channel count for a link. Zero means "no preference".
fn negotiate(requested: u8, limit: u8) -> u8 {
    if requested == 0 {
        limit
    } else {
        requested.min(limit)
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let target = format!("{host}:{port}");
    tokio::net::lookup_host(&target)
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or(TransportError::AddressResolution(target))
}

impl Transport for UdpTransport {
    fn initialize(&mut self) -> Result<(), TransportError> {
        if !self.initialized {
            self.initialized = true;
            self.recv_buf.resize(MAX_DATAGRAM, 0);
        }
        Ok(())
    }

    fn deinitialize(&mut self) {
        if let Some(host) = self.host.take() {
            tracing::debug!(peers = host.links.len(), "destroying host");
        }
        self.initialized = false;
    }

    async fn create_server(
        &mut self,
        host: &str,
        port: u16,
        channels: u8,
        max_peers: usize,
    ) -> Result<(), TransportError> {
        self.ensure_can_create()?;
        let addr = resolve(host, port).await?;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        let local = socket.local_addr().map_err(TransportError::BindFailed)?;
        tracing::info!(%local, channels, max_peers, "UDP server host created");
        self.host = Some(Host::new(Role::Server, socket, channels, max_peers));
        Ok(())
    }

    async fn create_client(
        &mut self,
        channels: u8,
    ) -> Result<(), TransportError> {
        self.ensure_can_create()?;
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::debug!(channels, "UDP client host created");
        self.host = Some(Host::new(Role::Client, socket, channels, 1));
        Ok(())
    }

    async fn connect(
        &mut self,
        host: &str,
        port: u16,
        channels: u8,
    ) -> Result<PeerHandle, TransportError> {
        if self.host.is_none() {
            return Err(TransportError::NoHost);
        }
        let addr = resolve(host, port).await?;
        let state = self.host.as_mut().ok_or(TransportError::NoHost)?;
        if state.links.len() >= state.max_peers {
            return Err(TransportError::NoAvailablePeers);
        }

        // An IPv4 wildcard socket cannot reach an IPv6 server. Only a client
        // may swap its socket; a server's peers are bound to the current one.
        let local = state.socket.local_addr().map_err(TransportError::BindFailed)?;
        if local.is_ipv4() != addr.is_ipv4() {
            if state.role == Role::Server {
                return Err(TransportError::AddressFamily { local, remote: addr });
            }
            let wildcard = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
            let socket = UdpSocket::bind(wildcard)
                .await
                .map_err(TransportError::BindFailed)?;
            state.socket = Arc::new(socket);
        }

        let channels = negotiate(channels, state.channels);
        let peer = state.insert(
            addr,
            Link {
                addr,
                channels,
                state: LinkState::Connecting,
            },
        );
        let socket = Arc::clone(&state.socket);
        Self::send_frame(
            &socket,
            &mut self.send_buf,
            Frame::Connect { channels },
            addr,
        )
        .await?;
        tracing::debug!(%peer, %addr, "connecting");
        Ok(peer)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(host) = self.host.as_mut() else {
            return Ok(());
        };
        let peers: Vec<PeerHandle> = host.links.keys().copied().collect();
        let mut first_err = None;
        for peer in peers {
            if let Err(e) = self.disconnect_peer(peer).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn disconnect_peer(
        &mut self,
        peer: PeerHandle,
    ) -> Result<(), TransportError> {
        let Some(host) = self.host.as_mut() else {
            return Ok(());
        };
        let Some(link) = host.remove(peer) else {
            return Ok(());
        };
        let socket = Arc::clone(&host.socket);
        tracing::debug!(%peer, addr = %link.addr, "disconnecting peer");
        Self::send_frame(&socket, &mut self.send_buf, Frame::Disconnect, link.addr)
            .await
    }

    async fn poll(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<RawEvent>, TransportError> {
        let socket = match &self.host {
            Some(host) => Arc::clone(&host.socket),
            None => return Err(TransportError::NoHost),
        };
        let mut events = Vec::new();

        let first = tokio::time::timeout(
            timeout,
            socket.recv_from(&mut self.recv_buf),
        )
        .await;
        match first {
            Err(_) => return Ok(events),
            Ok(Ok((len, addr))) => {
                self.handle_datagram(len, addr, &mut events).await;
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionReset => {
                // ICMP port-unreachable from an earlier send on some platforms.
                tracing::trace!(error = %e, "ignoring connection reset");
            }
            Ok(Err(e)) => return Err(TransportError::ReceiveFailed(e)),
        }

        loop {
            match socket.try_recv_from(&mut self.recv_buf) {
                Ok((len, addr)) => {
                    self.handle_datagram(len, addr, &mut events).await;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(TransportError::ReceiveFailed(e)),
            }
        }

        Ok(events)
    }

    async fn send(
        &mut self,
        peer: PeerHandle,
        channel: u8,
        data: &[u8],
        flags: SendFlags,
    ) -> Result<(), TransportError> {
        let host = self.host.as_ref().ok_or(TransportError::NoHost)?;
        let link = host
            .links
            .get(&peer)
            .filter(|link| link.state == LinkState::Connected)
            .ok_or(TransportError::UnknownPeer(peer))?;
        if channel >= link.channels {
            return Err(TransportError::InvalidChannel {
                channel,
                limit: link.channels,
            });
        }
        if data.len() > MAX_PAYLOAD {
            return Err(TransportError::PayloadTooLarge {
                size: data.len(),
                max: MAX_PAYLOAD,
            });
        }
        let addr = link.addr;
        let socket = Arc::clone(&host.socket);
        Self::send_frame(
            &socket,
            &mut self.send_buf,
            Frame::Data {
                channel,
                flags,
                payload: data,
            },
            addr,
        )
        .await
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.host
            .as_ref()
            .and_then(|host| host.socket.local_addr().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_zero_uses_limit() {
        assert_eq!(negotiate(0, 4), 4);
    }

    #[test]
    fn test_negotiate_caps_at_limit() {
        assert_eq!(negotiate(8, 2), 2);
        assert_eq!(negotiate(1, 2), 1);
    }

    #[test]
    fn test_new_transport_is_uninitialized() {
        let transport = UdpTransport::new();
        assert!(!transport.is_initialized());
        assert_eq!(transport.peer_count(), 0);
        assert!(transport.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_create_server_before_initialize_returns_error() {
        let mut transport = UdpTransport::new();
        let result = transport.create_server("127.0.0.1", 0, 1, 4).await;
        assert!(matches!(result, Err(TransportError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_create_host_twice_returns_error() {
        let mut transport = UdpTransport::new();
        transport.initialize().unwrap();
        transport.create_client(1).await.unwrap();
        let result = transport.create_server("127.0.0.1", 0, 1, 4).await;
        assert!(matches!(result, Err(TransportError::HostAlreadyExists)));
    }

    #[tokio::test]
    async fn test_connect_without_host_returns_error() {
        let mut transport = UdpTransport::new();
        transport.initialize().unwrap();
        let result = transport.connect("127.0.0.1", 9, 1).await;
        assert!(matches!(result, Err(TransportError::NoHost)));
    }

    #[tokio::test]
    async fn test_poll_without_host_returns_error() {
        let mut transport = UdpTransport::new();
        let result = transport.poll(Duration::ZERO).await;
        assert!(matches!(result, Err(TransportError::NoHost)));
    }

    #[tokio::test]
    async fn test_deinitialize_drops_host() {
        let mut transport = UdpTransport::new();
        transport.initialize().unwrap();
        transport.create_server("127.0.0.1", 0, 1, 4).await.unwrap();
        assert!(transport.local_addr().is_some());

        transport.deinitialize();

        assert!(!transport.is_initialized());
        assert!(transport.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_returns_error() {
        let mut transport = UdpTransport::new();
        transport.initialize().unwrap();
        transport.create_server("127.0.0.1", 0, 1, 4).await.unwrap();

        let peer = PeerHandle::new(u64::MAX);
        let result = transport.send(peer, 0, b"hi", SendFlags::NONE).await;

        assert!(matches!(result, Err(TransportError::UnknownPeer(p)) if p == peer));
    }

    async fn server_host(channels: u8) -> UdpTransport {
        let mut transport = UdpTransport::new();
        transport.initialize().unwrap();
        transport
            .create_server("127.0.0.1", 0, channels, 4)
            .await
            .unwrap();
        transport
    }

    /// Places `frame` in the receive buffer as if it had just arrived.
    fn stage(transport: &mut UdpTransport, frame: Frame<'_>) -> usize {
        let mut bytes = Vec::new();
        frame.encode(&mut bytes);
        transport.recv_buf[..bytes.len()].copy_from_slice(&bytes);
        bytes.len()
    }

    #[tokio::test]
    async fn test_handle_datagram_unanswerable_connect_leaves_no_link() {
        let mut transport = server_host(1).await;
        // An IPv4 socket cannot send to an IPv6 address.
        let addr: SocketAddr = "[::1]:4000".parse().unwrap();
        let len = stage(&mut transport, Frame::Connect { channels: 1 });

        let mut events = Vec::new();
        transport.handle_datagram(len, addr, &mut events).await;

        assert!(events.is_empty());
        assert_eq!(transport.peer_count(), 0);
    }

    #[tokio::test]
    async fn test_handle_datagram_failed_answer_keeps_earlier_events() {
        let mut transport = server_host(1).await;
        let remote = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let good = remote.local_addr().unwrap();
        let bad: SocketAddr = "[::1]:4000".parse().unwrap();

        let mut events = Vec::new();
        let len = stage(&mut transport, Frame::Connect { channels: 1 });
        transport.handle_datagram(len, good, &mut events).await;
        let len = stage(&mut transport, Frame::Connect { channels: 1 });
        transport.handle_datagram(len, bad, &mut events).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RawEvent::Connect { .. }));
        assert_eq!(transport.peer_count(), 1);
    }

    #[tokio::test]
    async fn test_handle_datagram_drops_data_on_unnegotiated_channel() {
        let mut transport = server_host(2).await;
        let remote = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = remote.local_addr().unwrap();

        let mut events = Vec::new();
        let len = stage(&mut transport, Frame::Connect { channels: 2 });
        transport.handle_datagram(len, addr, &mut events).await;
        for channel in [1, 2, 200] {
            let len = stage(
                &mut transport,
                Frame::Data {
                    channel,
                    flags: SendFlags::NONE,
                    payload: b"x",
                },
            );
            transport.handle_datagram(len, addr, &mut events).await;
        }

        let channels: Vec<u8> = events
            .iter()
            .filter_map(|event| match event {
                RawEvent::Receive { channel, .. } => Some(*channel),
                _ => None,
            })
            .collect();
        assert_eq!(channels, vec![1]);
    }

    #[tokio::test]
    async fn test_connect_from_server_to_other_family_keeps_socket() {
        let mut transport = server_host(1).await;
        let before = transport.local_addr();

        let result = transport.connect("[::1]", 9, 1).await;

        assert!(matches!(result, Err(TransportError::AddressFamily { .. })));
        assert_eq!(transport.local_addr(), before);
        assert_eq!(transport.peer_count(), 0);
    }
}
