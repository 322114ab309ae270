//! `Client` builder and poll loop.
//!
//! A client has exactly one peer: the server. It runs the same decode
//! pipeline as the server, so packets received from the server can
//! `process` themselves and queue replies.

use catnet_protocol::{encode_packet, ByteWriter, Outgoing, Packet, PacketRegistry};
use catnet_transport::{PeerHandle, RawEvent, SendFlags, Transport};

use crate::events::{EventHandlers, EventKind, NetEvent};
use crate::handler::handle_message;
use crate::{CatnetError, NetConfig};

/// Where the client is in its connection lifecycle.
///
/// ```text
///   Connecting ──(accept)──→ Connected ──(disconnect)──→ Disconnected
///        └─────────────(refused)──────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connecting,
    Connected,
    Disconnected,
}

/// Builder for configuring and connecting a [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: NetConfig,
    registry: PacketRegistry,
    handlers: EventHandlers,
}

impl ClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the network configuration. `host` and `port` name the server.
    pub fn config(mut self, config: NetConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the packet types the client understands.
    pub fn registry(mut self, registry: PacketRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the callback for one kind of connection event.
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: FnMut(&NetEvent<'_>) + Send + 'static,
    {
        self.handlers.on(kind, handler);
        self
    }

    /// Creates a client host on `transport` and starts connecting.
    ///
    /// Returns as soon as the connect request is sent; poll the client
    /// until [`Client::is_connected`] turns `true`.
    pub async fn connect<T: Transport>(
        self,
        mut transport: T,
    ) -> Result<Client<T>, CatnetError> {
        self.config.validate()?;
        transport.initialize()?;
        transport.create_client(self.config.channels).await?;
        let server = transport
            .connect(&self.config.host, self.config.port, self.config.channels)
            .await?;
        tracing::info!(server = %self.config.address(), %server, "connecting");

        Ok(Client {
            transport,
            config: self.config,
            registry: self.registry,
            handlers: self.handlers,
            server,
            state: ClientState::Connecting,
            scratch: ByteWriter::with_capacity(256),
        })
    }
}

/// A client connection to one catnet server.
pub struct Client<T: Transport> {
    transport: T,
    config: NetConfig,
    registry: PacketRegistry,
    handlers: EventHandlers,
    server: PeerHandle,
    state: ClientState,
    scratch: ByteWriter,
}

impl Client<catnet_transport::UdpTransport> {
    /// Creates a new builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<T: Transport> Client<T> {
    /// Waits up to the configured poll timeout for events and handles
    /// every one that arrived. Returns how many were handled.
    pub async fn poll(&mut self) -> Result<usize, CatnetError> {
        let events = self.transport.poll(self.config.poll_timeout()).await?;
        let count = events.len();
        for event in events {
            if event.peer() != self.server {
                tracing::debug!(peer = %event.peer(), "ignoring event from unknown peer");
                continue;
            }
            match event {
                RawEvent::Connect { peer } => {
                    self.state = ClientState::Connected;
                    tracing::info!(%peer, "connected to server");
                    self.fire(EventKind::Connect, &[]);
                }
                RawEvent::Disconnect { peer } => {
                    self.state = ClientState::Disconnected;
                    tracing::info!(%peer, "disconnected from server");
                    self.fire(EventKind::Disconnect, &[]);
                }
                RawEvent::Receive { data, .. } => {
                    self.fire(EventKind::Message, &data);
                    self.on_receive(data).await;
                }
            }
        }
        Ok(count)
    }

    /// Encodes `packet` and sends it to the server.
    pub async fn send(&mut self, packet: &dyn Packet) -> Result<(), CatnetError> {
        self.ensure_connected()?;
        self.scratch.flush();
        encode_packet(packet, &mut self.scratch)?;
        self.transport
            .send(
                self.server,
                self.config.send_channel,
                self.scratch.as_bytes(),
                SendFlags::RELIABLE,
            )
            .await?;
        Ok(())
    }

    /// Sends already-encoded bytes to the server unchanged.
    pub async fn send_bytes(&mut self, data: &[u8]) -> Result<(), CatnetError> {
        self.ensure_connected()?;
        self.transport
            .send(self.server, self.config.send_channel, data, SendFlags::RELIABLE)
            .await?;
        Ok(())
    }

    /// Returns `true` while waiting for the server to accept.
    pub fn is_connecting(&self) -> bool {
        self.state == ClientState::Connecting
    }

    /// Returns `true` once the server has accepted.
    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The handle of the server peer.
    pub fn server_peer(&self) -> PeerHandle {
        self.server
    }

    /// Drops the connection, notifying the server, and destroys the host.
    /// Calling it again does nothing.
    pub async fn disconnect(&mut self) -> Result<(), CatnetError> {
        if self.state == ClientState::Disconnected {
            return Ok(());
        }
        self.state = ClientState::Disconnected;
        self.transport.disconnect().await?;
        self.transport.deinitialize();
        tracing::info!("client disconnected");
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), CatnetError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(CatnetError::NotConnected)
        }
    }

    fn fire(&mut self, kind: EventKind, data: &[u8]) {
        self.handlers.call(
            kind,
            &NetEvent {
                peer: self.server,
                user: None,
                data,
            },
        );
    }

    async fn on_receive(&mut self, data: Vec<u8>) {
        // Clients have no user table: every outgoing packet goes to the
        // server, broadcasts included.
        for outgoing in handle_message(&self.registry, self.server, None, data) {
            let packet = match outgoing {
                Outgoing::Reply(packet) | Outgoing::Broadcast(packet) => packet,
            };
            if let Err(e) = self.send(&*packet).await {
                tracing::debug!(error = %e, "response not sent");
            }
        }
    }
}
