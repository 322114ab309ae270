//! `Server` builder and server loop.
//!
//! This is the entry point for running a catnet server. It ties together
//! all the layers: transport → protocol → session → application callbacks.
//!
//! One `Server` owns everything it needs: the transport host, the packet
//! registry, the user table and the event callbacks. Nothing is global, so
//! several servers can run in one process.

use std::future::Future;
use std::net::SocketAddr;

use catnet_protocol::{
    encode_packet, ByteWriter, Outgoing, Packet, PacketRegistry, UserId,
};
use catnet_session::{SessionError, SharedUserTable, UserTable};
use catnet_transport::{
    PeerHandle, RawEvent, SendFlags, Transport, TransportError,
};

use crate::events::{EventHandlers, EventKind, NetEvent};
use crate::handler::handle_message;
use crate::{CatnetError, NetConfig};

/// Builder for configuring and starting a [`Server`].
///
/// # Example
///
/// ```rust,no_run
/// use catnet::prelude::*;
///
/// # async fn run() -> Result<(), CatnetError> {
/// let mut server = Server::builder()
///     .config(NetConfig::default())
///     .on(EventKind::Connect, |e| println!("{} joined", e.peer))
///     .build(UdpTransport::new())
///     .await?;
/// server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: NetConfig,
    registry: PacketRegistry,
    handlers: EventHandlers,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the network configuration.
    pub fn config(mut self, config: NetConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the packet types the server understands.
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

    /// Validates the config, initializes `transport` and creates the
    /// server host.
    pub async fn build<T: Transport>(
        self,
        mut transport: T,
    ) -> Result<Server<T>, CatnetError> {
        self.config.validate()?;
        transport.initialize()?;
        transport
            .create_server(
                &self.config.host,
                self.config.port,
                self.config.channels,
                self.config.max_peers,
            )
            .await?;

        let users = UserTable::new(self.config.session_config()).into_shared();
        tracing::info!(
            addr = ?transport.local_addr(),
            max_users = self.config.max_users,
            packets = self.registry.len(),
            "catnet server started"
        );

        Ok(Server {
            transport,
            config: self.config,
            registry: self.registry,
            handlers: self.handlers,
            users,
            scratch: ByteWriter::with_capacity(256),
            running: true,
        })
    }
}

/// A running catnet server.
///
/// Drive it with [`poll`](Self::poll) from your own loop, or hand control
/// to [`run_until`](Self::run_until).
pub struct Server<T: Transport> {
    transport: T,
    config: NetConfig,
    registry: PacketRegistry,
    handlers: EventHandlers,
    users: SharedUserTable,
    /// Reused for every outgoing packet.
    scratch: ByteWriter,
    running: bool,
}

impl Server<catnet_transport::UdpTransport> {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }
}

impl<T: Transport> Server<T> {
    /// Waits up to the configured poll timeout for events and handles
    /// every one that arrived. Returns how many were handled.
    pub async fn poll(&mut self) -> Result<usize, CatnetError> {
        let events = self.transport.poll(self.config.poll_timeout()).await?;
        let count = events.len();
        self.handle_events(events).await;
        Ok(count)
    }

    /// Polls until `shutdown` completes, then shuts the server down.
    ///
    /// A batch of events that has already been received is always handled
    /// in full before `shutdown` is checked again. A failed poll is logged
    /// and retried; only losing the host itself ends the loop with an error.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), CatnetError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(addr = %self.ipaddress(), "catnet server running");

        while self.running {
            let timeout = self.config.poll_timeout();
            let events = tokio::select! {
                _ = &mut shutdown => break,
                polled = self.transport.poll(timeout) => match polled {
                    Ok(events) => events,
                    Err(e @ (TransportError::NoHost | TransportError::NotInitialized)) => {
                        return Err(e.into());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "transport poll failed");
                        tokio::time::sleep(timeout).await;
                        continue;
                    }
                },
            };
            self.handle_events(events).await;
        }

        self.shutdown().await;
        Ok(())
    }

    /// Encodes `packet` and sends it to the peer holding `user`.
    pub async fn send_to(
        &mut self,
        user: UserId,
        packet: &dyn Packet,
    ) -> Result<(), CatnetError> {
        let peer = self.users.lock().await.peer(user)?;
        self.send_to_peer(peer, packet).await
    }

    /// Encodes `packet` and sends it to `peer`.
    pub async fn send_to_peer(
        &mut self,
        peer: PeerHandle,
        packet: &dyn Packet,
    ) -> Result<(), CatnetError> {
        self.scratch.flush();
        encode_packet(packet, &mut self.scratch)?;
        self.transport
            .send(
                peer,
                self.config.send_channel,
                self.scratch.as_bytes(),
                SendFlags::RELIABLE,
            )
            .await?;
        Ok(())
    }

    /// Encodes `packet` once and sends it to every active user.
    ///
    /// A failed send to one user is logged and skipped. Returns how many
    /// users the packet was sent to.
    pub async fn broadcast(
        &mut self,
        packet: &dyn Packet,
    ) -> Result<usize, CatnetError> {
        self.scratch.flush();
        encode_packet(packet, &mut self.scratch)?;

        let entries: Vec<_> = self.users.lock().await.iter().collect();
        let mut delivered = 0;
        for entry in entries {
            match self
                .transport
                .send(
                    entry.peer,
                    self.config.send_channel,
                    self.scratch.as_bytes(),
                    SendFlags::RELIABLE,
                )
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(user = %entry.user, error = %e, "broadcast send failed");
                }
            }
        }
        Ok(delivered)
    }

    /// Frees the id held by `user` and disconnects its peer.
    ///
    /// The `Disconnect` callback fires as if the peer had left. The id is
    /// freed even if the peer cannot be notified; that failure is logged.
    pub async fn kick(&mut self, user: UserId) -> Result<(), CatnetError> {
        let peer = {
            let mut users = self.users.lock().await;
            let peer = users.peer(user)?;
            users.release(user);
            peer
        };
        if let Err(e) = self.transport.disconnect_peer(peer).await {
            tracing::warn!(%user, %peer, error = %e, "kick notice not delivered");
        }
        tracing::info!(%user, %peer, "user kicked");
        self.handlers.call(
            EventKind::Disconnect,
            &NetEvent {
                peer,
                user: Some(user),
                data: &[],
            },
        );
        Ok(())
    }

    /// The shared user table.
    pub fn users(&self) -> SharedUserTable {
        SharedUserTable::clone(&self.users)
    }

    /// The packet types this server understands.
    pub fn registry(&self) -> &PacketRegistry {
        &self.registry
    }

    /// The configuration the server was built with.
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// `host:port` the server listens on.
    pub fn ipaddress(&self) -> String {
        match self.transport.local_addr() {
            Some(addr) => addr.to_string(),
            None => self.config.address(),
        }
    }

    /// The bound socket address, if the host exists.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns `false` once [`shutdown`](Self::shutdown) has run.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Disconnects every peer, frees every user id and destroys the host.
    /// Calling it again does nothing.
    pub async fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        if let Err(e) = self.transport.disconnect().await {
            tracing::warn!(error = %e, "failed to notify peers of shutdown");
        }
        self.users.lock().await.clear();
        self.transport.deinitialize();
        tracing::info!("catnet server stopped");
    }

    // -----------------------------------------------------------------------
    // Event handling
    // -----------------------------------------------------------------------

    async fn handle_events(&mut self, events: Vec<RawEvent>) {
        for event in events {
            match event {
                RawEvent::Connect { peer } => self.on_connect(peer).await,
                RawEvent::Disconnect { peer } => self.on_disconnect(peer).await,
                RawEvent::Receive { peer, data, .. } => {
                    self.on_receive(peer, data).await;
                }
            }
        }
    }

    async fn on_connect(&mut self, peer: PeerHandle) {
        let acquired = self.users.lock().await.acquire(peer);
        let user = match acquired {
            Ok(user) => user,
            Err(SessionError::AlreadyAcquired(user)) => {
                tracing::debug!(%peer, %user, "duplicate connect ignored");
                return;
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "refusing connection");
                if let Err(e) = self.transport.disconnect_peer(peer).await {
                    tracing::debug!(%peer, error = %e, "refusal not delivered");
                }
                return;
            }
        };

        tracing::info!(%peer, %user, "peer connected");
        self.handlers.call(
            EventKind::Connect,
            &NetEvent {
                peer,
                user: Some(user),
                data: &[],
            },
        );
    }

    async fn on_disconnect(&mut self, peer: PeerHandle) {
        let user = self.users.lock().await.release_peer(&peer);
        tracing::info!(%peer, user = ?user, "peer disconnected");
        self.handlers.call(
            EventKind::Disconnect,
            &NetEvent {
                peer,
                user,
                data: &[],
            },
        );
    }

    async fn on_receive(&mut self, peer: PeerHandle, data: Vec<u8>) {
        let user = self.users.lock().await.user(&peer);
        self.handlers.call(
            EventKind::Message,
            &NetEvent {
                peer,
                user,
                data: &data,
            },
        );

        for outgoing in handle_message(&self.registry, peer, user, data) {
            let sent = match outgoing {
                Outgoing::Reply(packet) => {
                    self.send_to_peer(peer, &*packet).await
                }
                Outgoing::Broadcast(packet) => {
                    self.broadcast(&*packet).await.map(|_| ())
                }
            };
            if let Err(e) = sent {
                tracing::debug!(%peer, error = %e, "response not sent");
            }
        }
    }
}
