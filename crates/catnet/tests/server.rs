//! Integration tests for the catnet server, client and full message flow
//! over real UDP sockets on localhost.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use catnet::prelude::*;
use catnet::protocol::encode_packet;

// =========================================================================
// Test packets
// =========================================================================

const HELLO: PacketId = PacketId(0x05);
const WELCOME: PacketId = PacketId(0x06);
const CHAT: PacketId = PacketId(0x20);
const CHAT_RELAY: PacketId = PacketId(0x21);

type Sink<T> = Arc<Mutex<Vec<T>>>;

/// Client → server greeting. The server answers with `Welcome`.
#[derive(Debug, Default)]
struct Hello;

impl Packet for Hello {
    fn id(&self) -> PacketId {
        HELLO
    }

    fn serialize(&self, _: &mut ByteWriter) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn deserialize(&mut self, _: &mut ByteReader) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn process(&mut self, ctx: &mut PacketContext) -> ProcessResult {
        match ctx.user() {
            Some(user) => {
                ctx.reply(Welcome { user, sink: None });
                ProcessResult::Success
            }
            None => ProcessResult::Failure,
        }
    }
}

/// Server → client: tells the client its user id.
#[derive(Debug, Default)]
struct Welcome {
    user: UserId,
    sink: Option<Sink<UserId>>,
}

impl Packet for Welcome {
    fn id(&self) -> PacketId {
        WELCOME
    }

    fn serialize(&self, writer: &mut ByteWriter) -> Result<(), ProtocolError> {
        writer.write(self.user);
        Ok(())
    }

    fn deserialize(&mut self, reader: &mut ByteReader) -> Result<(), ProtocolError> {
        self.user = reader.read()?;
        Ok(())
    }

    fn process(&mut self, _: &mut PacketContext) -> ProcessResult {
        if let Some(sink) = &self.sink {
            sink.lock().unwrap().push(self.user);
        }
        ProcessResult::Success
    }
}

#[derive(Debug, Default)]
struct Chat {
    text: String,
}

impl Packet for Chat {
    fn id(&self) -> PacketId {
        CHAT
    }

    fn serialize(&self, writer: &mut ByteWriter) -> Result<(), ProtocolError> {
        writer.write_str(&self.text);
        Ok(())
    }

    fn deserialize(&mut self, reader: &mut ByteReader) -> Result<(), ProtocolError> {
        self.text = reader.read_string()?;
        Ok(())
    }

    fn process(&mut self, ctx: &mut PacketContext) -> ProcessResult {
        let Some(from) = ctx.user() else {
            return ProcessResult::Failure;
        };
        ctx.broadcast(ChatRelay {
            from,
            text: std::mem::take(&mut self.text),
            sink: None,
        });
        ProcessResult::Success
    }
}

#[derive(Debug, Default)]
struct ChatRelay {
    from: UserId,
    text: String,
    sink: Option<Sink<(UserId, String)>>,
}

impl Packet for ChatRelay {
    fn id(&self) -> PacketId {
        CHAT_RELAY
    }

    fn serialize(&self, writer: &mut ByteWriter) -> Result<(), ProtocolError> {
        writer.write(self.from);
        writer.write_str(&self.text);
        Ok(())
    }

    fn deserialize(&mut self, reader: &mut ByteReader) -> Result<(), ProtocolError> {
        self.from = reader.read()?;
        self.text = reader.read_string()?;
        Ok(())
    }

    fn process(&mut self, _: &mut PacketContext) -> ProcessResult {
        if let Some(sink) = &self.sink {
            sink.lock().unwrap().push((self.from, self.text.clone()));
        }
        ProcessResult::Success
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn server_registry() -> PacketRegistry {
    let mut registry = PacketRegistry::new();
    registry.register_default::<Hello>(HELLO).unwrap();
    registry.register_default::<Chat>(CHAT).unwrap();
    registry
}

/// A client registry whose packets report into the given sinks.
fn client_registry(
    welcomes: &Sink<UserId>,
    relays: &Sink<(UserId, String)>,
) -> PacketRegistry {
    let mut registry = PacketRegistry::new();
    let sink = Arc::clone(welcomes);
    registry
        .register(WELCOME, move || {
            Box::new(Welcome {
                user: UserId(0),
                sink: Some(Arc::clone(&sink)),
            })
        })
        .unwrap();
    let sink = Arc::clone(relays);
    registry
        .register(CHAT_RELAY, move || {
            Box::new(ChatRelay {
                sink: Some(Arc::clone(&sink)),
                ..ChatRelay::default()
            })
        })
        .unwrap();
    registry
}

fn test_config(max_users: usize) -> NetConfig {
    NetConfig {
        host: "127.0.0.1".into(),
        port: 0,
        max_users,
        poll_timeout_ms: 2,
        ..NetConfig::default()
    }
}

async fn start_server(max_users: usize) -> Server<UdpTransport> {
    Server::builder()
        .config(test_config(max_users))
        .registry(server_registry())
        .build(UdpTransport::new())
        .await
        .expect("server should start")
}

async fn start_client(
    server: &Server<UdpTransport>,
    registry: PacketRegistry,
) -> Client<UdpTransport> {
    let addr = server.local_addr().expect("server is bound");
    Client::builder()
        .config(NetConfig {
            port: addr.port(),
            ..test_config(1)
        })
        .registry(registry)
        .connect(UdpTransport::new())
        .await
        .expect("client should connect")
}

/// Polls the server and every client in turn until `done` holds.
/// Returns `false` if it never did.
async fn pump(
    server: &mut Server<UdpTransport>,
    clients: &mut [&mut Client<UdpTransport>],
    done: impl Fn(&[&mut Client<UdpTransport>]) -> bool,
) -> bool {
    for _ in 0..500 {
        server.poll().await.unwrap();
        for client in clients.iter_mut() {
            client.poll().await.unwrap();
        }
        if done(clients) {
            return true;
        }
    }
    false
}

fn sinks() -> (Sink<UserId>, Sink<(UserId, String)>) {
    (Arc::default(), Arc::default())
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test]
async fn test_client_connects_and_gets_user_id() {
    let mut server = start_server(4).await;
    let (welcomes, relays) = sinks();
    let mut client = start_client(&server, client_registry(&welcomes, &relays)).await;
    assert!(client.is_connecting());

    assert!(pump(&mut server, &mut [&mut client], |c| c[0].is_connected()).await);

    client.send(&Hello).await.unwrap();
    let welcomed = {
        let welcomes = Arc::clone(&welcomes);
        pump(&mut server, &mut [&mut client], move |_| {
            !welcomes.lock().unwrap().is_empty()
        })
        .await
    };
    assert!(welcomed, "no Welcome received");
    assert_eq!(*welcomes.lock().unwrap(), vec![UserId(0)]);
    assert_eq!(server.users().lock().await.active_users(), vec![UserId(0)]);
}

#[tokio::test]
async fn test_second_client_gets_next_id() {
    let mut server = start_server(4).await;
    let (welcomes_a, relays) = sinks();
    let (welcomes_b, _) = sinks();
    let mut a = start_client(&server, client_registry(&welcomes_a, &relays)).await;
    let mut b = start_client(&server, client_registry(&welcomes_b, &relays)).await;

    assert!(
        pump(&mut server, &mut [&mut a, &mut b], |c| {
            c.iter().all(|c| c.is_connected())
        })
        .await
    );

    a.send(&Hello).await.unwrap();
    b.send(&Hello).await.unwrap();
    let (wa, wb) = (Arc::clone(&welcomes_a), Arc::clone(&welcomes_b));
    assert!(
        pump(&mut server, &mut [&mut a, &mut b], move |_| {
            !wa.lock().unwrap().is_empty() && !wb.lock().unwrap().is_empty()
        })
        .await
    );

    let mut ids = vec![welcomes_a.lock().unwrap()[0], welcomes_b.lock().unwrap()[0]];
    ids.sort();
    assert_eq!(ids, vec![UserId(0), UserId(1)]);
}

#[tokio::test]
async fn test_connect_beyond_user_pool_is_refused() {
    let mut server = start_server(1).await;
    let (welcomes, relays) = sinks();
    let mut first = start_client(&server, client_registry(&welcomes, &relays)).await;
    assert!(pump(&mut server, &mut [&mut first], |c| c[0].is_connected()).await);

    let mut second = start_client(&server, client_registry(&welcomes, &relays)).await;
    let refused = pump(&mut server, &mut [&mut first, &mut second], |c| {
        c[1].state() == ClientState::Disconnected
    })
    .await;

    assert!(refused, "second client should be disconnected");
    assert!(first.is_connected());
    assert_eq!(server.users().lock().await.len(), 1);
}

#[tokio::test]
async fn test_disconnect_releases_user_id_and_fires_callbacks() {
    let connects = Arc::new(AtomicUsize::new(0));
    let disconnects = Arc::new(AtomicUsize::new(0));
    let (c, d) = (Arc::clone(&connects), Arc::clone(&disconnects));

    let mut server = Server::builder()
        .config(test_config(4))
        .registry(server_registry())
        .on(EventKind::Connect, move |e| {
            assert!(e.user.is_some());
            c.fetch_add(1, Ordering::SeqCst);
        })
        .on(EventKind::Disconnect, move |e| {
            assert_eq!(e.user, Some(UserId(0)));
            d.fetch_add(1, Ordering::SeqCst);
        })
        .build(UdpTransport::new())
        .await
        .unwrap();

    let (welcomes, relays) = sinks();
    let mut client = start_client(&server, client_registry(&welcomes, &relays)).await;
    assert!(pump(&mut server, &mut [&mut client], |c| c[0].is_connected()).await);
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    client.disconnect().await.unwrap();
    for _ in 0..500 {
        server.poll().await.unwrap();
        if disconnects.load(Ordering::SeqCst) == 1 {
            break;
        }
    }

    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert!(server.users().lock().await.is_empty());
}

#[tokio::test]
async fn test_kick_disconnects_client() {
    let mut server = start_server(4).await;
    let (welcomes, relays) = sinks();
    let mut client = start_client(&server, client_registry(&welcomes, &relays)).await;
    assert!(pump(&mut server, &mut [&mut client], |c| c[0].is_connected()).await);

    server.kick(UserId(0)).await.unwrap();

    assert!(server.users().lock().await.is_empty());
    assert!(
        pump(&mut server, &mut [&mut client], |c| {
            c[0].state() == ClientState::Disconnected
        })
        .await
    );
    assert!(matches!(
        server.kick(UserId(0)).await,
        Err(CatnetError::Session(_))
    ));
}

// =========================================================================
// Messaging
// =========================================================================

#[tokio::test]
async fn test_chat_is_broadcast_to_every_user() {
    let mut server = start_server(4).await;
    let (welcomes, relays_a) = sinks();
    let (_, relays_b) = sinks();
    let mut a = start_client(&server, client_registry(&welcomes, &relays_a)).await;
    let mut b = start_client(&server, client_registry(&welcomes, &relays_b)).await;
    assert!(
        pump(&mut server, &mut [&mut a, &mut b], |c| {
            c.iter().all(|c| c.is_connected())
        })
        .await
    );

    a.send(&Hello).await.unwrap();
    a.send(&Chat { text: "purr".into() }).await.unwrap();
    let (w, ra, rb) = (
        Arc::clone(&welcomes),
        Arc::clone(&relays_a),
        Arc::clone(&relays_b),
    );
    assert!(
        pump(&mut server, &mut [&mut a, &mut b], move |_| {
            !w.lock().unwrap().is_empty()
                && !ra.lock().unwrap().is_empty()
                && !rb.lock().unwrap().is_empty()
        })
        .await
    );

    let sender = welcomes.lock().unwrap()[0];
    let got_a = relays_a.lock().unwrap()[0].clone();
    let got_b = relays_b.lock().unwrap()[0].clone();
    assert_eq!(got_a, got_b);
    assert_eq!(got_a, (sender, "purr".to_string()));
}

#[tokio::test]
async fn test_unknown_and_malformed_messages_are_dropped() {
    let messages = Arc::new(AtomicUsize::new(0));
    let m = Arc::clone(&messages);
    let mut server = Server::builder()
        .config(test_config(4))
        .registry(server_registry())
        .on(EventKind::Message, move |_| {
            m.fetch_add(1, Ordering::SeqCst);
        })
        .build(UdpTransport::new())
        .await
        .unwrap();

    let (welcomes, relays) = sinks();
    let mut client = start_client(&server, client_registry(&welcomes, &relays)).await;
    assert!(pump(&mut server, &mut [&mut client], |c| c[0].is_connected()).await);

    // Unknown id, then a Chat whose string is cut short, then an empty message.
    client.send_bytes(&[0xEE, 1, 2, 3]).await.unwrap();
    let mut writer = ByteWriter::new();
    encode_packet(&Chat { text: "truncated".into() }, &mut writer).unwrap();
    let bytes = writer.into_inner();
    client.send_bytes(&bytes[..bytes.len() - 2]).await.unwrap();
    client.send_bytes(&[]).await.unwrap();
    // The connection still works afterwards.
    client.send(&Hello).await.unwrap();

    let w = Arc::clone(&welcomes);
    assert!(
        pump(&mut server, &mut [&mut client], move |_| {
            !w.lock().unwrap().is_empty()
        })
        .await
    );
    assert_eq!(messages.load(Ordering::SeqCst), 4);
    assert!(relays.lock().unwrap().is_empty());
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_send_before_connected_returns_not_connected() {
    let server = start_server(4).await;
    let (welcomes, relays) = sinks();
    let mut client = start_client(&server, client_registry(&welcomes, &relays)).await;

    assert!(matches!(
        client.send(&Hello).await,
        Err(CatnetError::NotConnected)
    ));
}

#[tokio::test]
async fn test_send_to_unknown_user_returns_session_error() {
    let mut server = start_server(4).await;
    let err = server
        .send_to(UserId(2), &Welcome::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CatnetError::Session(_)));
    assert_eq!(server.broadcast(&Welcome::default()).await.unwrap(), 0);
}

// =========================================================================
// Builder and shutdown
// =========================================================================

#[tokio::test]
async fn test_build_with_invalid_config_fails() {
    let result = Server::builder()
        .config(NetConfig {
            channels: 0,
            ..test_config(4)
        })
        .build(UdpTransport::new())
        .await;
    assert!(matches!(result, Err(CatnetError::Config(_))));
}

#[tokio::test]
async fn test_run_until_stops_on_shutdown_signal() {
    let mut server = start_server(4).await;
    assert!(server.ipaddress().starts_with("127.0.0.1:"));

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tx.send(()).unwrap();
    server
        .run_until(async {
            let _ = rx.await;
        })
        .await
        .unwrap();

    assert!(!server.is_running());
    assert!(server.local_addr().is_none());
}
