//! The demo packet catalog shared by `catnet-server` and `catnet-client`.
//!
//! ```text
//! id    packet      direction         fields
//! 0x05  Hello       client → server   (none)
//! 0x06  Welcome     server → client   user: UserId
//! 0x10  Ping        client → server   nonce: u64
//! 0x11  Pong        server → client   nonce: u64
//! 0x20  Chat        client → server   text: string (≤ 512 bytes)
//! 0x21  ChatRelay   server → clients  from: UserId, text: string
//! ```

use catnet::prelude::*;

pub const HELLO: PacketId = PacketId(0x05);
pub const WELCOME: PacketId = PacketId(0x06);
pub const PING: PacketId = PacketId(0x10);
pub const PONG: PacketId = PacketId(0x11);
pub const CHAT: PacketId = PacketId(0x20);
pub const CHAT_RELAY: PacketId = PacketId(0x21);

/// Longest chat line accepted, in bytes.
pub const MAX_CHAT_LEN: usize = 512;

/// Packets the server decodes.
pub fn server_registry() -> Result<PacketRegistry, ProtocolError> {
    let mut registry = PacketRegistry::new();
    registry.register_default::<Hello>(HELLO)?;
    registry.register_default::<Ping>(PING)?;
    registry.register_default::<Chat>(CHAT)?;
    Ok(registry)
}

/// Packets the client decodes.
pub fn client_registry() -> Result<PacketRegistry, ProtocolError> {
    let mut registry = PacketRegistry::new();
    registry.register_default::<Welcome>(WELCOME)?;
    registry.register_default::<Pong>(PONG)?;
    registry.register_default::<ChatRelay>(CHAT_RELAY)?;
    Ok(registry)
}

fn check_chat_len(text: &str) -> Result<(), ProtocolError> {
    if text.len() > MAX_CHAT_LEN {
        return Err(ProtocolError::InvalidMessage(format!(
            "chat text of {} bytes exceeds {MAX_CHAT_LEN}",
            text.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Hello / Welcome
// ---------------------------------------------------------------------------

/// Sent once by a client after connecting.
#[derive(Debug, Default)]
pub struct Hello;

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
        let Some(user) = ctx.user() else {
            return ProcessResult::Failure;
        };
        tracing::info!(%user, peer = %ctx.peer(), "hello");
        ctx.reply(Welcome { user });
        ProcessResult::Success
    }
}

/// Tells a client which user id it was given.
#[derive(Debug, Default)]
pub struct Welcome {
    pub user: UserId,
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
        println!("* joined as {}", self.user);
        ProcessResult::Success
    }
}

// ---------------------------------------------------------------------------
// Ping / Pong
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Ping {
    pub nonce: u64,
}

impl Packet for Ping {
    fn id(&self) -> PacketId {
        PING
    }

    fn serialize(&self, writer: &mut ByteWriter) -> Result<(), ProtocolError> {
        writer.write(self.nonce);
        Ok(())
    }

    fn deserialize(&mut self, reader: &mut ByteReader) -> Result<(), ProtocolError> {
        self.nonce = reader.read()?;
        Ok(())
    }

    fn process(&mut self, ctx: &mut PacketContext) -> ProcessResult {
        ctx.reply(Pong { nonce: self.nonce });
        ProcessResult::Success
    }
}

#[derive(Debug, Default)]
pub struct Pong {
    pub nonce: u64,
}

impl Packet for Pong {
    fn id(&self) -> PacketId {
        PONG
    }

    fn serialize(&self, writer: &mut ByteWriter) -> Result<(), ProtocolError> {
        writer.write(self.nonce);
        Ok(())
    }

    fn deserialize(&mut self, reader: &mut ByteReader) -> Result<(), ProtocolError> {
        self.nonce = reader.read()?;
        Ok(())
    }

    fn process(&mut self, _: &mut PacketContext) -> ProcessResult {
        println!("* pong {}", self.nonce);
        ProcessResult::Success
    }
}

// ---------------------------------------------------------------------------
// Chat / ChatRelay
// ---------------------------------------------------------------------------

/// A chat line from one client, relayed to everyone.
#[derive(Debug, Default)]
pub struct Chat {
    pub text: String,
}

impl Packet for Chat {
    fn id(&self) -> PacketId {
        CHAT
    }

    fn serialize(&self, writer: &mut ByteWriter) -> Result<(), ProtocolError> {
        check_chat_len(&self.text)?;
        writer.write_str(&self.text);
        Ok(())
    }

    fn deserialize(&mut self, reader: &mut ByteReader) -> Result<(), ProtocolError> {
        self.text = reader.read_string()?;
        check_chat_len(&self.text)
    }

    fn process(&mut self, ctx: &mut PacketContext) -> ProcessResult {
        let Some(from) = ctx.user() else {
            return ProcessResult::Failure;
        };
        ctx.broadcast(ChatRelay {
            from,
            text: std::mem::take(&mut self.text),
        });
        ProcessResult::Success
    }
}

#[derive(Debug, Default)]
pub struct ChatRelay {
    pub from: UserId,
    pub text: String,
}

impl Packet for ChatRelay {
    fn id(&self) -> PacketId {
        CHAT_RELAY
    }

    fn serialize(&self, writer: &mut ByteWriter) -> Result<(), ProtocolError> {
        check_chat_len(&self.text)?;
        writer.write(self.from);
        writer.write_str(&self.text);
        Ok(())
    }

    fn deserialize(&mut self, reader: &mut ByteReader) -> Result<(), ProtocolError> {
        self.from = reader.read()?;
        self.text = reader.read_string()?;
        check_chat_len(&self.text)
    }

    fn process(&mut self, _: &mut PacketContext) -> ProcessResult {
        println!("[{}] {}", self.from, self.text);
        ProcessResult::Success
    }
}
