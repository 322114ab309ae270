//! Encode and decode pipelines built from [`PacketRegistry`] and
//! [`Packet`].
//!
//! ```text
//! encode_packet:  write id byte → Packet::serialize
//! decode_packet:  read id byte → registry.create → Packet::deserialize
//! dispatch:       decode_packet → Packet::process
//! ```
//!
//! Failures come back as [`ProtocolError`] values. The caller's only job is
//! to log them and drop the message; nothing here tears down a connection.

use crate::{
    ByteReader, ByteWriter, Packet, PacketContext, PacketId, PacketRegistry,
    ProcessResult, ProtocolError,
};

/// Appends the packet id and then the packet's fields to `writer`.
///
/// If `serialize` fails, `writer` is truncated back to its previous length.
pub fn encode_packet(
    packet: &dyn Packet,
    writer: &mut ByteWriter,
) -> Result<(), ProtocolError> {
    let start = writer.len();
    writer.write(packet.id());
    if let Err(e) = packet.serialize(writer) {
        writer.truncate(start);
        return Err(e);
    }
    Ok(())
}

/// Reads one packet from `reader`.
///
/// # Errors
/// - [`ProtocolError::Stream`] if the id byte itself is missing.
/// - [`ProtocolError::UnknownPacket`] if no factory is registered.
/// - [`ProtocolError::Malformed`] if `deserialize` fails.
pub fn decode_packet(
    registry: &PacketRegistry,
    reader: &mut ByteReader,
) -> Result<Box<dyn Packet>, ProtocolError> {
    decode_with_id(registry, reader).map(|(_, packet)| packet)
}

fn decode_with_id(
    registry: &PacketRegistry,
    reader: &mut ByteReader,
) -> Result<(PacketId, Box<dyn Packet>), ProtocolError> {
    let id: PacketId = reader.read()?;
    let mut packet = registry
        .create(id)
        .ok_or(ProtocolError::UnknownPacket(id))?;

    packet
        .deserialize(reader)
        .map_err(|e| ProtocolError::Malformed {
            id,
            reason: e.to_string(),
        })?;

    if reader.remaining() > 0 {
        tracing::trace!(%id, trailing = reader.remaining(), "ignoring trailing bytes");
    }
    Ok((id, packet))
}

/// Decodes one packet and runs [`Packet::process`] on it.
///
/// Returns the id byte read off the wire alongside the process result so
/// the caller can report it.
pub fn dispatch(
    registry: &PacketRegistry,
    reader: &mut ByteReader,
    ctx: &mut PacketContext,
) -> Result<(PacketId, ProcessResult), ProtocolError> {
    let (id, mut packet) = decode_with_id(registry, reader)?;
    let result = packet.process(ctx);
    Ok((id, result))
}
