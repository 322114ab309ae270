//! Per-message handling shared by server and client.
//!
//! The flow for one received message is:
//!   1. Read the id byte, create the packet from the registry
//!   2. Deserialize the remaining bytes
//!   3. Run `process` with a [`PacketContext`] for the sender
//!   4. Hand the context's outbox back to the caller for delivery
//!
//! Any failure in steps 1-2 drops the message. Nothing here can take the
//! connection down.

use catnet_protocol::{
    dispatch, ByteReader, Outgoing, PacketContext, PacketRegistry,
    ProcessResult, ProtocolError, UserId,
};
use catnet_transport::PeerHandle;

/// Runs the decode pipeline on one message and returns the packets it
/// queued for sending.
pub(crate) fn handle_message(
    registry: &PacketRegistry,
    peer: PeerHandle,
    user: Option<UserId>,
    data: Vec<u8>,
) -> Vec<Outgoing> {
    let len = data.len();
    let mut reader = ByteReader::new(data);
    let mut ctx = PacketContext::new(peer, user);

    match dispatch(registry, &mut reader, &mut ctx) {
        Ok((id, ProcessResult::Success)) => {
            tracing::trace!(%peer, %id, "packet processed");
        }
        Ok((id, ProcessResult::Failure)) => {
            tracing::debug!(%peer, %id, "packet rejected by process");
        }
        Ok((id, ProcessResult::Error(reason))) => {
            tracing::warn!(%peer, %id, %reason, "packet processing failed");
        }
        Err(ProtocolError::UnknownPacket(id)) => {
            tracing::debug!(%peer, %id, len, "dropping message with unknown packet id");
        }
        Err(e) => {
            tracing::debug!(%peer, len, error = %e, "dropping malformed message");
        }
    }

    ctx.take_outbox()
}

#[cfg(test)]
mod tests {
    use catnet_protocol::{
        encode_packet, ByteWriter, Packet, PacketId,
    };

    use super::*;

    #[derive(Debug, Default)]
    struct Knock {
        times: u8,
    }

    impl Packet for Knock {
        fn id(&self) -> PacketId {
            PacketId(0x40)
        }

        fn serialize(
            &self,
            writer: &mut ByteWriter,
        ) -> Result<(), ProtocolError> {
            writer.write(self.times);
            Ok(())
        }

        fn deserialize(
            &mut self,
            reader: &mut ByteReader,
        ) -> Result<(), ProtocolError> {
            self.times = reader.read()?;
            Ok(())
        }

        fn process(&mut self, ctx: &mut PacketContext) -> ProcessResult {
            match self.times {
                0 => ProcessResult::Error("knocked zero times".into()),
                1 => {
                    ctx.reply(Knock { times: 1 });
                    ProcessResult::Success
                }
                _ => {
                    ctx.broadcast(Knock { times: self.times });
                    ProcessResult::Success
                }
            }
        }
    }

    fn registry() -> PacketRegistry {
        let mut registry = PacketRegistry::new();
        registry.register_default::<Knock>(PacketId(0x40)).unwrap();
        registry
    }

    fn encoded(times: u8) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        encode_packet(&Knock { times }, &mut writer).unwrap();
        writer.into_inner()
    }

    #[test]
    fn test_handle_message_returns_reply() {
        let outbox = handle_message(
            &registry(),
            PeerHandle::new(1),
            Some(UserId(0)),
            encoded(1),
        );
        assert_eq!(outbox.len(), 1);
        assert!(matches!(outbox[0], Outgoing::Reply(_)));
    }

    #[test]
    fn test_handle_message_returns_broadcast() {
        let outbox =
            handle_message(&registry(), PeerHandle::new(1), None, encoded(3));
        assert!(matches!(outbox.as_slice(), [Outgoing::Broadcast(_)]));
    }

    #[test]
    fn test_handle_message_unknown_id_is_dropped() {
        let outbox = handle_message(
            &registry(),
            PeerHandle::new(1),
            None,
            vec![0x99, 1, 2],
        );
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_handle_message_truncated_is_dropped() {
        let outbox =
            handle_message(&registry(), PeerHandle::new(1), None, vec![0x40]);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_handle_message_empty_is_dropped() {
        let outbox =
            handle_message(&registry(), PeerHandle::new(1), None, Vec::new());
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_handle_message_process_error_queues_nothing() {
        let outbox =
            handle_message(&registry(), PeerHandle::new(1), None, encoded(0));
        assert!(outbox.is_empty());
    }
}
