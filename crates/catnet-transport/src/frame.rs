//! Datagram framing used by [`UdpTransport`](crate::UdpTransport).
//!
//! Every datagram starts with one kind byte:
//!
//! ```text
//! 1 connect     [channels: u8]
//! 2 accept      [channels: u8]
//! 3 disconnect
//! 4 data        [channel: u8][flags: u32 LE][payload ...]
//! ```
//!
//! This header is private to the transport. Applications only ever see the
//! payload of data frames.

use crate::SendFlags;

const KIND_CONNECT: u8 = 1;
const KIND_ACCEPT: u8 = 2;
const KIND_DISCONNECT: u8 = 3;
const KIND_DATA: u8 = 4;

/// Bytes of header in front of a data payload.
pub(crate) const DATA_HEADER_LEN: usize = 6;

/// A decoded datagram, borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Frame<'a> {
    Connect { channels: u8 },
    Accept { channels: u8 },
    Disconnect,
    Data {
        channel: u8,
        flags: SendFlags,
        payload: &'a [u8],
    },
}

impl<'a> Frame<'a> {
    /// Appends the encoded frame to `out`.
    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Self::Connect { channels } => {
                out.extend_from_slice(&[KIND_CONNECT, channels]);
            }
            Self::Accept { channels } => {
                out.extend_from_slice(&[KIND_ACCEPT, channels]);
            }
            Self::Disconnect => out.push(KIND_DISCONNECT),
            Self::Data {
                channel,
                flags,
                payload,
            } => {
                out.reserve(DATA_HEADER_LEN + payload.len());
                out.push(KIND_DATA);
                out.push(channel);
                out.extend_from_slice(&flags.bits().to_le_bytes());
                out.extend_from_slice(payload);
            }
        }
    }

    /// Parses a datagram. Returns `None` for anything malformed.
    pub(crate) fn decode(datagram: &'a [u8]) -> Option<Self> {
        let (&kind, rest) = datagram.split_first()?;
        match (kind, rest) {
            (KIND_CONNECT, [channels]) => Some(Self::Connect {
                channels: *channels,
            }),
            (KIND_ACCEPT, [channels]) => Some(Self::Accept {
                channels: *channels,
            }),
            (KIND_DISCONNECT, []) => Some(Self::Disconnect),
            (KIND_DATA, [channel, f0, f1, f2, f3, payload @ ..]) => {
                Some(Self::Data {
                    channel: *channel,
                    flags: SendFlags::from_bits(u32::from_le_bytes([
                        *f0, *f1, *f2, *f3,
                    ])),
                    payload,
                })
            }
            _ => None,
        }
    }
}
