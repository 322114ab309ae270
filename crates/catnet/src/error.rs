//! Unified error type for catnet.

use catnet_protocol::{ProtocolError, StreamError};
use catnet_session::SessionError;
use catnet_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `catnet` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates `From` impls, so the `?` operator
/// converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CatnetError {
    /// A transport-level error (host setup, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, registry).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A user table error (exhausted pool, unknown user id).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Invalid or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The client has no established connection to send on.
    #[error("not connected to a server")]
    NotConnected,
}

impl From<StreamError> for CatnetError {
    fn from(e: StreamError) -> Self {
        Self::Protocol(e.into())
    }
}
