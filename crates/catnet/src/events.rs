//! Application callbacks for connection-level events.
//!
//! Each [`Server`](crate::Server) and [`Client`](crate::Client) owns one
//! [`EventHandlers`] table. There is no global dispatcher: handlers are
//! registered on the builder and travel with the object that fires them.

use std::collections::HashMap;
use std::fmt;

use catnet_protocol::UserId;
use catnet_transport::PeerHandle;

/// The three things that can happen to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    Connect = 1,
    Disconnect = 2,
    Message = 3,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Message => "message",
        };
        f.write_str(name)
    }
}

/// What a callback is told about an event.
#[derive(Debug, Clone, Copy)]
pub struct NetEvent<'a> {
    /// The peer involved.
    pub peer: PeerHandle,

    /// The peer's user id. `None` on clients, and for peers the server
    /// never admitted.
    pub user: Option<UserId>,

    /// Raw message bytes for [`EventKind::Message`]; empty otherwise.
    pub data: &'a [u8],
}

type Handler = Box<dyn FnMut(&NetEvent<'_>) + Send>;

/// One optional callback per [`EventKind`].
#[derive(Default)]
pub struct EventHandlers {
    handlers: HashMap<EventKind, Handler>,
}

impl EventHandlers {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the callback for `kind`, replacing any earlier one.
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: FnMut(&NetEvent<'_>) + Send + 'static,
    {
        if self.handlers.insert(kind, Box::new(handler)).is_some() {
            tracing::debug!(%kind, "event handler replaced");
        }
    }

    /// Runs the callback for `kind`. Returns `false` if none is set.
    pub fn call(&mut self, kind: EventKind, event: &NetEvent<'_>) -> bool {
        match self.handlers.get_mut(&kind) {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a callback is set for `kind`.
    pub fn contains(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
