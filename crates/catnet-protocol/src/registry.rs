//! Runtime table from [`PacketId`] to packet factory.
//!
//! New packet types plug in by registering a constructor; nothing in the
//! decode path needs to know the concrete types. Registration is
//! first-wins: a second registration for the same id is rejected and the
//! table is left untouched.

use std::collections::HashMap;
use std::fmt;

use crate::{Packet, PacketId, ProtocolError};

type Factory = Box<dyn Fn() -> Box<dyn Packet> + Send + Sync>;

/// Maps packet ids to zero-argument constructors.
///
/// Fill it once at start-up, then hand it to the code that decodes
/// messages. `create` only needs `&self`, so a finished registry can be
/// shared between tasks without locking.
#[derive(Default)]
pub struct PacketRegistry {
    factories: HashMap<PacketId, Factory>,
}

impl PacketRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `id` with `factory`.
    ///
    /// # Errors
    /// [`ProtocolError::DuplicatePacketId`] if `id` is already taken. The
    /// existing factory is kept.
    pub fn register<F>(
        &mut self,
        id: PacketId,
        factory: F,
    ) -> Result<(), ProtocolError>
    where
        F: Fn() -> Box<dyn Packet> + Send + Sync + 'static,
    {
        if self.factories.contains_key(&id) {
            tracing::error!(%id, "packet id registered twice");
            return Err(ProtocolError::DuplicatePacketId(id));
        }
        self.factories.insert(id, Box::new(factory));
        tracing::debug!(%id, "packet registered");
        Ok(())
    }

    /// Registers `P` under `id`, built with `P::default()`.
    pub fn register_default<P>(&mut self, id: PacketId) -> Result<(), ProtocolError>
    where
        P: Packet + Default,
    {
        self.register(id, || Box::new(P::default()))
    }

    /// Builds a fresh packet for `id`, or `None` if nothing is registered.
    pub fn create(&self, id: PacketId) -> Option<Box<dyn Packet>> {
        self.factories.get(&id).map(|factory| factory())
    }

    /// Returns `true` if `id` has a factory.
    pub fn contains(&self, id: PacketId) -> bool {
        self.factories.contains_key(&id)
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<PacketId> {
        let mut ids: Vec<_> = self.factories.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for PacketRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
