//! The user table: a fixed pool of user ids handed out to peers.
//!
//! # Allocation policy
//!
//! `acquire` always returns the lowest free id. Released ids go straight
//! back into the pool, so a freshly released id is the next one handed
//! out if nothing lower is free. The policy is deterministic: the same
//! sequence of calls always yields the same ids.
//!
//! # Concurrency note
//!
//! `UserTable` is NOT thread-safe by itself. The server owns one behind a
//! [`SharedUserTable`] mutex; every `acquire`/`release`/lookup goes
//! through that lock, which makes them linearizable.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use catnet_protocol::UserId;
use catnet_transport::PeerHandle;

use crate::{SessionConfig, SessionError, UserEntry, MAX_CAPACITY};

/// A user table shared between the server loop and application code.
pub type SharedUserTable<P = PeerHandle> = Arc<tokio::sync::Mutex<UserTable<P>>>;

/// Maps peers to dense user ids drawn from a fixed pool.
///
/// ## Lifecycle of one id
///
/// ```text
///            acquire(peer)              release(id) / release_peer(peer)
///   [free] ───────────────→ [in use] ───────────────────────────────→ [free]
/// ```
///
/// While an id is in use, `peer(id)` and `user(&peer)` agree with each
/// other. A peer holds at most one id at a time.
///
/// The table is generic over the peer type so it can be exercised without
/// a transport; the server uses [`PeerHandle`].
pub struct UserTable<P = PeerHandle> {
    /// Slot `i` holds the peer using `UserId(i)`, if any.
    slots: Vec<Option<P>>,

    /// Ids not currently in use. Ordered, so the first entry is the
    /// lowest free id.
    free: BTreeSet<UserId>,

    /// Reverse index from peer to its id. Kept in sync with `slots`.
    by_peer: HashMap<P, UserId>,
}

impl<P> UserTable<P>
where
    P: Copy + Eq + Hash + fmt::Debug,
{
    /// Creates a table with every id in `0..config.max_users` free.
    pub fn new(config: SessionConfig) -> Self {
        let capacity = if config.max_users > MAX_CAPACITY {
            tracing::warn!(
                requested = config.max_users,
                capacity = MAX_CAPACITY,
                "user pool clamped"
            );
            MAX_CAPACITY
        } else {
            config.max_users
        };

        Self {
            slots: vec![None; capacity],
            // `capacity <= MAX_CAPACITY`, so every index fits in a u16.
            free: (0..capacity).map(|i| UserId(i as u16)).collect(),
            by_peer: HashMap::with_capacity(capacity),
        }
    }

    /// Wraps the table for sharing across tasks.
    pub fn into_shared(self) -> SharedUserTable<P> {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    /// Gives `peer` the lowest free user id.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyAcquired`] if `peer` already holds an id;
    ///   the existing id is carried in the error and nothing changes.
    /// - [`SessionError::Exhausted`] if every id is taken.
    pub fn acquire(&mut self, peer: P) -> Result<UserId, SessionError> {
        if let Some(&user) = self.by_peer.get(&peer) {
            return Err(SessionError::AlreadyAcquired(user));
        }

        let user = self.free.pop_first().ok_or(SessionError::Exhausted {
            capacity: self.capacity(),
        })?;
        self.slots[user.index()] = Some(peer);
        self.by_peer.insert(peer, user);

        tracing::info!(%user, ?peer, active = self.len(), "user id acquired");
        Ok(user)
    }

    /// Returns the peer holding `user`.
    ///
    /// # Errors
    /// - [`SessionError::OutOfRange`] if `user` is not in the pool.
    /// - [`SessionError::Vacant`] if nobody holds it.
    pub fn peer(&self, user: UserId) -> Result<P, SessionError> {
        match self.slots.get(user.index()) {
            Some(Some(peer)) => Ok(*peer),
            Some(None) => Err(SessionError::Vacant(user)),
            None => Err(SessionError::OutOfRange {
                user,
                capacity: self.capacity(),
            }),
        }
    }

    /// Returns the id held by `peer`, if any.
    pub fn user(&self, peer: &P) -> Option<UserId> {
        self.by_peer.get(peer).copied()
    }

    /// Frees `user` and returns the peer that held it.
    ///
    /// Releasing a free or out-of-range id does nothing and returns
    /// `None`, so calling it twice is harmless.
    pub fn release(&mut self, user: UserId) -> Option<P> {
        let peer = self.slots.get_mut(user.index())?.take();
        match peer {
            Some(peer) => {
                self.by_peer.remove(&peer);
                self.free.insert(user);
                tracing::info!(%user, ?peer, active = self.len(), "user id released");
                Some(peer)
            }
            None => {
                tracing::debug!(%user, "release of unused user id ignored");
                None
            }
        }
    }

    /// Frees whatever id `peer` holds and returns it.
    ///
    /// An untracked peer is nothing to do and returns `None`.
    pub fn release_peer(&mut self, peer: &P) -> Option<UserId> {
        let Some(user) = self.user(peer) else {
            tracing::debug!(?peer, "release of untracked peer ignored");
            return None;
        };
        self.release(user);
        Some(user)
    }

    /// Ids in use, in ascending order.
    pub fn active_users(&self) -> Vec<UserId> {
        self.iter().map(|entry| entry.user).collect()
    }

    /// Occupied slots in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = UserEntry<P>> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.map(|peer| UserEntry {
                user: UserId(i as u16),
                peer,
            })
        })
    }

    /// Number of ids in use.
    pub fn len(&self) -> usize {
        self.by_peer.len()
    }

    /// Returns `true` if no id is in use.
    pub fn is_empty(&self) -> bool {
        self.by_peer.is_empty()
    }

    /// Size of the pool.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the next `acquire` would fail with
    /// [`SessionError::Exhausted`].
    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Frees every id.
    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.take().is_some() {
                self.free.insert(UserId(i as u16));
            }
        }
        self.by_peer.clear();
    }
}

impl<P> Default for UserTable<P>
where
    P: Copy + Eq + Hash + fmt::Debug,
{
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<P: fmt::Debug> fmt::Debug for UserTable<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserTable")
            .field("capacity", &self.slots.len())
            .field("active", &self.by_peer.len())
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================
