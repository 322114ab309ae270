//! Session types: the configuration and records of the user table.
//!
//! A "user" is the server's record of a connected peer. It tracks:
//! - WHO the peer is (the transport's handle)
//! - WHICH slot it occupies (its `UserId`)

use catnet_protocol::UserId;

/// Pool size used when nothing else is configured.
pub const DEFAULT_MAX_USERS: usize = 32;

/// Largest pool a table can hold: one slot per `u16` id.
pub const MAX_CAPACITY: usize = u16::MAX as usize + 1;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`UserTable`](crate::UserTable).
///
/// Sensible defaults are provided; override just the fields you care
/// about:
///
/// ```rust
/// use catnet_session::SessionConfig;
///
/// let config = SessionConfig { max_users: 4 };
/// assert_eq!(SessionConfig::default().max_users, 32);
/// # let _ = config;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Number of user ids in the pool. Ids run from `0` to
    /// `max_users - 1`. Values above [`MAX_CAPACITY`] are clamped.
    ///
    /// Default: 32.
    pub max_users: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_users: DEFAULT_MAX_USERS,
        }
    }
}

// ---------------------------------------------------------------------------
// UserEntry
// ---------------------------------------------------------------------------

/// One occupied slot of the table, as reported by
/// [`UserTable::iter`](crate::UserTable::iter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserEntry<P> {
    /// The slot index.
    pub user: UserId,

    /// The peer occupying it.
    pub peer: P,
}
