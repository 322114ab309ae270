//! Error types for the session layer.

use catnet_protocol::UserId;

/// Errors reported by [`UserTable`](crate::UserTable).
///
/// None of these are faults. Exhaustion is an expected condition when the
/// server is full; the others mean the caller asked about an id that is
/// not (or no longer) in use.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Every id in the pool is taken.
    #[error("all {capacity} user ids are in use")]
    Exhausted { capacity: usize },

    /// The peer already holds an id.
    #[error("peer already holds user id {0}")]
    AlreadyAcquired(UserId),

    /// The id is outside the pool.
    #[error("user id {user} is outside the pool of {capacity}")]
    OutOfRange { user: UserId, capacity: usize },

    /// The id is inside the pool but nobody holds it.
    #[error("user id {0} is not in use")]
    Vacant(UserId),
}
