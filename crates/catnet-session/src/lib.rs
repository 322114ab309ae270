//! User identity allocation for catnet.
//!
//! Every connected peer gets a small, dense [`UserId`] drawn from a fixed
//! pool, suitable as an index into per-user arrays elsewhere in the
//! application. The transport's [`PeerHandle`] stays opaque; only this
//! crate knows how the two map onto each other.
//!
//! # How it fits in the stack
//!
//! ```text
//! Application (above)  ← acquires on connect, releases on disconnect
//!     ↕
//! Session Layer (this crate)  ← PeerHandle ⇄ UserId
//!     ↕
//! Protocol Layer (below)  ← provides UserId
//! ```
//!
//! [`UserId`]: catnet_protocol::UserId
//! [`PeerHandle`]: catnet_transport::PeerHandle

mod error;
mod session;
mod table;

pub use error::SessionError;
pub use session::{SessionConfig, UserEntry, DEFAULT_MAX_USERS, MAX_CAPACITY};
pub use table::{SharedUserTable, UserTable};
