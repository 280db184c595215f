//! Player sessions for the arena server.
//!
//! This crate owns the `Connection` protocol family:
//!
//! 1. **Authentication**: turning a login token into a [`PlayerId`]
//!    ([`Authenticator`] trait)
//! 2. **Session tracking**: which player sits behind which connection
//!    ([`ConnectionManager`])
//!
//! ```text
//! Lobby / Game managers (siblings)
//!     ↕
//! Connection manager (this crate)  ← Login, Logout, Ping
//!     ↕
//! Protocol layer (below)  ← Packet, Peer, Manager
//! ```

mod auth;
mod error;
mod manager;
mod session;

pub use auth::{Authenticator, DevAuthenticator};
pub use error::SessionError;
pub use manager::ConnectionManager;
pub use session::{PlayerId, Session};
