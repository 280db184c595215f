//! Error types for the session layer.

use arena_transport::ConnectionId;

use crate::PlayerId;

/// Errors that can occur while establishing or ending a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The [`Authenticator`](crate::Authenticator) rejected the token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The player is already logged in on another connection.
    #[error("player {0} is already logged in")]
    AlreadyLoggedIn(PlayerId),

    /// The connection already carries a session.
    #[error("{0} already has a session")]
    SessionExists(ConnectionId),

    /// The connection has no session to end.
    #[error("{0} is not logged in")]
    NotLoggedIn(ConnectionId),
}
