//! Session types: who a logged-in connection belongs to.

use std::fmt;
use std::time::{Duration, Instant};

use arena_transport::ConnectionId;

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// A player's stable identity, as returned by the authenticator.
///
/// Unlike a [`ConnectionId`], which changes on every reconnect, the same
/// player always maps to the same `PlayerId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A logged-in player on one connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,
    pub connection: ConnectionId,
    /// Display name chosen at login; defaults to the player id.
    pub name: String,
    /// Secret handed to the client in `LoginAccepted`; 32 hex chars.
    pub token: String,
    /// When the login was accepted.
    pub since: Instant,
}

impl Session {
    /// How long the session has been alive.
    pub fn age(&self) -> Duration {
        self.since.elapsed()
    }
}
