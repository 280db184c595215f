//! The connection manager: owner of the `Connection` protocol family.
//!
//! Tracks one [`Session`] per logged-in connection and enforces one
//! connection per player. Like every manager it is driven from the single
//! analyzer context, so it keeps plain `HashMap`s and never locks.

use std::collections::HashMap;
use std::time::Instant;

use arena_protocol::{Manager, Packet, Peer, ProtocolError, kinds};
use arena_transport::ConnectionId;
use rand::Rng;

use crate::{Authenticator, PlayerId, Session, SessionError};

/// Handles `Login`, `Logout` and `Ping`.
///
/// ## Lifecycle
///
/// ```text
/// Login ──→ login() ──→ [session] ──→ Logout / disconnect ──→ (gone)
///                                          │
///                      shutdown() ─────────┘ (all sessions, auth closed)
/// ```
pub struct ConnectionManager<A> {
    auth: A,
    /// Sessions keyed by the connection that logged in.
    sessions: HashMap<ConnectionId, Session>,
    /// Reverse index, kept in sync with `sessions`.
    players: HashMap<PlayerId, ConnectionId>,
}

impl<A: Authenticator> ConnectionManager<A> {
    pub fn new(auth: A) -> Self {
        Self {
            auth,
            sessions: HashMap::new(),
            players: HashMap::new(),
        }
    }

    /// Authenticates `token` and opens a session on `connection`.
    ///
    /// # Errors
    /// - [`SessionError::SessionExists`] if `connection` is already logged in
    /// - [`SessionError::AuthFailed`] if the authenticator rejects the token
    /// - [`SessionError::AlreadyLoggedIn`] if the player is logged in on
    ///   another connection
    pub fn login(
        &mut self,
        connection: ConnectionId,
        token: &str,
        name: Option<String>,
    ) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&connection) {
            return Err(SessionError::SessionExists(connection));
        }
        let player_id = self.auth.authenticate(token)?;
        if self.players.contains_key(&player_id) {
            return Err(SessionError::AlreadyLoggedIn(player_id));
        }

        let session = Session {
            player_id,
            connection,
            name: name.unwrap_or_else(|| player_id.to_string()),
            token: generate_token(),
            since: Instant::now(),
        };
        tracing::info!(%player_id, %connection, name = %session.name, "session created");

        self.players.insert(player_id, connection);
        Ok(&*self.sessions.entry(connection).or_insert(session))
    }

    /// Ends the session on `connection`.
    ///
    /// # Errors
    /// [`SessionError::NotLoggedIn`] if the connection has no session.
    pub fn logout(&mut self, connection: ConnectionId) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(&connection)
            .ok_or(SessionError::NotLoggedIn(connection))?;
        self.players.remove(&session.player_id);
        tracing::info!(player_id = %session.player_id, %connection, "session ended");
        Ok(session)
    }

    /// Looks up the session on a connection.
    pub fn session(&self, connection: ConnectionId) -> Option<&Session> {
        self.sessions.get(&connection)
    }

    /// Finds the connection a player is logged in on.
    pub fn connection_of(&self, player_id: PlayerId) -> Option<ConnectionId> {
        self.players.get(&player_id).copied()
    }

    /// Returns the number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn handle_login(&mut self, peer: &Peer, packet: &Packet) {
        let reply = match read_login(packet) {
            Ok((token, name)) => match self.login(peer.id(), &token, name) {
                Ok(session) => Packet::new(kinds::LOGIN_ACCEPTED)
                    .with("player_id", session.player_id.0)
                    .with("name", session.name.clone())
                    .with("session_token", session.token.clone()),
                Err(e) => {
                    tracing::info!(conn_id = %peer.id(), error = %e, "login rejected");
                    rejected(e.to_string())
                }
            },
            Err(e) => rejected(e.to_string()),
        };
        peer.send(reply);
    }
}

impl<A: Authenticator> Manager for ConnectionManager<A> {
    fn analyze(&mut self, peer: &Peer, packet: Packet) {
        match packet.kind.as_str() {
            kinds::LOGIN => self.handle_login(peer, &packet),
            kinds::LOGOUT => match self.logout(peer.id()) {
                Ok(_) => {
                    peer.send(Packet::new(kinds::LOGGED_OUT));
                }
                Err(e) => tracing::debug!(conn_id = %peer.id(), error = %e, "ignoring logout"),
            },
            kinds::PING => {
                let mut pong = Packet::new(kinds::PONG);
                // Echo the client's timestamp so it can measure round trips.
                if let Some(sent_at) = packet.get("sent_at") {
                    pong = pong.with("sent_at", sent_at.clone());
                }
                peer.send(pong);
            }
            other => {
                tracing::warn!(conn_id = %peer.id(), kind = other, "connection manager got foreign packet");
            }
        }
    }

    fn disconnect(&mut self, peer: &Peer) {
        if let Some(session) = self.sessions.remove(&peer.id()) {
            self.players.remove(&session.player_id);
            tracing::info!(
                player_id = %session.player_id,
                conn_id = %peer.id(),
                "session closed by disconnect"
            );
        }
    }

    fn shutdown(&mut self) {
        tracing::info!(sessions = self.sessions.len(), "closing all sessions");
        self.sessions.clear();
        self.players.clear();
        self.auth.close();
    }
}

fn read_login(packet: &Packet) -> Result<(String, Option<String>), ProtocolError> {
    Ok((packet.field("token")?, packet.optional_field("name")?))
}

fn rejected(reason: String) -> Packet {
    Packet::new(kinds::LOGIN_REJECTED).with("reason", reason)
}

/// Generates a random 32-character hex string (128 bits).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
