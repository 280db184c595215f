//! Static packet registration: which family owns which packet kind.
//!
//! The protocol is closed. Every kind a client may send is registered
//! at startup, before any connection is accepted, and the dispatch core
//! routes by looking the kind up here. A kind that is not registered means
//! client and server disagree about the protocol.

use std::collections::HashMap;

use crate::{ProtocolError, ProtocolFamily};

/// Packet kind names used by the standard protocol.
pub mod kinds {
    // Connection family
    pub const LOGIN: &str = "Login";
    pub const LOGOUT: &str = "Logout";
    pub const PING: &str = "Ping";

    // Lobby family
    pub const LIST_LOBBIES: &str = "ListLobbies";
    pub const CREATE_LOBBY: &str = "CreateLobby";
    pub const JOIN_LOBBY: &str = "JoinLobby";
    pub const LEAVE_LOBBY: &str = "LeaveLobby";
    pub const SELECT_MAP: &str = "SelectMap";
    pub const START_GAME: &str = "StartGame";

    // Game family
    pub const PLAYER_INPUT: &str = "PlayerInput";
    pub const CAST_SPELL: &str = "CastSpell";
    pub const GAME_CHAT: &str = "GameChat";
    pub const LEAVE_GAME: &str = "LeaveGame";

    // Server to client. Never registered: clients do not send these.
    pub const WELCOME: &str = "Welcome";
    pub const LOGIN_ACCEPTED: &str = "LoginAccepted";
    pub const LOGIN_REJECTED: &str = "LoginRejected";
    pub const LOGGED_OUT: &str = "LoggedOut";
    pub const PONG: &str = "Pong";
    pub const LOBBY_LIST: &str = "LobbyList";
    pub const LOBBY_JOINED: &str = "LobbyJoined";
    pub const LOBBY_UPDATED: &str = "LobbyUpdated";
    pub const LOBBY_LEFT: &str = "LobbyLeft";
    pub const LOBBY_ERROR: &str = "LobbyError";
    pub const GAME_STARTING: &str = "GameStarting";
    pub const GAME_STARTED: &str = "GameStarted";
    pub const PLAYER_LEFT: &str = "PlayerLeft";
    pub const GAME_ERROR: &str = "GameError";
}

/// Every inbound kind of the standard protocol with its family.
pub const STANDARD_PACKETS: &[(&str, ProtocolFamily)] = &[
    (kinds::LOGIN, ProtocolFamily::Connection),
    (kinds::LOGOUT, ProtocolFamily::Connection),
    (kinds::PING, ProtocolFamily::Connection),
    (kinds::LIST_LOBBIES, ProtocolFamily::Lobby),
    (kinds::CREATE_LOBBY, ProtocolFamily::Lobby),
    (kinds::JOIN_LOBBY, ProtocolFamily::Lobby),
    (kinds::LEAVE_LOBBY, ProtocolFamily::Lobby),
    (kinds::SELECT_MAP, ProtocolFamily::Lobby),
    (kinds::START_GAME, ProtocolFamily::Lobby),
    (kinds::PLAYER_INPUT, ProtocolFamily::Game),
    (kinds::CAST_SPELL, ProtocolFamily::Game),
    (kinds::GAME_CHAT, ProtocolFamily::Game),
    (kinds::LEAVE_GAME, ProtocolFamily::Game),
];

/// Maps packet kinds to their protocol family.
#[derive(Debug, Clone, Default)]
pub struct PacketRegistry {
    families: HashMap<String, ProtocolFamily>,
}

impl PacketRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every kind in [`STANDARD_PACKETS`].
    pub fn standard() -> Self {
        let families = STANDARD_PACKETS
            .iter()
            .map(|(kind, family)| (kind.to_string(), *family))
            .collect();
        Self { families }
    }

    /// Registers `kind` under `family`.
    ///
    /// Registering the same kind under the same family again is allowed.
    ///
    /// # Errors
    /// [`ProtocolError::ConflictingRegistration`] if `kind` already belongs
    /// to a different family. Families are disjoint.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        family: ProtocolFamily,
    ) -> Result<(), ProtocolError> {
        let kind = kind.into();
        match self.families.get(&kind) {
            Some(existing) if *existing != family => {
                Err(ProtocolError::ConflictingRegistration {
                    kind,
                    existing: *existing,
                    requested: family,
                })
            }
            Some(_) => Ok(()),
            None => {
                self.families.insert(kind, family);
                Ok(())
            }
        }
    }

    /// Returns the family `kind` was registered under.
    pub fn family_of(&self, kind: &str) -> Option<ProtocolFamily> {
        self.families.get(kind).copied()
    }

    /// Returns the kinds registered under `family`, sorted by name.
    pub fn kinds_in(&self, family: ProtocolFamily) -> Vec<&str> {
        let mut kinds: Vec<&str> = self
            .families
            .iter()
            .filter(|(_, f)| **f == family)
            .map(|(k, _)| k.as_str())
            .collect();
        kinds.sort_unstable();
        kinds
    }

    /// Returns the number of registered kinds.
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}
