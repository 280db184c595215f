//! Error types for the lobby and game layer.

use arena_protocol::ProtocolError;
use arena_transport::ConnectionId;

use crate::LobbyId;

/// Errors that can occur during lobby or game operations.
///
/// The managers turn these into `LobbyError` / `GameError` replies; they
/// never reach the dispatch core.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The lobby does not exist.
    #[error("lobby {0} not found")]
    LobbyNotFound(LobbyId),

    /// The lobby has no free slot.
    #[error("lobby {0} is full")]
    LobbyFull(LobbyId),

    /// The connection is already a member of a lobby.
    #[error("{0} is already in lobby {1}")]
    AlreadyInLobby(ConnectionId, LobbyId),

    /// The connection is not a member of any lobby.
    #[error("{0} is not in a lobby")]
    NotInLobby(ConnectionId),

    /// Only the lobby host may do this.
    #[error("{0} is not the lobby host")]
    NotHost(ConnectionId),

    /// Too few members to start.
    #[error("need at least {needed} players, have {have}")]
    NotEnoughPlayers { needed: usize, have: usize },

    /// The requested map index is not in the catalog.
    #[error("no map with index {0}")]
    UnknownMap(i32),

    /// The requested map cannot hold every member.
    #[error("map {map} holds {limit} players, lobby has {players}")]
    MapTooSmall {
        map: &'static str,
        limit: u32,
        players: usize,
    },

    /// No playable map satisfies the lobby's constraints.
    #[error("no map available for {players} players")]
    NoMapAvailable { players: usize },

    /// The game manager is no longer accepting matches.
    #[error("game service unavailable")]
    MatchQueueClosed,

    /// The connection is not in a running game.
    #[error("{0} is not in a game")]
    NotInGame(ConnectionId),

    /// The packet was missing a field or had a malformed one.
    #[error(transparent)]
    Packet(#[from] ProtocolError),
}
