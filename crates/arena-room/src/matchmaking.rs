//! The hand-off from lobbies to games.

use std::fmt;
use std::sync::Arc;

use arena_maps::MapDescriptor;
use arena_protocol::Peer;
use tokio::sync::mpsc;

/// Identifies a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LobbyId(pub u64);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lobby-{}", self.0)
    }
}

/// Identifies a running game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game-{}", self.0)
    }
}

/// A player moving from a lobby into a game.
#[derive(Debug, Clone)]
pub struct MatchPlayer {
    pub peer: Peer,
    pub name: String,
}

/// Everything the game manager needs to open a room.
#[derive(Debug, Clone)]
pub struct MatchStart {
    pub game_id: GameId,
    pub lobby_id: LobbyId,
    pub map_index: i32,
    pub map_name: &'static str,
    pub map: Arc<MapDescriptor>,
    /// In lobby join order; the host comes first.
    pub players: Vec<MatchPlayer>,
}

pub type MatchSender = mpsc::UnboundedSender<MatchStart>;
pub type MatchReceiver = mpsc::UnboundedReceiver<MatchStart>;

/// Creates the queue connecting a [`LobbyManager`](crate::LobbyManager) to
/// a [`GameManager`](crate::GameManager).
pub fn match_channel() -> (MatchSender, MatchReceiver) {
    mpsc::unbounded_channel()
}
