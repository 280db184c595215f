//! Lobbies and running games for the arena server.
//!
//! Two managers live here, one per protocol family:
//!
//! - [`LobbyManager`] (`Lobby` family): players gather in a lobby, the
//!   host picks a map, and `StartGame` resolves it through the
//!   [`MapRegistry`](arena_maps::MapRegistry).
//! - [`GameManager`] (`Game` family): owns every running [`GameRoom`],
//!   hands out spawn points, and relays gameplay packets between players.
//!
//! The lobby never touches a game directly. Starting a game hands a
//! [`MatchStart`] to the game manager through the match queue created by
//! [`match_channel`]:
//!
//! ```text
//! LobbyManager ──(MatchStart)──→ match queue ──→ GameManager ──→ GameRoom
//! ```

mod config;
mod error;
mod game;
mod lobby;
mod matchmaking;

pub use config::LobbyConfig;
pub use error::RoomError;
pub use game::{GameManager, GamePlayer, GameRoom, Recipient, spawn_points};
pub use lobby::{Lobby, LobbyManager, LobbySummary, resolve_map};
pub use matchmaking::{
    GameId, LobbyId, MatchPlayer, MatchReceiver, MatchSender, MatchStart, match_channel,
};
