//! The lobby manager: owner of the `Lobby` protocol family.
//!
//! A lobby is a group of connections waiting to play together. The first
//! member is the host; only the host may pick the map and start the game.
//! Each connection is in at most one lobby at a time.
//!
//! # Map choice
//!
//! The host picks a catalog index or one of the two sentinels:
//!
//! | index | choice                  | resolved by                          |
//! |-------|-------------------------|--------------------------------------|
//! | `-2`  | [`MapChoice::Random`]   | `random_map`                          |
//! | `-1`  | [`MapChoice::RandomNoRepeat`] (default) | `random_map_excluding(last map)` |
//! | `n`   | [`MapChoice::Fixed`]    | `lookup(n)`                           |
//!
//! In every case the map must hold all members.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arena_maps::{MapChoice, MapInfo, MapRegistry, RANDOM_INDEX, RANDOM_NO_REPEAT_INDEX};
use arena_protocol::{Manager, Packet, Peer, kinds};
use arena_transport::ConnectionId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::{
    GameId, LobbyConfig, LobbyId, MatchPlayer, MatchSender, MatchStart, RoomError,
};

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

/// A single lobby and its members.
#[derive(Debug, Clone)]
pub struct Lobby {
    pub id: LobbyId,
    pub name: String,
    /// Members in join order. The host is always `members[0]`.
    members: Vec<MatchPlayer>,
    pub map_choice: MapChoice,
    /// Index of the map the last game of this lobby was played on.
    pub last_map: Option<i32>,
}

impl Lobby {
    /// The host's connection.
    pub fn host(&self) -> ConnectionId {
        self.members[0].peer.id()
    }

    pub fn members(&self) -> &[MatchPlayer] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }

    fn summary(&self) -> LobbySummary {
        LobbySummary {
            lobby_id: self.id.0,
            name: self.name.clone(),
            host: self.members[0].name.clone(),
            players: self.members.len(),
            map_index: self.map_choice.index(),
        }
    }

    fn broadcast(&self, packet: &Packet) {
        for member in &self.members {
            member.peer.send(packet.clone());
        }
    }

    /// Sends the current member list and map choice to every member.
    fn broadcast_update(&self) {
        let update = Packet::new(kinds::LOBBY_UPDATED)
            .with("lobby_id", self.id.0)
            .with("host", self.members[0].name.clone())
            .with("members", self.member_names())
            .with("map_index", self.map_choice.index());
        self.broadcast(&update);
    }
}

/// One row of a `LobbyList` reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LobbySummary {
    pub lobby_id: u64,
    pub name: String,
    pub host: String,
    pub players: usize,
    pub map_index: i32,
}

// ---------------------------------------------------------------------------
// Map resolution
// ---------------------------------------------------------------------------

/// Turns a lobby's map choice into a concrete playable map for `players`
/// members.
///
/// # Errors
/// - [`RoomError::UnknownMap`] for a fixed index that is not playable
/// - [`RoomError::MapTooSmall`] for a fixed map below the member count
/// - [`RoomError::NoMapAvailable`] when a random choice finds nothing
pub fn resolve_map<'a, R: Rng + ?Sized>(
    maps: &'a MapRegistry,
    choice: MapChoice,
    last_map: Option<i32>,
    players: usize,
    rng: &mut R,
) -> Result<&'a MapInfo, RoomError> {
    let needed = u32::try_from(players).unwrap_or(u32::MAX);
    let found = match choice {
        MapChoice::Random => maps
            .random_map(&mut *rng)
            .filter(|m| m.player_limit() >= needed)
            .or_else(|| maps.random_map_excluding(RANDOM_INDEX, needed, &mut *rng)),
        MapChoice::RandomNoRepeat => maps.random_map_excluding(
            last_map.unwrap_or(RANDOM_NO_REPEAT_INDEX),
            needed,
            &mut *rng,
        ),
        MapChoice::Fixed(index) => {
            let map = maps
                .lookup(index)
                .filter(|m| !m.is_reserved())
                .ok_or(RoomError::UnknownMap(index))?;
            if map.player_limit() < needed {
                return Err(RoomError::MapTooSmall {
                    map: map.name(),
                    limit: map.player_limit(),
                    players,
                });
            }
            Some(map)
        }
    };
    found.ok_or(RoomError::NoMapAvailable { players })
}

// ---------------------------------------------------------------------------
// LobbyManager
// ---------------------------------------------------------------------------

/// Handles `ListLobbies`, `CreateLobby`, `JoinLobby`, `LeaveLobby`,
/// `SelectMap` and `StartGame`.
pub struct LobbyManager {
    maps: Arc<MapRegistry>,
    config: LobbyConfig,
    matches: MatchSender,
    rng: StdRng,
    /// Ordered so `LobbyList` is stable.
    lobbies: BTreeMap<LobbyId, Lobby>,
    /// Which lobby each connection is in.
    memberships: HashMap<ConnectionId, LobbyId>,
    next_lobby_id: u64,
    next_game_id: u64,
}

impl LobbyManager {
    /// Creates a manager that hands started games to `matches`.
    pub fn new(maps: Arc<MapRegistry>, config: LobbyConfig, matches: MatchSender) -> Self {
        Self {
            maps,
            config,
            matches,
            rng: StdRng::from_os_rng(),
            lobbies: BTreeMap::new(),
            memberships: HashMap::new(),
            next_lobby_id: 1,
            next_game_id: 1,
        }
    }

    /// Replaces the random source with a seeded one, for reproducible
    /// map picks.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Looks up a lobby.
    pub fn lobby(&self, id: LobbyId) -> Option<&Lobby> {
        self.lobbies.get(&id)
    }

    /// The lobby a connection is in, if any.
    pub fn lobby_of(&self, connection: ConnectionId) -> Option<&Lobby> {
        self.memberships
            .get(&connection)
            .and_then(|id| self.lobbies.get(id))
    }

    /// Number of open lobbies.
    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }

    /// Summaries of every open lobby, by id.
    pub fn list(&self) -> Vec<LobbySummary> {
        self.lobbies.values().map(Lobby::summary).collect()
    }

    /// Opens a lobby with `peer` as host.
    pub fn create(
        &mut self,
        peer: &Peer,
        name: Option<String>,
        player_name: String,
    ) -> Result<&Lobby, RoomError> {
        if let Some(current) = self.memberships.get(&peer.id()) {
            return Err(RoomError::AlreadyInLobby(peer.id(), *current));
        }
        let id = LobbyId(self.next_lobby_id);
        self.next_lobby_id += 1;

        let lobby = Lobby {
            id,
            name: name.unwrap_or_else(|| format!("{player_name}'s lobby")),
            members: vec![MatchPlayer {
                peer: peer.clone(),
                name: player_name,
            }],
            map_choice: MapChoice::default(),
            last_map: None,
        };
        tracing::info!(lobby_id = %id, host = %peer.id(), "lobby created");

        self.memberships.insert(peer.id(), id);
        Ok(&*self.lobbies.entry(id).or_insert(lobby))
    }

    /// Adds `peer` to an existing lobby.
    pub fn join(
        &mut self,
        peer: &Peer,
        id: LobbyId,
        player_name: String,
    ) -> Result<&Lobby, RoomError> {
        if let Some(current) = self.memberships.get(&peer.id()) {
            return Err(RoomError::AlreadyInLobby(peer.id(), *current));
        }
        let lobby = self
            .lobbies
            .get_mut(&id)
            .ok_or(RoomError::LobbyNotFound(id))?;
        if lobby.len() >= self.config.max_members {
            return Err(RoomError::LobbyFull(id));
        }

        lobby.members.push(MatchPlayer {
            peer: peer.clone(),
            name: player_name,
        });
        self.memberships.insert(peer.id(), id);
        tracing::info!(lobby_id = %id, conn_id = %peer.id(), players = lobby.len(), "joined lobby");
        Ok(&*lobby)
    }

    /// Removes a connection from its lobby.
    ///
    /// Hands the host role to the next member if the host leaves, and
    /// closes the lobby once its last member is gone. Returns the lobby id
    /// the connection left.
    pub fn leave(&mut self, connection: ConnectionId) -> Result<LobbyId, RoomError> {
        let id = self
            .memberships
            .remove(&connection)
            .ok_or(RoomError::NotInLobby(connection))?;
        let Some(lobby) = self.lobbies.get_mut(&id) else {
            return Ok(id);
        };

        let was_host = lobby.host() == connection;
        lobby.members.retain(|m| m.peer.id() != connection);

        if lobby.is_empty() {
            self.lobbies.remove(&id);
            tracing::info!(lobby_id = %id, "lobby closed");
        } else {
            if was_host {
                tracing::info!(lobby_id = %id, host = %lobby.host(), "host handed over");
            }
            lobby.broadcast_update();
        }
        Ok(id)
    }

    /// Sets the map choice of the lobby hosted by `connection`.
    pub fn select_map(&mut self, connection: ConnectionId, map_index: i32) -> Result<(), RoomError> {
        let maps = Arc::clone(&self.maps);
        let lobby = self.hosted_lobby_mut(connection)?;
        let choice = MapChoice::from_index(map_index);
        if let MapChoice::Fixed(index) = choice {
            if maps.lookup(index).is_none_or(MapInfo::is_reserved) {
                return Err(RoomError::UnknownMap(index));
            }
        }
        lobby.map_choice = choice;
        lobby.broadcast_update();
        Ok(())
    }

    /// Starts a game for the lobby hosted by `connection`.
    ///
    /// Resolves the map, announces `GameStarting` to the members and hands
    /// a [`MatchStart`] to the game manager. The lobby stays open so the
    /// group can play again; its `last_map` is updated.
    pub fn start_game(&mut self, connection: ConnectionId) -> Result<GameId, RoomError> {
        let min_players = self.config.min_players;
        let maps = Arc::clone(&self.maps);
        let game_id = GameId(self.next_game_id);

        let lobby = self
            .memberships
            .get(&connection)
            .and_then(|id| self.lobbies.get_mut(id))
            .ok_or(RoomError::NotInLobby(connection))?;
        if lobby.host() != connection {
            return Err(RoomError::NotHost(connection));
        }
        if lobby.len() < min_players {
            return Err(RoomError::NotEnoughPlayers {
                needed: min_players,
                have: lobby.len(),
            });
        }

        let map = resolve_map(&maps, lobby.map_choice, lobby.last_map, lobby.len(), &mut self.rng)?;
        let descriptor = map
            .descriptor()
            .cloned()
            .ok_or(RoomError::NoMapAvailable { players: lobby.len() })?;

        let start = MatchStart {
            game_id,
            lobby_id: lobby.id,
            map_index: map.index(),
            map_name: map.name(),
            map: descriptor,
            players: lobby.members.clone(),
        };
        self.matches
            .send(start)
            .map_err(|_| RoomError::MatchQueueClosed)?;

        self.next_game_id += 1;
        lobby.last_map = Some(map.index());
        lobby.broadcast(
            &Packet::new(kinds::GAME_STARTING)
                .with("game_id", game_id.0)
                .with("map_index", map.index())
                .with("map_name", map.name()),
        );
        tracing::info!(
            lobby_id = %lobby.id,
            %game_id,
            map = map.name(),
            players = lobby.len(),
            "game starting"
        );
        Ok(game_id)
    }

    fn hosted_lobby_mut(&mut self, connection: ConnectionId) -> Result<&mut Lobby, RoomError> {
        let lobby = self
            .memberships
            .get(&connection)
            .and_then(|id| self.lobbies.get_mut(id))
            .ok_or(RoomError::NotInLobby(connection))?;
        if lobby.host() != connection {
            return Err(RoomError::NotHost(connection));
        }
        Ok(lobby)
    }

    fn handle(&mut self, peer: &Peer, packet: &Packet) -> Result<(), RoomError> {
        match packet.kind.as_str() {
            kinds::LIST_LOBBIES => {
                let lobbies = serde_json::to_value(self.list()).unwrap_or_default();
                peer.send(Packet::new(kinds::LOBBY_LIST).with("lobbies", lobbies));
            }
            kinds::CREATE_LOBBY => {
                let name = packet.optional_field("name")?;
                let player_name = player_name(peer, packet)?;
                let lobby = self.create(peer, name, player_name)?;
                peer.send(joined(lobby));
            }
            kinds::JOIN_LOBBY => {
                let id = LobbyId(packet.field("lobby_id")?);
                let player_name = player_name(peer, packet)?;
                let lobby = self.join(peer, id, player_name)?;
                peer.send(joined(lobby));
                lobby.broadcast_update();
            }
            kinds::LEAVE_LOBBY => {
                let id = self.leave(peer.id())?;
                peer.send(Packet::new(kinds::LOBBY_LEFT).with("lobby_id", id.0));
            }
            kinds::SELECT_MAP => {
                let index = packet.field("map_index")?;
                self.select_map(peer.id(), index)?;
            }
            kinds::START_GAME => {
                self.start_game(peer.id())?;
            }
            other => {
                tracing::warn!(conn_id = %peer.id(), kind = other, "lobby manager got foreign packet");
            }
        }
        Ok(())
    }
}

impl Manager for LobbyManager {
    fn analyze(&mut self, peer: &Peer, packet: Packet) {
        if let Err(e) = self.handle(peer, &packet) {
            tracing::debug!(conn_id = %peer.id(), kind = %packet.kind, error = %e, "lobby request refused");
            peer.send(Packet::new(kinds::LOBBY_ERROR).with("reason", e.to_string()));
        }
    }

    fn disconnect(&mut self, peer: &Peer) {
        if let Ok(id) = self.leave(peer.id()) {
            tracing::debug!(conn_id = %peer.id(), lobby_id = %id, "left lobby on disconnect");
        }
    }
}

/// The name a player goes by in lobbies; defaults to the connection id.
fn player_name(peer: &Peer, packet: &Packet) -> Result<String, RoomError> {
    Ok(packet
        .optional_field("player_name")?
        .unwrap_or_else(|| peer.id().to_string()))
}

fn joined(lobby: &Lobby) -> Packet {
    Packet::new(kinds::LOBBY_JOINED)
        .with("lobby_id", lobby.id.0)
        .with("name", lobby.name.clone())
        .with("host", lobby.members[0].name.clone())
        .with("members", lobby.member_names())
        .with("map_index", lobby.map_choice.index())
}
