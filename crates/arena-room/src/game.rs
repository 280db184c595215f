//! Running games: one [`GameRoom`] per started match.
//!
//! The game manager owns the `Game` protocol family. It creates rooms from
//! the [`MatchStart`]s the lobby manager queues, places every player on a
//! spawn point of the room's map, and relays gameplay packets between the
//! players of a room. Gameplay itself is client-side; the server moves
//! `PlayerInput`, `CastSpell` and `GameChat` without looking inside.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arena_maps::{MapDescriptor, Point};
use arena_protocol::{Manager, Packet, Peer, kinds};
use arena_transport::ConnectionId;

use crate::{GameId, LobbyId, MatchReceiver, MatchStart, RoomError};

/// Object type marking a spawn point in a map document.
const SPAWN_KIND: &str = "spawn";

/// Spawn points of a map, in layer then document order.
///
/// Maps without a `spawn` object fall back to a single point at the map's
/// center.
pub fn spawn_points(map: &MapDescriptor) -> Vec<Point> {
    let points: Vec<Point> = map
        .objects_of_kind(SPAWN_KIND)
        .map(|o| o.shape.center())
        .collect();
    if points.is_empty() {
        vec![Point::new(
            map.pixel_width() as f32 / 2.0,
            map.pixel_height() as f32 / 2.0,
        )]
    } else {
        points
    }
}

// ---------------------------------------------------------------------------
// GameRoom
// ---------------------------------------------------------------------------

/// Who a room-level packet goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    AllExcept(ConnectionId),
}

/// A player inside a running game.
#[derive(Debug, Clone)]
pub struct GamePlayer {
    pub peer: Peer,
    pub name: String,
    pub spawn: Point,
}

/// One running game.
#[derive(Debug)]
pub struct GameRoom {
    pub id: GameId,
    pub lobby_id: LobbyId,
    pub map_index: i32,
    pub map_name: &'static str,
    pub map: Arc<MapDescriptor>,
    players: BTreeMap<ConnectionId, GamePlayer>,
}

impl GameRoom {
    /// Opens a room for `start`, assigning spawn points round-robin in
    /// player order.
    pub fn open(start: MatchStart) -> Self {
        let spawns = spawn_points(&start.map);
        let players = start
            .players
            .into_iter()
            .enumerate()
            .map(|(slot, p)| {
                let player = GamePlayer {
                    spawn: spawns[slot % spawns.len()],
                    peer: p.peer,
                    name: p.name,
                };
                (player.peer.id(), player)
            })
            .collect();

        Self {
            id: start.game_id,
            lobby_id: start.lobby_id,
            map_index: start.map_index,
            map_name: start.map_name,
            map: start.map,
            players,
        }
    }

    pub fn player(&self, connection: ConnectionId) -> Option<&GamePlayer> {
        self.players.get(&connection)
    }

    pub fn players(&self) -> impl Iterator<Item = &GamePlayer> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Sends a packet to the selected players.
    pub fn dispatch(&self, recipient: Recipient, packet: &Packet) {
        for (id, player) in &self.players {
            if recipient == Recipient::AllExcept(*id) {
                continue;
            }
            player.peer.send(packet.clone());
        }
    }

    fn announce(&self) {
        let names: Vec<String> = self.players.values().map(|p| p.name.clone()).collect();
        for player in self.players.values() {
            player.peer.send(
                Packet::new(kinds::GAME_STARTED)
                    .with("game_id", self.id.0)
                    .with("map_index", self.map_index)
                    .with("map_name", self.map_name)
                    .with("spawn_x", player.spawn.x)
                    .with("spawn_y", player.spawn.y)
                    .with("players", names.clone()),
            );
        }
    }

    fn remove(&mut self, connection: ConnectionId) -> Option<GamePlayer> {
        let player = self.players.remove(&connection)?;
        self.dispatch(
            Recipient::All,
            &Packet::new(kinds::PLAYER_LEFT)
                .with("game_id", self.id.0)
                .with("name", player.name.clone()),
        );
        Some(player)
    }
}

// ---------------------------------------------------------------------------
// GameManager
// ---------------------------------------------------------------------------

/// Handles `PlayerInput`, `CastSpell`, `GameChat` and `LeaveGame`.
pub struct GameManager {
    matches: MatchReceiver,
    rooms: HashMap<GameId, GameRoom>,
    /// Maps each connection to the game it is playing.
    /// A connection is in at most ONE game at a time.
    players: HashMap<ConnectionId, GameId>,
}

impl GameManager {
    /// Creates a manager fed by the lobby manager's match queue.
    pub fn new(matches: MatchReceiver) -> Self {
        Self {
            matches,
            rooms: HashMap::new(),
            players: HashMap::new(),
        }
    }

    /// Opens a room for a started match and greets its players.
    ///
    /// A player still in an older game is moved out of it first.
    pub fn open_room(&mut self, start: MatchStart) -> GameId {
        let stale: Vec<ConnectionId> = start
            .players
            .iter()
            .map(|p| p.peer.id())
            .filter(|id| self.players.contains_key(id))
            .collect();
        for connection in stale {
            self.leave(connection);
        }

        let room = GameRoom::open(start);
        let id = room.id;
        for connection in room.players.keys() {
            self.players.insert(*connection, id);
        }
        room.announce();
        tracing::info!(game_id = %id, map = room.map_name, players = room.len(), "game room opened");
        self.rooms.insert(id, room);
        id
    }

    /// Opens rooms for every match queued since the last call.
    pub fn drain_matches(&mut self) {
        while let Ok(start) = self.matches.try_recv() {
            self.open_room(start);
        }
    }

    pub fn room(&self, id: GameId) -> Option<&GameRoom> {
        self.rooms.get(&id)
    }

    /// The game a connection is playing, if any.
    pub fn room_of(&self, connection: ConnectionId) -> Option<&GameRoom> {
        self.players
            .get(&connection)
            .and_then(|id| self.rooms.get(id))
    }

    /// Number of running games.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Removes a connection from its game, releasing the room once empty.
    fn leave(&mut self, connection: ConnectionId) -> Option<GameId> {
        let id = self.players.remove(&connection)?;
        let room = self.rooms.get_mut(&id)?;
        room.remove(connection);
        tracing::info!(game_id = %id, conn_id = %connection, players = room.len(), "player left game");

        if room.is_empty() {
            self.rooms.remove(&id);
            tracing::info!(game_id = %id, "game room released");
        }
        Some(id)
    }

    fn relay(&self, peer: &Peer, packet: &Packet) -> Result<(), RoomError> {
        let room = self
            .room_of(peer.id())
            .ok_or(RoomError::NotInGame(peer.id()))?;
        let name = room
            .player(peer.id())
            .map(|p| p.name.clone())
            .unwrap_or_default();
        room.dispatch(Recipient::AllExcept(peer.id()), &packet.clone().with("from", name));
        Ok(())
    }
}

impl Manager for GameManager {
    fn analyze(&mut self, peer: &Peer, packet: Packet) {
        self.drain_matches();

        let result = match packet.kind.as_str() {
            kinds::PLAYER_INPUT | kinds::CAST_SPELL | kinds::GAME_CHAT => self.relay(peer, &packet),
            kinds::LEAVE_GAME => self
                .leave(peer.id())
                .map(|_| ())
                .ok_or(RoomError::NotInGame(peer.id())),
            other => {
                tracing::warn!(conn_id = %peer.id(), kind = other, "game manager got foreign packet");
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::debug!(conn_id = %peer.id(), error = %e, "game request refused");
            peer.send(Packet::new(kinds::GAME_ERROR).with("reason", e.to_string()));
        }
    }

    fn disconnect(&mut self, peer: &Peer) {
        self.drain_matches();
        self.leave(peer.id());
    }

    fn poll(&mut self) {
        self.drain_matches();
    }

    fn shutdown(&mut self) {
        self.drain_matches();
        for (id, room) in self.rooms.drain() {
            tracing::info!(game_id = %id, players = room.len(), "game room released");
        }
        self.players.clear();
    }
}

#[cfg(test)]
mod tests {
    use arena_maps::{MapObject, ObjectLayer, Shape};

    use super::*;

    fn spawn(x: f32, y: f32) -> MapObject {
        MapObject {
            name: None,
            kind: Some("spawn".into()),
            visible: true,
            gid: None,
            properties: Default::default(),
            shape: Shape::Rectangle {
                x,
                y,
                width: 32.0,
                height: 32.0,
            },
        }
    }

    #[test]
    fn test_spawn_points_uses_object_centers() {
        let map = MapDescriptor {
            layers: vec![ObjectLayer {
                objects: vec![spawn(0.0, 0.0), spawn(64.0, 32.0)],
                ..ObjectLayer::default()
            }],
            ..MapDescriptor::default()
        };

        let points = spawn_points(&map);

        assert_eq!(points, vec![Point::new(16.0, 16.0), Point::new(80.0, 48.0)]);
    }

    #[test]
    fn test_spawn_points_without_spawns_falls_back_to_center() {
        let map = MapDescriptor {
            width: 10,
            height: 6,
            tile_width: 32,
            tile_height: 32,
            ..MapDescriptor::default()
        };

        assert_eq!(spawn_points(&map), vec![Point::new(160.0, 96.0)]);
    }

    #[test]
    fn test_spawn_points_oversized_map_without_spawns_is_center() {
        let map = arena_maps::parse_map(
            r#"<map width="70000" height="10" tilewidth="70000" tileheight="32"/>"#,
        )
        .unwrap();

        let points = spawn_points(&map);

        assert_eq!(points.len(), 1);
        assert!(points[0].x > 2.4e9);
        assert_eq!(points[0].y, 160.0);
    }
}
