//! End-to-end tests: a real server on loopback ports driven by WebSocket
//! and UDP clients.

use std::path::PathBuf;
use std::time::Duration;

use arena::{ArenaError, ArenaServer, ServerConfig, exit_code};
use arena_transport::{ConnectionId, encode_datagram};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpStream, UdpSocket};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

// =========================================================================
// Helpers
// =========================================================================

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        tcp_port: 0,
        udp_port: 0,
        maps_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../maps"),
        ..ServerConfig::default()
    }
}

async fn start_server() -> ArenaServer {
    let server = ArenaServer::builder()
        .config(test_config())
        .build()
        .await
        .expect("server should build");
    server.start();
    server
}

/// Connects and consumes the `Welcome` packet, returning its connection id.
async fn connect(server: &ArenaServer) -> (Client, u64) {
    let (ws, udp) = connect_udp(server).await;
    (ws, udp.id)
}

/// What a client needs to frame its datagrams.
#[derive(Clone, Copy)]
struct UdpCredentials {
    id: u64,
    secret: u64,
}

impl UdpCredentials {
    fn frame(self, packet: Value) -> Vec<u8> {
        encode_datagram(ConnectionId::new(self.id), self.secret, packet.to_string().as_bytes())
    }
}

async fn connect_udp(server: &ArenaServer) -> (Client, UdpCredentials) {
    let url = format!("ws://{}", server.tcp_addr());
    let (mut ws, _) = connect_async(url).await.expect("connect");
    let welcome = recv(&mut ws).await;
    assert_eq!(welcome["type"], "Welcome");
    let id = welcome["connection_id"].as_u64().expect("connection id");
    let secret = welcome["udp_secret"].as_u64().expect("udp secret");
    (ws, UdpCredentials { id, secret })
}

async fn wait_for_no_connections(server: &ArenaServer) {
    for _ in 0..50 {
        if server.connection_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.connection_count().await, 0);
}

async fn send(ws: &mut Client, packet: Value) {
    ws.send(Message::Text(packet.to_string().into()))
        .await
        .expect("send");
}

async fn recv(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a packet")
            .expect("stream ended")
            .expect("recv error");
        match msg {
            Message::Binary(data) => return serde_json::from_slice(&data).expect("json"),
            Message::Text(text) => return serde_json::from_str(&text).expect("json"),
            _ => continue,
        }
    }
}

/// Receives until a packet of `kind` arrives, skipping others.
async fn recv_kind(ws: &mut Client, kind: &str) -> Value {
    loop {
        let packet = recv(ws).await;
        if packet["type"] == kind {
            return packet;
        }
    }
}

// =========================================================================
// Connection family over WebSocket
// =========================================================================

#[tokio::test]
async fn test_connect_receives_welcome_with_distinct_ids() {
    let server = start_server().await;

    let (_a, id_a) = connect(&server).await;
    let (_b, id_b) = connect(&server).await;

    assert_ne!(id_a, id_b);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_login_then_ping_replies_in_order() {
    let server = start_server().await;
    let (mut ws, _) = connect(&server).await;

    send(&mut ws, json!({"type": "Login", "token": "42", "name": "alice"})).await;
    send(&mut ws, json!({"type": "Ping", "sent_at": 1234})).await;

    let accepted = recv(&mut ws).await;
    assert_eq!(accepted["type"], "LoginAccepted");
    assert_eq!(accepted["player_id"], 42);
    assert_eq!(accepted["name"], "alice");

    let pong = recv(&mut ws).await;
    assert_eq!(pong["type"], "Pong");
    assert_eq!(pong["sent_at"], 1234);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_undecodable_message_is_dropped() {
    let server = start_server().await;
    let (mut ws, _) = connect(&server).await;

    ws.send(Message::Text("definitely not json".into())).await.unwrap();
    send(&mut ws, json!({"no_type": true})).await;
    send(&mut ws, json!({"type": "Ping"})).await;

    assert_eq!(recv(&mut ws).await["type"], "Pong");
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connection_count_tracks_open_connections() {
    let server = start_server().await;
    let (mut ws, _) = connect(&server).await;
    assert_eq!(server.connection_count().await, 1);

    ws.close(None).await.unwrap();

    wait_for_no_connections(&server).await;
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_silent_tcp_client_does_not_block_accept() {
    let server = start_server().await;
    let _silent = TcpStream::connect(server.tcp_addr()).await.unwrap();

    let connected = tokio::time::timeout(Duration::from_secs(3), connect(&server)).await;

    assert!(connected.is_ok(), "real client should get Welcome while another stays silent");
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_silent_tcp_client_is_dropped_after_handshake_timeout() {
    let config = ServerConfig {
        handshake_timeout_secs: 1,
        ..test_config()
    };
    let server = ArenaServer::builder().config(config).build().await.unwrap();
    server.start();
    let mut silent = TcpStream::connect(server.tcp_addr()).await.unwrap();

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(TIMEOUT, tokio::io::AsyncReadExt::read(&mut silent, &mut buf))
        .await
        .expect("server should close the stalled stream");

    assert!(matches!(read, Ok(0) | Err(_)));
    assert_eq!(server.connection_count().await, 0);
    server.shutdown().await.unwrap();
}

// =========================================================================
// UDP
// =========================================================================

#[tokio::test]
async fn test_udp_datagram_is_routed_as_its_connection() {
    let server = start_server().await;
    let (mut ws, creds) = connect_udp(&server).await;
    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let datagram = creds.frame(json!({"type": "Ping", "sent_at": 77}));
    udp.send_to(&datagram, server.udp_addr()).await.unwrap();

    let pong = recv(&mut ws).await;
    assert_eq!(pong["type"], "Pong");
    assert_eq!(pong["sent_at"], 77);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_udp_datagram_for_unknown_connection_is_dropped() {
    let server = start_server().await;
    let (mut ws, creds) = connect_udp(&server).await;
    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let stray = UdpCredentials {
        id: creds.id + 1000,
        ..creds
    };
    udp.send_to(&stray.frame(json!({"type": "Ping", "sent_at": 1})), server.udp_addr())
        .await
        .unwrap();
    udp.send_to(b"short", server.udp_addr()).await.unwrap();
    udp.send_to(&creds.frame(json!({"type": "Ping", "sent_at": 2})), server.udp_addr())
        .await
        .unwrap();

    let pong = recv(&mut ws).await;
    assert_eq!(pong["sent_at"], 2);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_udp_datagram_with_wrong_secret_is_dropped() {
    let server = start_server().await;
    let (mut victim, victim_creds) = connect_udp(&server).await;
    let (mut attacker, attacker_creds) = connect_udp(&server).await;
    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // The victim's id is known, its secret is not.
    let forged = UdpCredentials {
        id: victim_creds.id,
        secret: attacker_creds.secret,
    };
    udp.send_to(
        &forged.frame(json!({"type": "CreateLobby", "player_name": "mallory"})),
        server.udp_addr(),
    )
    .await
    .unwrap();
    udp.send_to(&attacker_creds.frame(json!({"type": "Ping", "sent_at": 3})), server.udp_addr())
        .await
        .unwrap();
    assert_eq!(recv_kind(&mut attacker, "Pong").await["sent_at"], 3);

    send(&mut victim, json!({"type": "Ping", "sent_at": 4})).await;
    let next = recv(&mut victim).await;
    assert_eq!(next["type"], "Pong", "forged datagram must not act as the victim");
    assert_eq!(next["sent_at"], 4);

    send(&mut attacker, json!({"type": "ListLobbies"})).await;
    let list = recv_kind(&mut attacker, "LobbyList").await;
    assert_eq!(list["lobbies"], json!([]));
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_udp_datagram_after_disconnect_is_dropped() {
    let server = start_server().await;
    let (mut gone, gone_creds) = connect_udp(&server).await;
    gone.close(None).await.unwrap();
    wait_for_no_connections(&server).await;

    let (mut ws, creds) = connect_udp(&server).await;
    let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    udp.send_to(
        &gone_creds.frame(json!({"type": "CreateLobby", "player_name": "ghost"})),
        server.udp_addr(),
    )
    .await
    .unwrap();
    // Same socket, so the stale datagram is handled before this one.
    udp.send_to(&creds.frame(json!({"type": "Ping", "sent_at": 5})), server.udp_addr())
        .await
        .unwrap();
    assert_eq!(recv_kind(&mut ws, "Pong").await["sent_at"], 5);

    send(&mut ws, json!({"type": "ListLobbies"})).await;
    let list = recv_kind(&mut ws, "LobbyList").await;
    assert_eq!(list["lobbies"], json!([]));
    server.shutdown().await.unwrap();
}

// =========================================================================
// Lobby to game
// =========================================================================

#[tokio::test]
async fn test_lobby_start_game_places_both_players() {
    let server = start_server().await;
    let (mut host, _) = connect(&server).await;
    let (mut guest, _) = connect(&server).await;

    send(&mut host, json!({"type": "CreateLobby", "name": "duel", "player_name": "alice"})).await;
    let joined = recv_kind(&mut host, "LobbyJoined").await;
    let lobby_id = joined["lobby_id"].clone();

    send(&mut guest, json!({"type": "ListLobbies"})).await;
    let list = recv_kind(&mut guest, "LobbyList").await;
    assert_eq!(list["lobbies"].as_array().unwrap().len(), 1);

    send(&mut guest, json!({"type": "JoinLobby", "lobby_id": lobby_id, "player_name": "bob"})).await;
    recv_kind(&mut guest, "LobbyJoined").await;
    let update = recv_kind(&mut host, "LobbyUpdated").await;
    assert_eq!(update["members"], json!(["alice", "bob"]));

    send(&mut host, json!({"type": "SelectMap", "map_index": 3})).await;
    send(&mut host, json!({"type": "StartGame"})).await;

    for ws in [&mut host, &mut guest] {
        let starting = recv_kind(ws, "GameStarting").await;
        assert_eq!(starting["map_name"], "pillars");
        let started = recv_kind(ws, "GameStarted").await;
        assert_eq!(started["map_index"], 3);
        assert_eq!(started["players"], json!(["alice", "bob"]));
        assert!(started["spawn_x"].is_number());
    }

    send(&mut guest, json!({"type": "GameChat", "text": "gl hf"})).await;
    let chat = recv_kind(&mut host, "GameChat").await;
    assert_eq!(chat["from"], "bob");
    assert_eq!(chat["text"], "gl hf");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_leaves_lobby_and_hands_over_host() {
    let server = start_server().await;
    let (mut host, _) = connect(&server).await;
    let (mut guest, _) = connect(&server).await;

    send(&mut host, json!({"type": "CreateLobby", "player_name": "alice"})).await;
    let lobby_id = recv_kind(&mut host, "LobbyJoined").await["lobby_id"].clone();
    send(&mut guest, json!({"type": "JoinLobby", "lobby_id": lobby_id, "player_name": "bob"})).await;
    recv_kind(&mut guest, "LobbyJoined").await;

    host.close(None).await.unwrap();

    // The guest's own join was broadcast too; skip to the post-disconnect update.
    let update = loop {
        let update = recv_kind(&mut guest, "LobbyUpdated").await;
        if update["members"].as_array().is_some_and(|m| m.len() == 1) {
            break update;
        }
    };
    assert_eq!(update["host"], "bob");
    assert_eq!(update["members"], json!(["bob"]));
    server.shutdown().await.unwrap();
}

// =========================================================================
// Fatal errors and shutdown
// =========================================================================

#[tokio::test]
async fn test_unregistered_packet_kind_is_protocol_fatal() {
    let server = start_server().await;
    let (mut ws, _) = connect(&server).await;

    send(&mut ws, json!({"type": "Teleport", "x": 1})).await;
    let result = tokio::time::timeout(TIMEOUT, server.run_until(std::future::pending::<()>()))
        .await
        .expect("server should stop on its own");

    let err = result.unwrap_err();
    assert!(matches!(err, ArenaError::UnregisteredPacket { ref kind } if kind == "Teleport"));
    assert_eq!(err.exit_code(), exit_code::PROTOCOL);
}

#[tokio::test]
async fn test_run_until_signal_shuts_down_cleanly() {
    let server = start_server().await;

    let result = server.run_until(async {}).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_build_port_in_use_is_bind_error() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = ServerConfig {
        tcp_port: taken.local_addr().unwrap().port(),
        ..test_config()
    };

    let err = ArenaServer::builder().config(config).build().await.err().unwrap();

    assert!(matches!(err, ArenaError::Bind(_)));
    assert_eq!(err.exit_code(), exit_code::BIND);
}

#[tokio::test]
async fn test_build_missing_maps_is_map_catalog_error() {
    let config = ServerConfig {
        maps_dir: PathBuf::from("/nonexistent/arena/maps"),
        ..test_config()
    };

    let err = ArenaServer::builder().config(config).build().await.err().unwrap();

    assert!(matches!(err, ArenaError::MapCatalog(_)));
    assert_eq!(err.exit_code(), exit_code::MAP_CATALOG);
}
