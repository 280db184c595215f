//! # Arena
//!
//! Server backbone for a multiplayer arena game.
//!
//! Clients connect over a WebSocket port and may also send datagrams over
//! a UDP port. Every decoded packet is classified by its kind into one of
//! three protocol families and handed to the manager owning that family:
//! connection (login, ping), lobby (lobbies, map choice) or game (running
//! matches). All managers run on one serialized analyzer context.
//!
//! ```text
//! WebSocket / UDP → bridge → analyzer queue → registry → Manager
//!                      ↑                                    │
//!                      └──────────── Peer::send ────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arena::prelude::*;
//!
//! # async fn run() -> Result<(), ArenaError> {
//! let config = ServerConfig::load("arena.toml".as_ref())?;
//! let server = ArenaServer::builder().config(config).build().await?;
//! server.start();
//! server.run_until(tokio::signal::ctrl_c()).await
//! # }
//! ```

pub mod analyzer;
mod bridge;
mod config;
mod error;
pub mod lifecycle;
mod server;

pub use analyzer::{AnalyzerEvent, AnalyzerHandle, Managers, spawn_analyzer};
pub use bridge::ConnectionBridge;
pub use config::ServerConfig;
pub use error::{ArenaError, exit_code};
pub use lifecycle::{LifecycleCommand, LifecycleHandle};
pub use server::{ArenaServer, ArenaServerBuilder};

/// Common imports for running an arena server.
pub mod prelude {
    pub use crate::{ArenaError, ArenaServer, ArenaServerBuilder, Managers, ServerConfig};
    pub use arena_maps::{MapRegistry, MapSource};
    pub use arena_protocol::{Manager, Packet, PacketRegistry, Peer, ProtocolFamily};
}
