//! Server configuration.
//!
//! Loaded from a TOML file; every key is optional:
//!
//! ```toml
//! host = "0.0.0.0"
//! tcp_port = 54555
//! udp_port = 54777
//! maps_dir = "maps"
//! log_level = "info"
//! handshake_timeout_secs = 10
//!
//! [lobby]
//! max_members = 8
//! min_players = 1
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use arena_room::LobbyConfig;
use serde::{Deserialize, Serialize};

use crate::ArenaError;

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface both listeners bind to.
    pub host: String,
    /// WebSocket (reliable) port. `0` picks a free port.
    pub tcp_port: u16,
    /// Datagram (unreliable) port. `0` picks a free port.
    pub udp_port: u16,
    /// Directory holding `<name>.tmx` for every catalog map.
    pub maps_dir: PathBuf,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Seconds a new TCP client gets to finish its WebSocket upgrade.
    pub handshake_timeout_secs: u64,
    pub lobby: LobbyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            tcp_port: 54555,
            udp_port: 54777,
            maps_dir: PathBuf::from("maps"),
            log_level: "info".to_string(),
            handshake_timeout_secs: 10,
            lobby: LobbyConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// - [`ArenaError::ConfigRead`] if the file exists but cannot be read
    /// - [`ArenaError::ConfigParse`] if it is not valid TOML or has
    ///   mistyped keys
    pub fn load(path: &Path) -> Result<Self, ArenaError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ArenaError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ArenaError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses configuration text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Address of the WebSocket listener.
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.host, self.tcp_port)
    }

    /// Address of the datagram endpoint.
    pub fn udp_addr(&self) -> String {
        format!("{}:{}", self.host, self.udp_port)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}
