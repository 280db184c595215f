//! Lobby settings.

use serde::{Deserialize, Serialize};

/// Limits applied to every lobby.
///
/// Loaded from the `[lobby]` table of the server config file; every field
/// has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Most members a lobby accepts. Capped again by the chosen map's
    /// player limit when the game starts.
    pub max_members: usize,

    /// Fewest members needed before the host may start.
    pub min_players: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_members: 8,
            min_players: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_config_default_values() {
        let config = LobbyConfig::default();
        assert_eq!(config.max_members, 8);
        assert_eq!(config.min_players, 1);
    }

    #[test]
    fn test_lobby_config_partial_table_keeps_defaults() {
        let config: LobbyConfig = serde_json::from_str(r#"{ "min_players": 2 }"#).unwrap();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_members, 8);
    }
}
