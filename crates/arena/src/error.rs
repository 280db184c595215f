//! Unified error type for the arena server.

use std::path::PathBuf;

use arena_maps::MapError;
use arena_transport::TransportError;

/// Process exit codes for fatal errors.
pub mod exit_code {
    /// The configuration file could not be read or parsed.
    pub const CONFIG: i32 = 1;
    /// A catalog map failed to load.
    pub const MAP_CATALOG: i32 = 2;
    /// A listening port could not be bound.
    pub const BIND: i32 = 3;
    /// A client sent a packet kind nobody registered.
    pub const PROTOCOL: i32 = 4;
    /// Anything else that stops the server.
    pub const INTERNAL: i32 = 70;
}

/// Errors that stop the server.
///
/// Each variant marks where in startup or dispatch the failure happened,
/// which decides the process exit code. Per-connection failures never
/// reach this type; the bridge logs them and drops the connection.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// The config file exists but could not be read.
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`ServerConfig`](crate::ServerConfig).
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The map catalog could not be materialized at startup.
    #[error("map catalog failed to load: {0}")]
    MapCatalog(#[source] MapError),

    /// A listening port could not be bound at startup.
    #[error("port binding failed: {0}")]
    Bind(#[source] TransportError),

    /// A client sent a packet kind that is not registered to any family.
    #[error("unregistered packet kind {kind:?}")]
    UnregisteredPacket { kind: String },

    /// A server task stopped abnormally.
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ArenaError {
    /// The process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigRead { .. } | Self::ConfigParse { .. } => exit_code::CONFIG,
            Self::MapCatalog(_) => exit_code::MAP_CATALOG,
            Self::Bind(_) => exit_code::BIND,
            Self::UnregisteredPacket { .. } => exit_code::PROTOCOL,
            Self::Task(_) => exit_code::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_startup_failures() {
        let map = ArenaError::MapCatalog(MapError::NotFound("arena".into()));
        let bind = ArenaError::Bind(TransportError::BindFailed {
            addr: "0.0.0.0:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        });
        let config = ArenaError::ConfigRead {
            path: "arena.toml".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };

        assert_eq!(config.exit_code(), 1);
        assert_eq!(map.exit_code(), 2);
        assert_eq!(bind.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_unregistered_packet_is_protocol_fatal() {
        let err = ArenaError::UnregisteredPacket {
            kind: "Teleport".into(),
        };
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("Teleport"));
    }

    #[tokio::test]
    async fn test_exit_code_panicked_task_is_internal() {
        let task: tokio::task::JoinHandle<()> = tokio::spawn(async { panic!("analyzer died") });
        let join_err = task.await.unwrap_err();

        let err: ArenaError = join_err.into();

        assert!(matches!(err, ArenaError::Task(_)));
        assert_eq!(err.exit_code(), exit_code::INTERNAL);
    }
}
