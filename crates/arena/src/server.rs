//! `ArenaServer` builder and lifecycle.
//!
//! This is the entry point for running the arena backend. It ties together
//! all the layers: maps → managers → packet registry → analyzer and bridge
//! → bound ports.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use arena_maps::{MapDirectory, MapRegistry};
use arena_protocol::{PacketRegistry, ProtocolFamily};
use arena_transport::{Transport, TransportError, UdpEndpoint, WebSocketTransport};
use tokio::task::JoinHandle;

use crate::analyzer::{AnalyzerHandle, Managers, spawn_analyzer};
use crate::bridge::ConnectionBridge;
use crate::lifecycle::{LifecycleCommand, LifecycleHandle, spawn_lifecycle};
use crate::{ArenaError, ServerConfig};

type ManagerFactory = Box<dyn FnOnce(Arc<MapRegistry>, &ServerConfig) -> Managers + Send>;

/// Builder for configuring and starting an arena server.
///
/// # Example
///
/// ```rust,no_run
/// use arena::prelude::*;
///
/// # async fn run() -> Result<(), ArenaError> {
/// let server = ArenaServer::builder()
///     .config(ServerConfig::default())
///     .build()
///     .await?;
/// server.start();
/// server.run_until(tokio::signal::ctrl_c()).await
/// # }
/// ```
pub struct ArenaServerBuilder {
    config: ServerConfig,
    maps: Option<Arc<MapRegistry>>,
    managers: Option<ManagerFactory>,
    packets: Option<PacketRegistry>,
}

impl ArenaServerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            maps: None,
            managers: None,
            packets: None,
        }
    }

    /// Sets the server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses an already-built map registry instead of loading
    /// `config.maps_dir`.
    pub fn map_registry(mut self, maps: Arc<MapRegistry>) -> Self {
        self.maps = Some(maps);
        self
    }

    /// Replaces the stock managers.
    pub fn managers(
        mut self,
        factory: impl FnOnce(Arc<MapRegistry>, &ServerConfig) -> Managers + Send + 'static,
    ) -> Self {
        self.managers = Some(Box::new(factory));
        self
    }

    /// Replaces the standard packet registry.
    pub fn packets(mut self, packets: PacketRegistry) -> Self {
        self.packets = Some(packets);
        self
    }

    /// Runs the startup sequence and binds both ports.
    ///
    /// The server does not accept anything until [`ArenaServer::start`].
    ///
    /// # Errors
    /// - [`ArenaError::MapCatalog`] if a catalog map fails to load.
    /// - [`ArenaError::Bind`] if either port cannot be bound.
    pub async fn build(self) -> Result<ArenaServer, ArenaError> {
        let config = self.config;

        let maps = match self.maps {
            Some(maps) => maps,
            None => {
                let source = MapDirectory::new(config.maps_dir.clone());
                let registry = MapRegistry::initialize(&source).map_err(ArenaError::MapCatalog)?;
                Arc::new(registry)
            }
        };
        tracing::info!(maps = maps.len(), dir = %config.maps_dir.display(), "map catalog loaded");

        let managers = match self.managers {
            Some(factory) => factory(Arc::clone(&maps), &config),
            None => Managers::standard(Arc::clone(&maps), config.lobby.clone()),
        };

        let packets = self.packets.unwrap_or_else(PacketRegistry::standard);
        for family in ProtocolFamily::ALL {
            tracing::debug!(%family, kinds = ?packets.kinds_in(family), "packets registered");
        }

        let (analyzer, analyzer_task) = spawn_analyzer(packets, managers);
        let bridge = ConnectionBridge::new(analyzer.clone());

        let transport = WebSocketTransport::bind(&config.tcp_addr())
            .await
            .map_err(ArenaError::Bind)?
            .with_handshake_timeout(config.handshake_timeout());
        let udp = UdpEndpoint::bind(&config.udp_addr())
            .await
            .map_err(ArenaError::Bind)?;
        let tcp_addr = bound_addr(transport.local_addr(), config.tcp_addr())?;
        let udp_addr = bound_addr(udp.local_addr(), config.udp_addr())?;

        let (lifecycle, lifecycle_task) = spawn_lifecycle(transport, Arc::new(udp), bridge.clone());

        Ok(ArenaServer {
            tcp_addr,
            udp_addr,
            bridge,
            analyzer,
            analyzer_task,
            lifecycle,
            lifecycle_task,
        })
    }
}

fn bound_addr(addr: std::io::Result<SocketAddr>, requested: String) -> Result<SocketAddr, ArenaError> {
    addr.map_err(|source| {
        ArenaError::Bind(TransportError::BindFailed {
            addr: requested,
            source,
        })
    })
}

impl Default for ArenaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A built arena server with both ports bound.
pub struct ArenaServer {
    tcp_addr: SocketAddr,
    udp_addr: SocketAddr,
    bridge: ConnectionBridge,
    analyzer: AnalyzerHandle,
    analyzer_task: JoinHandle<Result<(), ArenaError>>,
    lifecycle: LifecycleHandle,
    lifecycle_task: JoinHandle<()>,
}

impl ArenaServer {
    /// Creates a new builder.
    pub fn builder() -> ArenaServerBuilder {
        ArenaServerBuilder::new()
    }

    /// Address of the WebSocket port.
    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    /// Address of the UDP port.
    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Number of connections currently attached.
    pub async fn connection_count(&self) -> usize {
        self.bridge.connection_count().await
    }

    /// Starts accepting connections in the background and returns at once.
    pub fn start(&self) {
        tracing::info!(tcp = %self.tcp_addr, udp = %self.udp_addr, "arena server starting");
        self.lifecycle.send(LifecycleCommand::Start);
    }

    /// Stops the listeners, then shuts the game and connection managers
    /// down and waits for them.
    pub async fn shutdown(self) -> Result<(), ArenaError> {
        tracing::info!("arena server shutting down");
        self.lifecycle.send(LifecycleCommand::Stop);
        self.analyzer.shutdown().await;
        let result = self.analyzer_task.await?;
        let _ = self.lifecycle_task.await;
        result
    }

    /// Serves until `signal` completes or the analyzer stops on a fatal
    /// error, whichever comes first.
    ///
    /// On the signal the server shuts down cleanly. On a fatal error the
    /// listeners are stopped and the error is returned.
    pub async fn run_until(mut self, signal: impl Future<Output = impl Sized>) -> Result<(), ArenaError> {
        let fatal = tokio::select! {
            result = &mut self.analyzer_task => Some(result),
            _ = signal => None,
        };

        match fatal {
            None => self.shutdown().await,
            Some(result) => {
                self.lifecycle.send(LifecycleCommand::Stop);
                let _ = self.lifecycle_task.await;
                result?
            }
        }
    }
}
