//! The lifecycle context: owns the bound ports and starts or stops serving
//! them on command.

use std::sync::Arc;

use arena_transport::{PendingConnection, Transport, UdpEndpoint, WebSocketTransport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bridge::ConnectionBridge;

/// Commands accepted by the lifecycle context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    /// Begin accepting connections and datagrams.
    Start,
    /// Close both ports and end the context.
    Stop,
}

/// Sending side of the lifecycle queue.
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    commands: mpsc::UnboundedSender<LifecycleCommand>,
}

impl LifecycleHandle {
    /// Queues a command. Returns `false` if the context has already ended.
    pub fn send(&self, command: LifecycleCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

/// Spawns the lifecycle task over already-bound ports.
pub(crate) fn spawn_lifecycle(
    transport: WebSocketTransport,
    udp: Arc<UdpEndpoint>,
    bridge: ConnectionBridge,
) -> (LifecycleHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let lifecycle = Lifecycle {
        transport: Some(transport),
        udp,
        bridge,
        commands: rx,
        tasks: Vec::new(),
    };
    (LifecycleHandle { commands: tx }, tokio::spawn(lifecycle.run()))
}

struct Lifecycle {
    /// Taken by the accept loop on `Start`.
    transport: Option<WebSocketTransport>,
    udp: Arc<UdpEndpoint>,
    bridge: ConnectionBridge,
    commands: mpsc::UnboundedReceiver<LifecycleCommand>,
    tasks: Vec<JoinHandle<()>>,
}

impl Lifecycle {
    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                LifecycleCommand::Start => self.start(),
                LifecycleCommand::Stop => break,
            }
        }

        // Aborting the accept loop drops the listener with it.
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tracing::info!("listeners closed");
    }

    fn start(&mut self) {
        let Some(transport) = self.transport.take() else {
            tracing::warn!("server already started");
            return;
        };

        tracing::info!("accepting connections");
        self.tasks
            .push(tokio::spawn(accept_loop(transport, self.bridge.clone())));
        self.tasks.push(tokio::spawn(
            self.bridge.clone().run_udp(Arc::clone(&self.udp)),
        ));
    }
}

/// Only takes streams off the listener; each upgrade runs in the stream's
/// own task, so a client that never speaks cannot stall the loop.
async fn accept_loop(mut transport: WebSocketTransport, bridge: ConnectionBridge) {
    loop {
        match transport.accept().await {
            Ok(pending) => {
                let bridge = bridge.clone();
                tokio::spawn(async move {
                    let addr = pending.remote_addr();
                    match pending.establish().await {
                        Ok(conn) => bridge.handle_connection(conn).await,
                        Err(e) => tracing::debug!(%addr, error = %e, "handshake failed"),
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
    }
}
