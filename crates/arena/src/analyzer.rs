//! The analyzer: the single execution context every manager runs on.
//!
//! All inbound packets and disconnects of every connection are queued here
//! and handled strictly one at a time, in arrival order. The three managers
//! are owned by the analyzer task and never touched from anywhere else, so
//! lobby and game state need no locks.
//!
//! ```text
//! bridge ──Analyze/Disconnect──→ [ queue ] ──→ analyzer task ──→ Managers
//! server ──Shutdown────────────↗
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arena_maps::MapRegistry;
use arena_protocol::{Manager, Packet, PacketRegistry, Peer, ProtocolFamily};
use arena_room::{GameManager, LobbyConfig, LobbyManager, match_channel};
use arena_session::{ConnectionManager, DevAuthenticator};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::ArenaError;

// ---------------------------------------------------------------------------
// Managers
// ---------------------------------------------------------------------------

/// The three domain managers, one per protocol family.
pub struct Managers {
    pub connections: Box<dyn Manager>,
    pub lobby: Box<dyn Manager>,
    pub games: Box<dyn Manager>,
}

impl Managers {
    /// The stock managers: development login, lobbies over `maps`, and
    /// games fed by the lobby's match queue.
    pub fn standard(maps: Arc<MapRegistry>, lobby: LobbyConfig) -> Self {
        let (matches_tx, matches_rx) = match_channel();
        Self {
            connections: Box::new(ConnectionManager::new(DevAuthenticator)),
            lobby: Box::new(LobbyManager::new(maps, lobby, matches_tx)),
            games: Box::new(GameManager::new(matches_rx)),
        }
    }

    /// The manager owning `family`.
    pub fn for_family(&mut self, family: ProtocolFamily) -> &mut dyn Manager {
        match family {
            ProtocolFamily::Connection => self.connections.as_mut(),
            ProtocolFamily::Lobby => self.lobby.as_mut(),
            ProtocolFamily::Game => self.games.as_mut(),
        }
    }
}

// ---------------------------------------------------------------------------
// Events and handle
// ---------------------------------------------------------------------------

/// One unit of work for the analyzer.
#[derive(Debug)]
pub enum AnalyzerEvent {
    /// Route a decoded packet to the manager of its family.
    Analyze { peer: Peer, packet: Packet },
    /// Tell every manager a connection is gone.
    Disconnect { peer: Peer },
    /// Shut the managers down and stop. `reply` fires once they are done.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Sending side of the analyzer queue. Cheap to clone.
///
/// Every method is fire-and-forget: it returns as soon as the event is
/// queued, and reports `false` only if the analyzer has already stopped.
#[derive(Debug, Clone)]
pub struct AnalyzerHandle {
    events: mpsc::UnboundedSender<AnalyzerEvent>,
}

impl AnalyzerHandle {
    pub fn analyze(&self, peer: Peer, packet: Packet) -> bool {
        self.events
            .send(AnalyzerEvent::Analyze { peer, packet })
            .is_ok()
    }

    pub fn disconnect(&self, peer: Peer) -> bool {
        self.events.send(AnalyzerEvent::Disconnect { peer }).is_ok()
    }

    /// Queues a shutdown behind every pending event and waits until the
    /// managers have run it.
    ///
    /// Returns `false` if the analyzer stopped before getting to it.
    pub async fn shutdown(&self) -> bool {
        let (reply, done) = oneshot::channel();
        if self.events.send(AnalyzerEvent::Shutdown { reply }).is_err() {
            return false;
        }
        done.await.is_ok()
    }
}

// ---------------------------------------------------------------------------
// Analyzer task
// ---------------------------------------------------------------------------

/// Spawns the analyzer task.
///
/// The task ends with `Ok(())` after a shutdown or once every handle is
/// dropped, and with [`ArenaError::UnregisteredPacket`] if a packet kind
/// is not in `registry`.
pub fn spawn_analyzer(
    registry: PacketRegistry,
    managers: Managers,
) -> (AnalyzerHandle, JoinHandle<Result<(), ArenaError>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let analyzer = Analyzer {
        registry,
        managers,
        events: rx,
    };
    (AnalyzerHandle { events: tx }, tokio::spawn(analyzer.run()))
}

struct Analyzer {
    registry: PacketRegistry,
    managers: Managers,
    events: mpsc::UnboundedReceiver<AnalyzerEvent>,
}

impl Analyzer {
    async fn run(mut self) -> Result<(), ArenaError> {
        tracing::info!(kinds = self.registry.len(), "analyzer started");

        while let Some(event) = self.events.recv().await {
            match event {
                AnalyzerEvent::Analyze { peer, packet } => {
                    let Some(family) = self.registry.family_of(&packet.kind) else {
                        tracing::error!(
                            conn_id = %peer.id(),
                            kind = %packet.kind,
                            "unregistered packet kind, stopping"
                        );
                        return Err(ArenaError::UnregisteredPacket { kind: packet.kind });
                    };
                    tracing::trace!(conn_id = %peer.id(), kind = %packet.kind, %family, "analyze");
                    let manager = self.managers.for_family(family);
                    guarded(family, "analyze", || manager.analyze(&peer, packet));
                }
                AnalyzerEvent::Disconnect { peer } => {
                    tracing::debug!(conn_id = %peer.id(), "dispatching disconnect");
                    for family in ProtocolFamily::ALL {
                        let manager = self.managers.for_family(family);
                        guarded(family, "disconnect", || manager.disconnect(&peer));
                    }
                }
                AnalyzerEvent::Shutdown { reply } => {
                    tracing::info!("shutting down managers");
                    for family in [ProtocolFamily::Game, ProtocolFamily::Connection] {
                        let manager = self.managers.for_family(family);
                        guarded(family, "shutdown", || manager.shutdown());
                    }
                    let _ = reply.send(());
                    break;
                }
            }

            for family in ProtocolFamily::ALL {
                let manager = self.managers.for_family(family);
                guarded(family, "poll", || manager.poll());
            }
        }

        tracing::info!("analyzer stopped");
        Ok(())
    }
}

/// Runs one manager call, containing any panic to that call.
fn guarded(family: ProtocolFamily, stage: &'static str, call: impl FnOnce()) {
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(call)) {
        tracing::error!(
            %family,
            stage,
            reason = panic_message(panic.as_ref()),
            "manager panicked, event dropped"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_reads_str_and_string_payloads() {
        let a = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        let b = std::panic::catch_unwind(|| panic!("formatted {}", 1)).unwrap_err();
        let c = std::panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();

        assert_eq!(panic_message(a.as_ref()), "static");
        assert_eq!(panic_message(b.as_ref()), "formatted 1");
        assert_eq!(panic_message(c.as_ref()), "non-string panic payload");
    }
}
