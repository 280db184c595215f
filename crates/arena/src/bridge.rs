//! The event bridge between the transports and the analyzer.
//!
//! Each accepted WebSocket connection gets its own task running
//! [`ConnectionBridge::handle_connection`]: it decodes inbound bytes into
//! packets, queues them on the analyzer, and writes whatever the managers
//! send to the connection's [`Peer`]. The UDP port has a single task that
//! attributes every datagram to an already-connected peer.
//!
//! Both kinds of task queue onto the analyzer while holding the peer table
//! lock, so a datagram is either queued before its connection's disconnect
//! or finds the connection gone.

use std::collections::HashMap;
use std::sync::Arc;

use arena_protocol::{Codec, JsonCodec, Packet, Peer, kinds};
use arena_transport::{Connection, ConnectionId, UdpEndpoint};
use tokio::sync::Mutex;

use crate::analyzer::AnalyzerHandle;

/// A live connection as the UDP task sees it.
struct Attached {
    peer: Peer,
    udp_secret: u64,
}

/// Shared state of the bridge. Cheap to clone: one clone per connection task.
#[derive(Clone)]
pub struct ConnectionBridge {
    analyzer: AnalyzerHandle,
    codec: JsonCodec,
    peers: Arc<Mutex<HashMap<ConnectionId, Attached>>>,
}

impl ConnectionBridge {
    pub fn new(analyzer: AnalyzerHandle) -> Self {
        Self {
            analyzer,
            codec: JsonCodec,
            peers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of connections currently attached.
    pub async fn connection_count(&self) -> usize {
        self.peers.lock().await.len()
    }

    /// Drives one connection from accept to close.
    ///
    /// The first packet the client sees is
    /// `Welcome { connection_id, udp_secret }`, the pair it must put in front
    /// of its UDP datagrams.
    pub async fn handle_connection<C: Connection>(self, conn: C) {
        let conn_id = conn.id();
        let (peer, mut outbound) = Peer::channel(conn_id, conn.remote_addr());
        let udp_secret = new_udp_secret();
        self.peers.lock().await.insert(
            conn_id,
            Attached {
                peer: peer.clone(),
                udp_secret,
            },
        );
        tracing::info!(%conn_id, addr = %conn.remote_addr(), "connection established");

        peer.send(
            Packet::new(kinds::WELCOME)
                .with("connection_id", conn_id.into_inner())
                .with("udp_secret", udp_secret),
        );

        loop {
            tokio::select! {
                inbound = conn.recv() => match inbound {
                    Ok(Some(data)) => self.forward(&peer, &data),
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                },
                Some(packet) = outbound.recv() => {
                    let bytes = match self.codec.encode(&packet) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            tracing::warn!(%conn_id, kind = %packet.kind, error = %e, "failed to encode packet");
                            continue;
                        }
                    };
                    if let Err(e) = conn.send(&bytes).await {
                        tracing::debug!(%conn_id, error = %e, "send error");
                        break;
                    }
                }
            }
        }

        {
            let mut peers = self.peers.lock().await;
            peers.remove(&conn_id);
            self.analyzer.disconnect(peer);
        }
        let _ = conn.close().await;
    }

    /// Receives datagrams until the endpoint fails for good.
    ///
    /// A datagram is routed to the connection named in its header only if it
    /// also carries that connection's secret. Anything else is dropped.
    pub async fn run_udp(self, endpoint: Arc<UdpEndpoint>) {
        loop {
            let datagram = match endpoint.recv().await {
                Ok(datagram) => datagram,
                Err(e) => {
                    tracing::debug!(error = %e, "dropping datagram");
                    continue;
                }
            };

            let peers = self.peers.lock().await;
            match peers.get(&datagram.connection) {
                Some(attached) if attached.udp_secret == datagram.secret => {
                    self.forward(&attached.peer, &datagram.payload);
                }
                Some(_) => {
                    tracing::debug!(
                        conn_id = %datagram.connection,
                        from = %datagram.from,
                        "datagram with wrong secret"
                    );
                }
                None => {
                    tracing::debug!(
                        conn_id = %datagram.connection,
                        from = %datagram.from,
                        "datagram for unknown connection"
                    );
                }
            }
        }
    }

    /// Queues a decoded packet. Never awaits, so callers may hold the peer
    /// table lock.
    fn forward(&self, peer: &Peer, data: &[u8]) {
        match self.codec.decode::<Packet>(data) {
            Ok(packet) => {
                self.analyzer.analyze(peer.clone(), packet);
            }
            Err(e) => {
                tracing::debug!(conn_id = %peer.id(), error = %e, "failed to decode packet");
            }
        }
    }
}

/// 53 random bits: every value is exact as a JSON number.
fn new_udp_secret() -> u64 {
    rand::random::<u64>() >> 11
}
