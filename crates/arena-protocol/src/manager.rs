//! The contract between the dispatch core and the domain managers.

use std::net::SocketAddr;

use arena_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::Packet;

/// A connected client as seen by the managers.
///
/// Cheap to clone: the outbound side is an `mpsc` sender drained by the
/// connection's writer task. Managers keep clones to reply later or to
/// broadcast to other members of a lobby or game.
#[derive(Debug, Clone)]
pub struct Peer {
    id: ConnectionId,
    addr: SocketAddr,
    outbound: mpsc::UnboundedSender<Packet>,
}

impl Peer {
    /// Wraps an existing outbound sender.
    pub fn new(
        id: ConnectionId,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Packet>,
    ) -> Self {
        Self { id, addr, outbound }
    }

    /// Creates a peer together with the receiver for its outbound packets.
    pub fn channel(
        id: ConnectionId,
        addr: SocketAddr,
    ) -> (Self, mpsc::UnboundedReceiver<Packet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, addr, tx), rx)
    }

    /// Returns the connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queues a packet for delivery.
    ///
    /// Returns `false` if the connection is already gone; the packet is
    /// dropped in that case.
    pub fn send(&self, packet: Packet) -> bool {
        self.outbound.send(packet).is_ok()
    }
}

/// A domain manager driven by the dispatch core.
///
/// Every call is made from the single analyzer context, one at a
/// time, so implementations take `&mut self` and need no locking.
pub trait Manager: Send + 'static {
    /// Handles one packet of this manager's protocol family.
    fn analyze(&mut self, peer: &Peer, packet: Packet);

    /// Forgets everything about `peer`.
    ///
    /// Called for every disconnect, including peers this manager never saw;
    /// that case must be a no-op.
    fn disconnect(&mut self, peer: &Peer);

    /// Picks up work handed over by a sibling manager.
    ///
    /// Called after every analyzer event, for every manager, so work queued
    /// during one event is acted on before the next one. Default: no-op.
    fn poll(&mut self) {}

    /// Releases held resources before the process exits. Default: no-op.
    fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn test_peer_send_delivers_to_receiver() {
        let (peer, mut rx) = Peer::channel(ConnectionId::new(1), addr());
        assert!(peer.send(Packet::new("Pong")));
        assert_eq!(rx.try_recv().unwrap().kind, "Pong");
    }

    #[test]
    fn test_peer_send_after_receiver_dropped_returns_false() {
        let (peer, rx) = Peer::channel(ConnectionId::new(1), addr());
        drop(rx);
        assert!(!peer.send(Packet::new("Pong")));
    }

    #[test]
    fn test_peer_clone_shares_outbound_queue() {
        let (peer, mut rx) = Peer::channel(ConnectionId::new(3), addr());
        let other = peer.clone();
        other.send(Packet::new("A"));
        peer.send(Packet::new("B"));
        assert_eq!(rx.try_recv().unwrap().kind, "A");
        assert_eq!(rx.try_recv().unwrap().kind, "B");
        assert_eq!(other.id(), ConnectionId::new(3));
        assert_eq!(other.remote_addr(), addr());
    }
}
