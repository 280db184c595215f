//! UDP endpoint for the unreliable half of the server's two ports.
//!
//! A UDP datagram has no connection of its own, so every datagram is framed
//! with the id of the WebSocket connection it belongs to and the secret the
//! server handed that connection in its `Welcome`:
//!
//! ```text
//! ┌──────────────────────┬──────────────────────┬──────────────────────┐
//! │ connection id (u64,  │ udp secret (u64,     │ encoded packet bytes │
//! │ big-endian, 8 bytes) │ big-endian, 8 bytes) │                      │
//! └──────────────────────┴──────────────────────┴──────────────────────┘
//! ```
//!
//! Ids are sequential and easy to guess; the secret is what ties a datagram
//! to its connection.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::{ConnectionId, TransportError};

const HEADER_LEN: usize = 16;
const MAX_DATAGRAM: usize = 64 * 1024;

/// A datagram received on the UDP port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Connection the sender claims to belong to.
    pub connection: ConnectionId,
    /// Secret the sender presented for that connection.
    pub secret: u64,
    /// Source address of the datagram.
    pub from: SocketAddr,
    /// Payload after the header.
    pub payload: Vec<u8>,
}

/// Prefixes `payload` with the connection id and secret.
pub fn encode_datagram(connection: ConnectionId, secret: u64, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&connection.into_inner().to_be_bytes());
    buf.extend_from_slice(&secret.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Splits a raw datagram into its connection id, secret and payload.
pub fn decode_datagram(
    raw: &[u8],
) -> Result<(ConnectionId, u64, &[u8]), TransportError> {
    if raw.len() < HEADER_LEN {
        return Err(TransportError::MalformedDatagram(raw.len()));
    }
    let (header, payload) = raw.split_at(HEADER_LEN);
    let (id, secret) = header.split_at(8);
    Ok((ConnectionId::new(be_u64(id)), be_u64(secret), payload))
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    u64::from_be_bytes(word)
}

/// A bound UDP socket speaking the framed datagram format.
pub struct UdpEndpoint {
    socket: UdpSocket,
}

impl UdpEndpoint {
    /// Binds the endpoint to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).await.map_err(|source| {
            TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "UDP endpoint listening");
        Ok(Self { socket })
    }

    /// Returns the address the endpoint is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receives the next framed datagram.
    ///
    /// A datagram shorter than the header is reported as
    /// [`TransportError::MalformedDatagram`]; the endpoint stays usable.
    pub async fn recv(&self) -> Result<Datagram, TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        let (connection, secret, payload) = decode_datagram(&buf[..len])?;
        Ok(Datagram {
            connection,
            secret,
            from,
            payload: payload.to_vec(),
        })
    }

    /// Sends a framed datagram to `to`.
    pub async fn send(
        &self,
        to: SocketAddr,
        connection: ConnectionId,
        secret: u64,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let frame = encode_datagram(connection, secret, payload);
        self.socket
            .send_to(&frame, to)
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_datagram_splits_header_and_payload() {
        let raw = encode_datagram(ConnectionId::new(258), 0xAB, b"hi");
        assert_eq!(&raw[..8], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(&raw[8..16], &[0, 0, 0, 0, 0, 0, 0, 0xAB]);

        let (id, secret, payload) = decode_datagram(&raw).unwrap();
        assert_eq!(id, ConnectionId::new(258));
        assert_eq!(secret, 0xAB);
        assert_eq!(payload, b"hi");
    }

    #[test]
    fn test_decode_datagram_header_only_has_empty_payload() {
        let raw = encode_datagram(ConnectionId::new(9), u64::MAX, b"");
        let (id, secret, payload) = decode_datagram(&raw).unwrap();
        assert_eq!(id.into_inner(), 9);
        assert_eq!(secret, u64::MAX);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_decode_datagram_too_short_returns_error() {
        let result = decode_datagram(&[1, 2, 3]);
        assert!(matches!(result, Err(TransportError::MalformedDatagram(3))));
    }

    #[test]
    fn test_decode_datagram_id_without_secret_is_malformed() {
        let raw = ConnectionId::new(4).into_inner().to_be_bytes();
        let result = decode_datagram(&raw);
        assert!(matches!(result, Err(TransportError::MalformedDatagram(8))));
    }
}
