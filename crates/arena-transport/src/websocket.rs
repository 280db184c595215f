//! The reliable port: WebSocket over TCP via `tokio-tungstenite`.
//!
//! Every established connection is assigned a process-unique
//! [`ConnectionId`]. That id names the connection everywhere else in the
//! server, including in the header of its UDP datagrams.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, PendingConnection, Transport, TransportError};

/// How long a client gets to finish the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// Listener for the server's TCP port.
pub struct WebSocketTransport {
    listener: TcpListener,
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds the listener. Port `0` picks a free port.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    /// Sets the upgrade deadline for connections accepted from now on.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

impl Transport for WebSocketTransport {
    type Pending = PendingWebSocket;
    type Error = TransportError;

    /// Takes the next TCP stream off the listener without reading from it.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error> {
        let (tcp, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::debug!(%addr, "accepted TCP stream");
        Ok(PendingWebSocket {
            tcp,
            addr,
            timeout: self.handshake_timeout,
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A TCP stream waiting for its WebSocket upgrade.
pub struct PendingWebSocket {
    tcp: TcpStream,
    addr: SocketAddr,
    timeout: Duration,
}

impl PendingConnection for PendingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Completes the upgrade.
    ///
    /// A client that fails the upgrade yields [`TransportError::Handshake`],
    /// one that stalls past the deadline yields
    /// [`TransportError::HandshakeTimeout`]. Either way only this stream is
    /// dropped.
    async fn establish(self) -> Result<Self::Connection, Self::Error> {
        let Self { tcp, addr, timeout } = self;
        let ws = tokio::time::timeout(timeout, tokio_tungstenite::accept_async(tcp))
            .await
            .map_err(|_| TransportError::HandshakeTimeout { addr })?
            .map_err(|source| TransportError::Handshake { addr, source })?;

        let id = next_connection_id();
        tracing::debug!(conn_id = %id, %addr, "WebSocket upgrade complete");

        // Reads and writes lock separate halves, so the writer never waits
        // on a pending read.
        let (sink, source) = ws.split();
        Ok(WebSocketConnection {
            id,
            addr,
            sink: Mutex::new(sink),
            source: Mutex::new(source),
        })
    }

    fn remote_addr(&self) -> SocketAddr {
        self.addr
    }
}

/// One client on the reliable port.
///
/// Outbound packets go out as binary frames; inbound text and binary frames
/// are both accepted.
pub struct WebSocketConnection {
    id: ConnectionId,
    addr: SocketAddr,
    sink: Mutex<WsSink>,
    source: Mutex<WsSource>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let frame = Message::Binary(data.to_vec().into());
        self.sink.lock().await.send(frame).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut source = self.source.lock().await;
        while let Some(frame) = source.next().await {
            match frame? {
                Message::Binary(data) => return Ok(Some(data.into())),
                Message::Text(text) => return Ok(Some(text.as_bytes().to_vec())),
                Message::Close(_) => return Ok(None),
                // Control frames are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await?;
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_addr(&self) -> SocketAddr {
        self.addr
    }
}
