/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding a listening socket failed (port in use, permission denied).
    #[error("bind {addr} failed: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting an incoming TCP connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// A datagram was too short to carry its header.
    #[error("malformed datagram of {0} bytes")]
    MalformedDatagram(usize),

    /// The WebSocket upgrade of an accepted TCP stream failed.
    #[cfg(feature = "websocket")]
    #[error("websocket handshake with {addr} failed: {source}")]
    Handshake {
        addr: std::net::SocketAddr,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    /// The client did not finish the WebSocket upgrade in time.
    #[cfg(feature = "websocket")]
    #[error("websocket handshake with {addr} timed out")]
    HandshakeTimeout { addr: std::net::SocketAddr },

    /// A WebSocket frame could not be read or written.
    #[cfg(feature = "websocket")]
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
