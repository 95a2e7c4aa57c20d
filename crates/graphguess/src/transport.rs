//! WebSocket listener built on `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use graphguess_protocol::ConnectionId;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// An upgraded server-side WebSocket.
pub type WsStream = WebSocketStream<TcpStream>;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The HTTP upgrade to WebSocket failed.
    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),
}

/// A TCP listener that hands out WebSocket connections.
///
/// Accepting and upgrading are separate steps so the accept loop never
/// waits on a slow client's handshake.
pub struct WebSocketListener {
    listener: TcpListener,
}

/// A TCP connection that has not been upgraded yet.
pub struct PendingConnection {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    stream: TcpStream,
}

impl WebSocketListener {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next TCP connection and assigns it a [`ConnectionId`].
    pub async fn accept(&self) -> Result<PendingConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer, "accepted TCP connection");
        Ok(PendingConnection { id, peer, stream })
    }
}

impl PendingConnection {
    /// Performs the WebSocket handshake.
    pub async fn upgrade(self) -> Result<(ConnectionId, WsStream), TransportError> {
        let ws = tokio_tungstenite::accept_async(self.stream)
            .await
            .map_err(TransportError::Handshake)?;
        tracing::debug!(id = %self.id, peer = %self.peer, "websocket connection upgraded");
        Ok((self.id, ws))
    }
}
