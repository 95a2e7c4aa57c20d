//! Per-connection handler: decode client events and route them to rooms.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The socket is split: a writer task drains the connection's outbound
//! channel while the read loop below decodes frames and calls the registry.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use graphguess_protocol::{ClientEvent, Codec, ConnectionId, ServerEvent};
use graphguess_room::RoomRegistry;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::server::ServerState;
use crate::transport::WsStream;

/// Runs the disconnect path when the handler exits, whatever the reason.
///
/// `Drop` is synchronous, so the async cleanup is spawned.
struct PresenceGuard {
    conn: ConnectionId,
    registry: RoomRegistry,
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        let conn = self.conn;
        let registry = self.registry.clone();
        tokio::spawn(async move {
            registry.disconnect(conn).await;
        });
    }
}

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection(conn: ConnectionId, ws: WsStream, state: Arc<ServerState>) {
    tracing::info!(%conn, "client connected");

    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.registry.gateway().register(conn, tx.clone());
    let _guard = PresenceGuard {
        conn,
        registry: state.registry.clone(),
    };

    // The writer ends once the gateway entry and `tx` are both dropped.
    let codec = state.codec;
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match codec.encode_text(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(%conn, error = %e, "failed to encode event");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                tracing::debug!(%conn, error = %e, "send failed, stopping writer");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%conn, error = %e, "receive error");
                break;
            }
        };
        let decoded = match &frame {
            Message::Text(text) => state.codec.decode::<ClientEvent>(text.as_bytes()),
            Message::Binary(data) => state.codec.decode::<ClientEvent>(data),
            Message::Close(_) => break,
            // ping/pong are answered by tungstenite
            _ => continue,
        };

        let event = match decoded {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn, error = %e, "failed to decode client event");
                send_error(&tx, "bad-request", &e.to_string());
                continue;
            }
        };

        if let Err(e) = state.registry.route(conn, event).await {
            tracing::debug!(%conn, error = %e, "request rejected");
            send_error(&tx, e.code(), &e.to_string());
        }
    }

    tracing::info!(%conn, "client disconnected");
    // _guard drops here → disconnect runs.
}

fn send_error(tx: &mpsc::UnboundedSender<ServerEvent>, code: &str, message: &str) {
    let _ = tx.send(ServerEvent::ErrorMsg {
        code: code.to_string(),
        message: message.to_string(),
    });
}
