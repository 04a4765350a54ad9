//! WebSocket transport for peers.
//!
//! Each upgraded socket becomes one connection: a writer task drains the
//! connection's outbound queue into the socket while the read loop feeds
//! every inbound message to [`DropRelay`]. When the socket ends, for any
//! reason, the relay is told the connection is gone.

use crate::connection::Outgoing;
use crate::server::DropRelay;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::ConnectInfo;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

impl From<Outgoing> for Message {
    fn from(message: Outgoing) -> Self {
        match message {
            Outgoing::Reply(reply) => Message::Text(reply.to_text()),
            Outgoing::Frame(bytes) => Message::Binary(bytes),
        }
    }
}

/// Upgrade handler for `GET /ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(relay): Extension<Arc<DropRelay>>,
) -> Response {
    if let Err(e) = relay.rate_limits().check_connection(addr.ip()) {
        tracing::warn!("Connection rate limited for {}: {}", addr, e);
        relay.metrics().rate_limit_hits.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::TOO_MANY_REQUESTS, e.to_string()).into_response();
    }

    let max = relay.config().limits.max_frame_bytes;
    ws.max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(move |socket| run_connection(relay, socket, addr))
}

/// Serve one peer until its socket closes.
pub async fn run_connection(relay: Arc<DropRelay>, socket: WebSocket, addr: SocketAddr) {
    let (peer, mut outbound) = relay.open_connection(addr);
    let (mut sink, mut stream) = socket.split();
    tracing::info!("{} connected from {}", peer.id(), addr);

    let conn = peer.id();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = sink.send(message.into()).await {
                tracing::debug!("{}: write failed: {}", conn, e);
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => relay.handle_text(&peer, &text).await,
            Ok(Message::Binary(bytes)) => relay.handle_binary(&peer, bytes).await,
            // Pings are answered by the WebSocket layer.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!("{}: read failed: {}", peer.id(), e);
                break;
            }
        }
    }

    relay.disconnect(peer.id()).await;
    writer.abort();
    tracing::info!("{} disconnected", peer.id());
}
