//! WebSocket upgrade handler

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::relay::{ConnId, Outbound, RelayHandle, PEER_BUFFER};
use crate::util::rate_limit::PeerRateLimiter;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, addr, state)
}

/// Accept the upgrade and hand the socket to a session task
pub fn upgrade(ws: WebSocketUpgrade, addr: SocketAddr, state: AppState) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, remote = %addr, "New WebSocket connection");

    let (out_tx, out_rx) = mpsc::channel::<Outbound>(PEER_BUFFER);
    if let Err(e) = state.relay.connect(conn_id, addr.to_string(), out_tx).await {
        error!(conn_id = %conn_id, error = %e, "Failed to register connection with relay");
        return;
    }

    let limiter = PeerRateLimiter::new(state.config.relay_rate_limit);
    let reason = run_session(conn_id, socket, out_rx, &state.relay, limiter).await;

    // Cleanup on disconnect
    state.relay.disconnect(conn_id, reason).await;

    info!(conn_id = %conn_id, reason, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split.
/// Returns why the session ended.
async fn run_session(
    conn_id: ConnId,
    socket: WebSocket,
    mut out_rx: mpsc::Receiver<Outbound>,
    relay: &RelayHandle,
    limiter: PeerRateLimiter,
) -> &'static str {
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Spawn writer task: relay frames -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(frame.to_string())).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> relay hub
    let mut reason = "closed";
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !limiter.check_inbound() {
                    warn!(conn_id = %conn_id, "Rate limited inbound message");
                    continue;
                }

                if relay.inbound(conn_id, text).await.is_err() {
                    debug!(conn_id = %conn_id, "Relay hub gone");
                    reason = "relay shutdown";
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                reason = "transport error";
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
    reason
}
