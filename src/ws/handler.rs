//! WebSocket upgrade handler

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::{Outbound, PlayerId};
use crate::session::{Flow, Session};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::ServerMsg;

/// How long the writer may keep flushing after the reader has finished
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, peer: SocketAddr, state: AppState) {
    let (outbound, outbound_rx) = Outbound::channel(state.config.outbound_queue_size);
    let mut session = Session::new(state.world.clone(), state.login.clone(), outbound);
    let session_id = session.id();

    info!(session_id = %session_id, %peer, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(session_id, ws_sink, outbound_rx));

    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);
    read_loop(&mut session, ws_stream, &rate_limiter).await;

    // Unregister and notify peers from this task, then let the writer flush.
    session.terminate();
    drop(session);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        debug!(session_id = %session_id, "Writer did not drain in time");
        writer.abort();
    }

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> session
async fn read_loop(
    session: &mut Session,
    mut ws_stream: SplitStream<WebSocket>,
    rate_limiter: &ConnectionRateLimiter,
) {
    let session_id = session.id();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(session_id = %session_id, "Rate limited input message");
                    continue;
                }
                debug!(session_id = %session_id, message = %text, "Message received");

                if session.handle_text(&text) == Flow::Close {
                    info!(session_id = %session_id, "Closing session");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(session_id = %session_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(session_id = %session_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Writer task: outbound queue -> WebSocket. Ends once every sender is gone,
/// then closes the socket.
async fn write_loop(
    session_id: PlayerId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(session_id = %session_id, error = %e, "WebSocket send failed");
            return;
        }
    }

    let _ = ws_sink.send(Message::Close(None)).await;
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
