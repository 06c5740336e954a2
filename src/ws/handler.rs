//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use std::fmt::Display;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ArenaCommand, ArenaHandle, SessionId};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::SessionHub;

/// Longest display name kept from the query string (in characters)
pub const MAX_NAME_LEN: usize = 24;

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Display name shown to other players
    pub name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let session_id = Uuid::new_v4();
    let name = display_name(query.name.as_deref(), session_id);
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, name, state))
}

/// Trimmed and capped name, or `Player-xxxx` from the session id
fn display_name(requested: Option<&str>, session_id: SessionId) -> String {
    let trimmed = requested.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        let short: String = session_id.simple().to_string().chars().take(4).collect();
        format!("Player-{short}")
    } else {
        trimmed.chars().take(MAX_NAME_LEN).collect()
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, session_id: SessionId, name: String, state: AppState) {
    info!(
        session_id = %session_id,
        name = %name,
        sessions = state.hub.len(),
        "New WebSocket connection"
    );

    let (ws_sink, ws_stream) = socket.split();
    run_connection(
        session_id,
        name,
        ws_sink,
        ws_stream,
        &state.hub,
        &state.arena,
        PlayerRateLimiter::new(),
    )
    .await;

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Full lifecycle of one session over any frame sink/stream: register with
/// the hub, join the arena, pump frames until the client goes away, then
/// leave and unregister.
async fn run_connection<Si, St, E>(
    session_id: SessionId,
    name: String,
    sink: Si,
    stream: St,
    hub: &SessionHub,
    arena: &ArenaHandle,
    rate_limiter: PlayerRateLimiter,
) where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    // Register before joining so the init message has somewhere to go
    let outbound_rx = hub.register(session_id);

    if arena.send(ArenaCommand::Join { session_id, name }).await {
        run_session(session_id, sink, stream, outbound_rx, arena, &rate_limiter).await;
    } else {
        error!(session_id = %session_id, "Arena is not running");
    }

    // Cleanup on disconnect
    arena.send(ArenaCommand::Leave { session_id }).await;
    hub.unregister(session_id);
}

/// Run the session with read/write split
async fn run_session<Si, St, E>(
    session_id: SessionId,
    mut sink: Si,
    mut stream: St,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
    arena: &ArenaHandle,
    rate_limiter: &PlayerRateLimiter,
) where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    // Spawn writer task: session queue -> socket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut sink, &msg).await {
                debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: socket -> arena
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(session_id = %session_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        let command = ArenaCommand::Input {
                            session_id,
                            msg,
                            received_at: unix_millis(),
                        };
                        if !arena.send(command).await {
                            debug!(session_id = %session_id, "Arena command channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over the socket
async fn send_msg<S>(sink: &mut S, msg: &ServerMsg) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
