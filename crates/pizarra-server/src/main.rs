//! Pizarra WebSocket Relay Server
//!
//! Keeps each room's record log and relays new records to every member.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "room": "sala-principal", "since": 41 }
//! { "type": "publish", "record": { "collection": "drawings", ... } }
//! { "type": "record", "seq": 42, "record": { "collection": "clear", ... } }
//! ```

mod config;
mod rooms;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use pizarra_core::protocol::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::rooms::{AppState, RoomEvent};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pizarra_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let state = Arc::new(AppState::new(config));

    info!(
        history_limit = config.history_limit,
        channel_capacity = config.channel_capacity,
        "Pizarra relay server listening on {}",
        config.addr
    );
    info!("WebSocket endpoint: ws://{}/ws", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app(state)).await
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "Pizarra Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type WsSender = SplitSink<WebSocket, Message>;

/// Serialize and send one message. Returns false once the socket is gone.
async fn send(sender: &mut WsSender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("Failed to encode server message: {}", e);
            true
        }
    }
}

/// Per-connection room membership.
struct Membership {
    room: String,
    rx: broadcast::Receiver<RoomEvent>,
    /// Highest sequence key delivered on this connection.
    last_seq: Option<u64>,
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut membership: Option<Membership> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => client_msg,
                            Err(e) => {
                                warn!("Invalid message from {}: {}", peer_id, e);
                                let err = ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                };
                                if !send(&mut sender, &err).await {
                                    break;
                                }
                                continue;
                            }
                        };
                        match client_msg {
                            ClientMessage::Join { room, since } => {
                                // Leave current room if any
                                if let Some(old) = membership.take() {
                                    leave(&state, &old.room, &peer_id);
                                }

                                let joined = state.join_room(&room, &peer_id, since);
                                let confirm = ServerMessage::Joined {
                                    room: room.clone(),
                                    peer_count: joined.peer_count,
                                    head: joined.head,
                                };
                                if !send(&mut sender, &confirm).await {
                                    break;
                                }

                                let mut last_seq = joined.since;
                                let mut open = true;
                                for (seq, record) in joined.backlog {
                                    last_seq = Some(seq);
                                    if !send(&mut sender, &ServerMessage::Record { seq, record }).await {
                                        open = false;
                                        break;
                                    }
                                }
                                if !open {
                                    break;
                                }

                                // Notify others
                                state.broadcast(&room, &peer_id, ServerMessage::PeerJoined {
                                    peer_id: peer_id.clone(),
                                });
                                info!("Peer {} joined room {} ({} peers)", peer_id, room, state.peer_count(&room));

                                membership = Some(Membership { room, rx: joined.rx, last_seq });
                            }
                            ClientMessage::Leave => {
                                if let Some(old) = membership.take() {
                                    leave(&state, &old.room, &peer_id);
                                    info!("Peer {} left room {}", peer_id, old.room);
                                }
                            }
                            ClientMessage::Publish { record } => {
                                let reply = match (&membership, record.validate()) {
                                    (None, _) => Some("Join a room before publishing".to_string()),
                                    (Some(_), Err(e)) => Some(format!("Invalid record: {}", e)),
                                    (Some(m), Ok(())) => {
                                        state.publish(&m.room, &peer_id, record);
                                        None
                                    }
                                };
                                if let Some(message) = reply {
                                    warn!("Rejected publish from {}: {}", peer_id, message);
                                    if !send(&mut sender, &ServerMessage::Error { message }).await {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore ping/pong and binary frames
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Handle broadcast messages from room
            event = async {
                match &mut membership {
                    Some(m) => m.rx.recv().await,
                    None => {
                        // No room joined, just wait forever
                        std::future::pending::<Result<RoomEvent, RecvError>>().await
                    }
                }
            } => {
                let Some(m) = membership.as_mut() else { continue };
                match event {
                    Ok((_, ServerMessage::Record { seq, record })) => {
                        // Records go to everyone, the publisher included.
                        if m.last_seq.is_some_and(|last| seq <= last) {
                            continue;
                        }
                        m.last_seq = Some(seq);
                        if !send(&mut sender, &ServerMessage::Record { seq, record }).await {
                            break;
                        }
                    }
                    Ok((from, server_msg)) => {
                        // Don't echo presence back to its subject
                        if from != peer_id && !send(&mut sender, &server_msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Peer {} lagged by {} messages, resending from history", peer_id, skipped);
                        let mut open = true;
                        for (seq, record) in state.backlog(&m.room, m.last_seq) {
                            m.last_seq = Some(seq);
                            if !send(&mut sender, &ServerMessage::Record { seq, record }).await {
                                open = false;
                                break;
                            }
                        }
                        if !open {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => {
                        membership = None;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(m) = membership {
        leave(&state, &m.room, &peer_id);
    }
    info!("Connection closed: {}", peer_id);
}

fn leave(state: &AppState, room: &str, peer_id: &str) {
    state.leave_room(room, peer_id);
    state.broadcast(
        room,
        peer_id,
        ServerMessage::PeerLeft {
            peer_id: peer_id.to_string(),
        },
    );
}
