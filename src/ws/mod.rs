pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;

use crate::connection::ConnectionHandle;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::RoomRegistry;
use handlers::ConnectionContext;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(registry): State<RoomRegistry>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: room={:?}", params.room);

    ws.on_upgrade(move |socket| handle_socket(socket, params, registry))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, registry: RoomRegistry) {
    let (mut sender, mut receiver) = socket.split();

    let room_code = params
        .room
        .as_deref()
        .and_then(crate::ids::normalize_room_code);
    if room_code.is_none() {
        tracing::warn!("WebSocket connected without a valid room code: {:?}", params.room);
    }

    let (connection, mut outbound) = ConnectionHandle::new();
    let mut ctx = ConnectionContext::new(room_code, connection);

    loop {
        tokio::select! {
            // Messages queued for this connection by its room
            Some(msg) = outbound.recv() => {
                let closed = matches!(msg, ServerMessage::RoomClosed { .. });
                if let Ok(json) = serde_json::to_string(&msg) {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                if closed {
                    // The room is gone; the client may join again
                    ctx.binding = None;
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &mut ctx, &registry).await
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };

                        if let Some(response) = response {
                            if let Ok(json) = serde_json::to_string(&response) {
                                if sender.send(Message::Text(json.into())).await.is_err() {
                                    tracing::error!("Failed to send response");
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(player = ?ctx.player_id(), "WebSocket connection closed");
    handlers::handle_disconnect(&mut ctx).await;
}
