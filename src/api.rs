//! HTTP endpoints and router assembly.
//!
//! Gameplay runs over the WebSocket at `/ws?room=CODE`; the JSON endpoints
//! here are for lobby screens and operators.

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::registry::RoomRegistry;
use crate::room::RoomSummary;
use crate::types::RoomCode;
use crate::ws;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rooms: usize,
}

#[derive(Debug, Serialize)]
pub struct CreatedRoom {
    pub code: RoomCode,
}

/// Build the application router
pub fn router(registry: RoomRegistry) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/health", get(health))
        .route("/api/rooms", get(list_rooms).post(create_room))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

/// GET /api/health
pub async fn health(State(registry): State<RoomRegistry>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rooms: registry.len().await,
    })
}

/// GET /api/rooms
pub async fn list_rooms(State(registry): State<RoomRegistry>) -> Json<Vec<RoomSummary>> {
    let mut summaries = Vec::new();
    for room in registry.rooms().await {
        if !room.is_closed() {
            summaries.push(room.summary().await);
        }
    }
    summaries.sort_by(|a, b| a.code.cmp(&b.code));
    Json(summaries)
}

/// POST /api/rooms
///
/// Creates a room under a fresh code. A room nobody connects to is removed
/// by the next idle sweep.
pub async fn create_room(
    State(registry): State<RoomRegistry>,
) -> (StatusCode, Json<CreatedRoom>) {
    let room = registry.create_room().await;
    tracing::info!(room = %room.code(), "Room created over HTTP");
    (
        StatusCode::CREATED,
        Json(CreatedRoom {
            code: room.code().to_string(),
        }),
    )
}
