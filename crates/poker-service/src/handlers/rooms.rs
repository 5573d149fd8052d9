//! Read-only room queries.
//!
//! These are served from the controller's query messages, so they observe
//! the same state as WebSocket clients and never mutate anything.

use crate::errors::PokerError;
use crate::room::{RoomSnapshot, RoomSummary};
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::Json;
use common::types::RoomId;
use std::sync::Arc;
use tracing::instrument;

/// `GET /api/v1/rooms` - the lobby list, oldest room first.
#[instrument(skip_all)]
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Result<Json<Vec<RoomSummary>>, PokerError> {
    let rooms = state
        .controller
        .list_rooms()
        .await
        .map_err(|e| unavailable_if_draining(&state, e))?;
    Ok(Json(rooms))
}

/// `GET /api/v1/rooms/{room_id}` - one room snapshot.
#[instrument(skip_all)]
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(raw_room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, PokerError> {
    let room_id = RoomId::normalize(&raw_room_id);
    let snapshot = state
        .controller
        .get_room(room_id.clone())
        .await
        .map_err(|e| unavailable_if_draining(&state, e))?;

    snapshot
        .map(Json)
        .ok_or_else(|| PokerError::RoomNotFound(room_id.to_string()))
}

fn unavailable_if_draining(state: &AppState, err: PokerError) -> PokerError {
    if state.controller.is_cancelled() {
        PokerError::Draining
    } else {
        err
    }
}
