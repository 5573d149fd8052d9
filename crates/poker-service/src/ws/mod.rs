//! WebSocket transport at `GET /ws`.

pub mod session;

use crate::routes::AppState;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use std::sync::Arc;

pub use session::{process_frames, run_session, SessionEnd};

/// Upgrade the request and hand the socket to a new session.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let controller = state.controller.clone();
    let outbound_buffer = state.config.outbound_buffer;
    let shutdown = state.shutdown.child_token();

    ws.on_upgrade(move |socket| run_session(socket, controller, outbound_buffer, shutdown))
}
