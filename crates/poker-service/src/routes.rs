//! HTTP routes for the poker service.
//!
//! Defines the Axum router and application state.

use crate::actors::RoomControllerHandle;
use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::observability::{health_router, HealthState};
use crate::ws;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout for the JSON API. Does not apply to `/ws`.
const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the room controller.
    pub controller: RoomControllerHandle,

    /// Service configuration.
    pub config: Config,

    /// Liveness/readiness flags.
    pub health: Arc<HealthState>,

    /// Cancelled when the server starts shutting down; every WebSocket
    /// session holds a child token.
    pub shutdown: CancellationToken,
}

/// Build the application routes.
///
/// - `/health`, `/ready` - probes
/// - `/metrics` - Prometheus exposition
/// - `/api/v1/rooms` - lobby list
/// - `/api/v1/rooms/:room_id` - one room snapshot
/// - `/ws` - WebSocket upgrade
///
/// TraceLayer and the HTTP metrics middleware wrap everything.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let api_routes = Router::new()
        .route("/api/v1/rooms", get(handlers::list_rooms))
        .route("/api/v1/rooms/:room_id", get(handlers::get_room))
        .layer(TimeoutLayer::new(API_REQUEST_TIMEOUT))
        .with_state(Arc::clone(&state));

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(Arc::clone(&state));

    health_router(Arc::clone(&state.health))
        .merge(metrics_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}
