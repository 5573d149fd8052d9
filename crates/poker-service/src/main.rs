//! Planning Poker room service
//!
//! Serves the WebSocket room protocol at `/ws` plus health, readiness,
//! metrics and read-only room queries over HTTP, all on one listener.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing
//! 3. Initialize Prometheus metrics recorder
//! 4. Spawn the room controller actor
//! 5. Bind the listener, mark ready, serve
//!
//! # Shutdown Flow
//!
//! On SIGINT/SIGTERM the service reports not-ready, stops the controller
//! (closing every outbound queue), cancels all WebSocket sessions and lets
//! axum finish in-flight HTTP requests.

use common::config::ObservabilityConfig;
use poker_service::actors::{ActorMetrics, RoomControllerHandle};
use poker_service::config::Config;
use poker_service::observability::metrics::init_metrics_recorder;
use poker_service::observability::HealthState;
use poker_service::routes::{self, AppState};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    init_tracing(
        config
            .as_ref()
            .map_or(&ObservabilityConfig::default(), |c| &c.observability),
    );

    info!("Starting Poker Service");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        room_code_length = config.room_code_length,
        enforce_scrum_master = config.enforce_scrum_master,
        outbound_buffer = config.outbound_buffer,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());
    let controller = RoomControllerHandle::new(&config, ActorMetrics::new());
    let shutdown_token = CancellationToken::new();

    let bind_address = config.bind_address;
    let state = Arc::new(AppState {
        controller: controller.clone(),
        config,
        health: Arc::clone(&health_state),
        shutdown: shutdown_token.clone(),
    });
    let app = routes::build_routes(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .map_err(|e| {
            error!(error = %e, bind_address = %bind_address, "Failed to bind listener");
            e
        })?;

    health_state.set_ready();
    info!("Poker Service listening on {}", bind_address);

    let drain = {
        let health_state = Arc::clone(&health_state);
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received, initiating graceful shutdown...");

            // Stop receiving traffic before tearing anything down
            health_state.set_not_ready();

            if let Err(e) = controller.shutdown().await {
                warn!(error = %e, "Room controller shutdown error");
            }
            controller.stopped().await;
            shutdown_token.cancel();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(drain)
        .await?;

    info!("Poker Service shutdown complete");
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(observability.filter_directive("poker")));

    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. Without them the service
/// cannot shut down gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
