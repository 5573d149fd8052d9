//! Test server harness for E2E testing
//!
//! Provides `TestPokerServer` for spawning real poker service instances in
//! tests. Each instance binds its own random port and owns its own room
//! controller, so tests never share state.

use poker_service::actors::{ActorMetrics, ControllerStatus, RoomControllerHandle};
use poker_service::config::Config;
use poker_service::observability::metrics::detached_handle;
use poker_service::observability::HealthState;
use poker_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test harness for spawning the poker service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let server = TestPokerServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestPokerServer {
    addr: SocketAddr,
    config: Config,
    controller: RoomControllerHandle,
    health: Arc<HealthState>,
    shutdown: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestPokerServer {
    /// Spawn a server with default settings.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(&HashMap::new()).await
    }

    /// Spawn a server configured from environment-style variables.
    ///
    /// `POKER_BIND_ADDRESS` is always overridden with `127.0.0.1:0`.
    pub async fn spawn_with_vars(vars: &HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let mut vars = vars.clone();
        vars.insert("POKER_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string());

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        Self::spawn_with(config).await
    }

    /// Spawn a server with an explicit configuration.
    ///
    /// The server will:
    /// - Bind to a random available port on 127.0.0.1
    /// - Serve the real route table in the background
    /// - Report ready immediately
    pub async fn spawn_with(config: Config) -> Result<Self, anyhow::Error> {
        // Each server gets its own recorder handle; only one global recorder
        // can exist per process.
        let metrics_handle = detached_handle().map_err(|e| anyhow::anyhow!(e))?;

        let controller = RoomControllerHandle::new(&config, ActorMetrics::new());
        let health = Arc::new(HealthState::new());
        let shutdown = CancellationToken::new();

        let state = Arc::new(AppState {
            controller: controller.clone(),
            config: config.clone(),
            health: Arc::clone(&health),
            shutdown: shutdown.clone(),
        });
        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        health.set_ready();

        Ok(Self {
            addr,
            config,
            controller,
            health,
            shutdown,
            _handle: handle,
        })
    }

    /// Base HTTP URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket endpoint URL.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Direct handle to the server's room controller.
    pub fn controller(&self) -> &RoomControllerHandle {
        &self.controller
    }

    /// Controller counters.
    ///
    /// The status query is answered in mailbox order, so awaiting it also
    /// waits for every message enqueued before it.
    pub async fn status(&self) -> Result<ControllerStatus, anyhow::Error> {
        self.controller
            .get_status()
            .await
            .map_err(|e| anyhow::anyhow!("Status query failed: {}", e))
    }

    /// Start the same drain sequence the binary runs on SIGTERM.
    pub async fn begin_shutdown(&self) -> Result<(), anyhow::Error> {
        self.health.set_not_ready();
        self.controller
            .shutdown()
            .await
            .map_err(|e| anyhow::anyhow!("Controller shutdown failed: {}", e))?;
        self.controller.stopped().await;
        self.shutdown.cancel();
        Ok(())
    }
}

impl Drop for TestPokerServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.controller.cancel();
        self._handle.abort();
    }
}
