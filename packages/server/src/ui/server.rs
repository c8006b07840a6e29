//! Server execution logic.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::infrastructure::{EvictFn, LivenessMonitor};

use super::{
    handler::{get_session_detail, get_sessions, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Build the coordinator's route table.
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/health", get(health_check))
        .route("/api/sessions", get(get_sessions))
        .route("/api/sessions/{session_id}", get(get_session_detail))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Co-streaming session coordinator server.
///
/// Owns the HTTP/WebSocket router and the background liveness monitor;
/// everything else lives in the injected `AppState`.
pub struct Server {
    state: Arc<AppState>,
    heartbeat_interval: Duration,
}

impl Server {
    pub fn new(state: Arc<AppState>, heartbeat_interval: Duration) -> Self {
        Self {
            state,
            heartbeat_interval,
        }
    }

    /// Run the coordinator until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the given address
    /// or if serving fails.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let disconnect = self.state.disconnect_usecase.clone();
        let evict: EvictFn = Arc::new(move |user_id, connection_id| {
            let disconnect = disconnect.clone();
            Box::pin(async move {
                disconnect.execute(&user_id, connection_id).await;
            })
        });
        let monitor = LivenessMonitor::new(
            self.state.registry.clone(),
            self.heartbeat_interval,
            evict,
        )
        .spawn();

        let app = routes(self.state);

        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!(
            "Co-streaming coordinator listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        monitor.abort();
        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
