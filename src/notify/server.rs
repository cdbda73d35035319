//! Notification endpoint server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::NotifyConfig;
use crate::error::{AppError, Result};
use crate::notify::auth::TokenVerifier;
use crate::notify::handlers::{self, NotifyState};

/// Notification endpoint server manager
pub struct NotifyServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl NotifyServer {
    pub fn new() -> Self {
        Self { shutdown_tx: None }
    }

    /// Bind and start serving in a spawned task
    pub async fn start(
        &mut self,
        config: &NotifyConfig,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Result<()> {
        if !config.enabled {
            info!("Notification endpoint is disabled");
            return Ok(());
        }

        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid notify address: {}", e)))?;

        let state = Arc::new(NotifyState { verifier });

        // Allow all origins for local development
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/api/v1/notify", post(handlers::send_notification))
            .with_state(state)
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

        info!("Notification endpoint listening on {}", addr);
        info!("  GET  http://{}/health", addr);
        info!("  POST http://{}/api/v1/notify", addr);

        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Notification endpoint shutting down");
            });

            if let Err(e) = server.await {
                error!("Notification endpoint error: {}", e);
            }
        });

        Ok(())
    }

    /// Signal graceful shutdown
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("Notification endpoint stop signal sent");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Default for NotifyServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NotifyServer {
    fn drop(&mut self) {
        self.stop();
    }
}
