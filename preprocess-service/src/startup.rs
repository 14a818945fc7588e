//! Application startup and lifecycle management.

use crate::config::PreprocessConfig;
use crate::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::router::{metrics_handler, with_common_layers};
use service_core::shutdown::shutdown_signal;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: PreprocessConfig,
}

/// Build the HTTP router with all routes and shared layers.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/preprocess", post(handlers::preprocess::preprocess_text))
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(metrics_handler));

    with_common_layers(router, state.config.common.max_body_bytes)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Bind the listener (port 0 = random port for testing).
    pub async fn build(config: PreprocessConfig) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Preprocess service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state: AppState { config },
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                e
            })
    }
}
