//! Application startup and lifecycle management.
//!
//! The model is loaded before the listener is bound: a service that cannot
//! load its model never accepts traffic.

use crate::config::{Backend, GenerationConfig};
use crate::handlers;
use crate::services::providers::gpt2::Gpt2Generator;
use crate::services::providers::mock::MockGenerator;
use crate::services::providers::TextGenerator;
use crate::services::GenerationService;
use axum::{
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::router::{metrics_handler, with_common_layers};
use service_core::shutdown::shutdown_signal;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: GenerationConfig,
    pub generation: GenerationService,
}

impl AppState {
    pub fn new(config: GenerationConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let generation = GenerationService::from_config(generator, &config);
        Self { config, generation }
    }
}

/// Build the HTTP router with all routes and shared layers.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.config.common.max_body_bytes;

    let router = Router::new()
        .route("/generate", post(handlers::generate::generate_text))
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    with_common_layers(router, max_body_bytes)
}

/// Load the configured generator. Model loading runs on the blocking pool.
pub async fn load_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>, AppError> {
    match config.model.backend {
        Backend::Mock => {
            tracing::warn!("Using mock generator; output is not model-generated");
            Ok(Arc::new(MockGenerator::new(true)))
        }
        Backend::Gpt2 => {
            let model_config = config.model.clone();
            tracing::info!(
                model = %model_config.model_id,
                revision = %model_config.revision,
                "Loading GPT-2 model"
            );

            let generator = tokio::task::spawn_blocking(move || Gpt2Generator::load(&model_config))
                .await
                .map_err(|e| AppError::ModelLoadError(anyhow::anyhow!("model load task failed: {}", e)))?
                .map_err(|e| {
                    tracing::error!("Failed to load model: {}", e);
                    AppError::ModelLoadError(anyhow::Error::new(e))
                })?;

            Ok(Arc::new(generator))
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Load the configured model, then bind the listener.
    pub async fn build(config: GenerationConfig) -> Result<Self, AppError> {
        let generator = load_generator(&config).await?;
        Self::build_with_generator(config, generator).await
    }

    /// Bind the listener around an already-loaded generator
    /// (port 0 = random port for testing).
    pub async fn build_with_generator(
        config: GenerationConfig,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = AppState::new(config, generator);

        tracing::info!(
            model = %state.generation.model_name(),
            max_length = state.generation.params().max_length,
            "Generation service: HTTP on port {}",
            port
        );

        Ok(Self {
            port,
            listener,
            state,
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
