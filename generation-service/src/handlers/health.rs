use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::startup::AppState;

/// Liveness probe. Reports the loaded model.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "generation-service",
            "version": env!("CARGO_PKG_VERSION"),
            "model": state.generation.model_name(),
        })),
    )
}

/// Readiness probe: ready while the generator reports healthy.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.generation.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Generator not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
