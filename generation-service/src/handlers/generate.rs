use axum::{extract::State, Json};
use service_core::error::AppError;
use service_core::extract::ValidatedJson;

use crate::dtos::{GenerateRequest, GenerateResponse};
use crate::startup::AppState;

/// `POST /generate`
pub async fn generate_text(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    tracing::debug!(
        input_chars = req.processed_data.chars().count(),
        "Generation request"
    );

    let generated_text = state.generation.generate(&req.processed_data).await?;

    Ok(Json(GenerateResponse { generated_text }))
}
