use axum::Json;
use metrics::counter;
use service_core::error::AppError;
use service_core::extract::ValidatedJson;

use crate::dtos::{PreprocessRequest, PreprocessResponse};
use crate::services::preprocess;

/// `POST /preprocess`
pub async fn preprocess_text(
    ValidatedJson(req): ValidatedJson<PreprocessRequest>,
) -> Result<Json<PreprocessResponse>, AppError> {
    let text = req.text.unwrap_or_default();
    let processed_data = preprocess(&text);

    counter!("preprocess_requests_total").increment(1);
    tracing::debug!(input_chars = text.chars().count(), "Preprocessed text");

    Ok(Json(PreprocessResponse { processed_data }))
}
