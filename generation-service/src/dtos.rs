use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /generate`. `processed_data` is required but may be empty.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    pub processed_data: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub generated_text: String,
}
