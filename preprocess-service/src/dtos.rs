use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /preprocess`. A missing or null `text` is treated as empty.
#[derive(Debug, Deserialize, Validate)]
pub struct PreprocessRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreprocessResponse {
    pub processed_data: String,
}
