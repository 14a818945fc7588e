//! Text generator abstractions and implementations.
//!
//! Handlers only see `Arc<dyn TextGenerator>`, so the GPT-2 backend and the
//! mock used in tests are interchangeable.

pub mod gpt2;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for generator operations.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Generator unavailable: {0}")]
    Unavailable(String),
}

impl From<candle_core::Error> for GeneratorError {
    fn from(err: candle_core::Error) -> Self {
        GeneratorError::Inference(err.to_string())
    }
}

/// Generation parameters, fixed per process.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Total tokens per candidate, prompt included.
    pub max_length: usize,

    /// Candidates to produce.
    pub num_return_sequences: usize,

    /// Top-k sampling cutoff.
    pub top_k: usize,

    /// Sampling temperature.
    pub temperature: f64,

    /// Fixed seed; a fresh random seed per call when `None`.
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: 50,
            num_return_sequences: 1,
            top_k: 50,
            temperature: 1.0,
            seed: None,
        }
    }
}

/// One candidate sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSequence {
    /// Prompt followed by the generated continuation.
    pub text: String,

    /// Tokens in the candidate, prompt included.
    pub token_count: usize,
}

/// Trait for text generation backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Identifier of the loaded model, for health output and logs.
    fn model_name(&self) -> &str;

    /// Produce `params.num_return_sequences` candidates for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<GeneratedSequence>, GeneratorError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), GeneratorError>;
}
