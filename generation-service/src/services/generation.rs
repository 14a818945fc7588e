//! Request-level generation: fixed parameters, concurrency gate, time bound.

use super::providers::{GenerationParams, GeneratorError, TextGenerator};
use crate::config::GenerationConfig;
use metrics::{counter, histogram};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("generation exceeded {0:?}")]
    Timeout(Duration),

    #[error("generator returned no candidates")]
    NoCandidates,

    #[error("generation service is shutting down")]
    Closed,
}

impl GenerationError {
    fn outcome(&self) -> &'static str {
        match self {
            GenerationError::Generator(GeneratorError::InvalidInput(_)) => "invalid_input",
            GenerationError::Generator(_) => "error",
            GenerationError::Timeout(_) => "timeout",
            GenerationError::NoCandidates => "empty",
            GenerationError::Closed => "closed",
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Generator(GeneratorError::InvalidInput(msg)) => {
                AppError::BadRequest(anyhow::anyhow!(msg))
            }
            GenerationError::Generator(GeneratorError::Unavailable(_))
            | GenerationError::Closed => AppError::ServiceUnavailable,
            GenerationError::Generator(GeneratorError::ModelLoad(msg)) => {
                AppError::ModelLoadError(anyhow::anyhow!(msg))
            }
            GenerationError::Timeout(limit) => {
                AppError::GatewayTimeout(format!("generation exceeded {}s", limit.as_secs()))
            }
            other => AppError::InternalError(anyhow::Error::new(other)),
        }
    }
}

/// Shared handle used by the `/generate` handler.
#[derive(Clone)]
pub struct GenerationService {
    generator: Arc<dyn TextGenerator>,
    params: GenerationParams,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl GenerationService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        params: GenerationParams,
        timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            generator,
            params,
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &GenerationConfig) -> Self {
        let params = GenerationParams {
            max_length: config.sampling.max_length,
            num_return_sequences: config.sampling.num_return_sequences,
            top_k: config.sampling.top_k,
            temperature: config.sampling.temperature,
            seed: config.sampling.seed,
        };
        Self::new(
            generator,
            params,
            config.runtime.timeout(),
            config.runtime.max_concurrency,
        )
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub async fn health_check(&self) -> Result<(), GeneratorError> {
        self.generator.health_check().await
    }

    /// Generate text for `processed_data` and return the first candidate.
    ///
    /// The timeout covers waiting for a permit as well as the model call.
    pub async fn generate(&self, processed_data: &str) -> Result<String, GenerationError> {
        let start = Instant::now();
        let result = self.generate_by(processed_data, start + self.timeout).await;
        let elapsed = start.elapsed().as_secs_f64();

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        counter!("generation_requests_total", "outcome" => outcome).increment(1);
        histogram!("generation_duration_seconds", "outcome" => outcome).record(elapsed);

        match &result {
            Ok(_) => tracing::info!(
                model = %self.model_name(),
                elapsed_secs = elapsed,
                "Generation complete"
            ),
            Err(e) => tracing::warn!(
                model = %self.model_name(),
                elapsed_secs = elapsed,
                error = %e,
                "Generation failed"
            ),
        }

        result
    }

    async fn generate_by(
        &self,
        processed_data: &str,
        deadline: Instant,
    ) -> Result<String, GenerationError> {
        let permit = timeout_at(deadline, Arc::clone(&self.permits).acquire_owned())
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))?
            .map_err(|_| GenerationError::Closed)?;

        // The permit moves into the task, so a request that times out still
        // holds its slot until the model call returns.
        let generator = Arc::clone(&self.generator);
        let params = self.params.clone();
        let prompt = processed_data.to_string();
        let model_call = tokio::spawn(async move {
            let result = generator.generate(&prompt, &params).await;
            drop(permit);
            result
        });

        let candidates = timeout_at(deadline, model_call)
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))?
            .map_err(|e| {
                GeneratorError::Inference(format!("generation task failed: {}", e))
            })??;

        let first = candidates
            .into_iter()
            .next()
            .ok_or(GenerationError::NoCandidates)?;

        histogram!("generation_output_tokens").record(first.token_count as f64);
        Ok(first.text)
    }
}
