//! Mock generator for tests and offline runs.

use super::{GeneratedSequence, GenerationParams, GeneratorError, TextGenerator};
use async_trait::async_trait;
use std::time::Duration;

const CONTINUATION: &[&str] = &["and", "then", "the", "story", "went", "on"];

/// Echoes the prompt and appends a fixed continuation.
///
/// "Tokens" are whitespace-separated words, and the output never exceeds
/// `max_length` of them (the prompt is never truncated).
pub struct MockGenerator {
    enabled: bool,
    delay: Duration,
}

impl MockGenerator {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            delay: Duration::ZERO,
        }
    }

    /// Simulate a slow model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<GeneratedSequence>, GeneratorError> {
        if !self.enabled {
            return Err(GeneratorError::Inference(
                "Mock generator not enabled".to_string(),
            ));
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let prompt_tokens = prompt.split_whitespace().count();
        let budget = params.max_length.saturating_sub(prompt_tokens);
        let continuation: Vec<&str> = CONTINUATION.iter().copied().take(budget).collect();

        let text = match (prompt.is_empty(), continuation.is_empty()) {
            (_, true) => prompt.to_string(),
            (true, false) => continuation.join(" "),
            (false, false) => format!("{} {}", prompt, continuation.join(" ")),
        };

        let sequence = GeneratedSequence {
            text,
            token_count: prompt_tokens + continuation.len(),
        };

        Ok(vec![sequence; params.num_return_sequences])
    }

    async fn health_check(&self) -> Result<(), GeneratorError> {
        if self.enabled {
            Ok(())
        } else {
            Err(GeneratorError::Unavailable(
                "Mock generator not enabled".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_prompt_with_continuation() {
        let generator = MockGenerator::new(true);
        let out = generator
            .generate("hello world", &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(out.len(), 1);
        assert!(out[0].text.starts_with("hello world "));
        assert!(out[0].token_count <= 50);
    }

    #[tokio::test]
    async fn stays_within_max_length() {
        let generator = MockGenerator::new(true);
        let params = GenerationParams {
            max_length: 3,
            ..GenerationParams::default()
        };
        let out = generator.generate("one two", &params).await.unwrap();

        assert_eq!(out[0].text, "one two and");
        assert_eq!(out[0].token_count, 3);
    }

    #[tokio::test]
    async fn disabled_generator_fails() {
        let generator = MockGenerator::new(false);
        assert!(generator
            .generate("hi", &GenerationParams::default())
            .await
            .is_err());
        assert!(generator.health_check().await.is_err());
    }
}
