//! Cross-service workflow integration tests library.
//!
//! Provides an HTTP client for the two-stage text pipeline: raw text goes to
//! preprocess-service, and its `processed_data` goes to generation-service.
//!
//! ## Usage
//!
//! ```bash
//! # Against services started elsewhere
//! PREPROCESS_URL=http://localhost:5001 GENERATION_URL=http://localhost:8080 \
//!     cargo test -p workflow-tests -- --ignored
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Once;
use std::time::Duration;
use thiserror::Error;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,workflow_tests=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Service base URLs from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub preprocess: String,
    pub generation: String,
}

impl ServiceEndpoints {
    /// Load endpoints from environment variables or use defaults.
    pub fn from_env() -> Self {
        Self {
            preprocess: std::env::var("PREPROCESS_URL")
                .unwrap_or_else(|_| "http://localhost:5001".to_string()),
            generation: std::env::var("GENERATION_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
        }
    }

    /// Endpoints for services listening on loopback ports.
    pub fn local(preprocess_port: u16, generation_port: u16) -> Self {
        Self {
            preprocess: format!("http://127.0.0.1:{}", preprocess_port),
            generation: format!("http://127.0.0.1:{}", generation_port),
        }
    }

    pub fn health_urls(&self) -> Vec<(&'static str, String)> {
        vec![
            ("preprocess", format!("{}/health", self.preprocess)),
            ("generation", format!("{}/health", self.generation)),
        ]
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
}

#[derive(Serialize)]
struct PreprocessRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct PreprocessResponse {
    processed_data: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    processed_data: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    generated_text: String,
}

/// Result of running text through both services.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub processed_data: String,
    pub generated_text: String,
}

/// HTTP client chaining preprocess-service into generation-service.
#[derive(Debug, Clone)]
pub struct PipelineClient {
    client: reqwest::Client,
    endpoints: ServiceEndpoints,
}

impl PipelineClient {
    pub fn new(endpoints: ServiceEndpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    pub async fn preprocess(&self, text: &str) -> Result<String, PipelineError> {
        let url = format!("{}/preprocess", self.endpoints.preprocess);
        let body: PreprocessResponse = self
            .post_json("preprocess", &url, &PreprocessRequest { text })
            .await?;
        Ok(body.processed_data)
    }

    pub async fn generate(&self, processed_data: &str) -> Result<String, PipelineError> {
        let url = format!("{}/generate", self.endpoints.generation);
        let body: GenerateResponse = self
            .post_json("generation", &url, &GenerateRequest { processed_data })
            .await?;
        Ok(body.generated_text)
    }

    /// Preprocess `text`, then generate from the result.
    pub async fn run(&self, text: &str) -> Result<PipelineOutput, PipelineError> {
        let processed_data = self.preprocess(text).await?;
        tracing::debug!(%processed_data, "Preprocessed input");

        let generated_text = self.generate(&processed_data).await?;
        tracing::debug!(%generated_text, "Generated output");

        Ok(PipelineOutput {
            processed_data,
            generated_text,
        })
    }

    async fn post_json<B, R>(
        &self,
        service: &'static str,
        url: &str,
        body: &B,
    ) -> Result<R, PipelineError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let transport = |source| PipelineError::Transport { service, source };

        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Status {
                service,
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(transport)
    }
}

/// Wait for both services to be healthy.
///
/// Polls health endpoints until all services respond with 200 OK.
/// Times out after the specified duration.
pub async fn wait_for_services(
    endpoints: &ServiceEndpoints,
    timeout: Duration,
) -> anyhow::Result<()> {
    let health_urls = endpoints.health_urls();
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    tracing::info!("Waiting for {} services to be healthy...", health_urls.len());

    loop {
        let mut unhealthy_services = Vec::new();

        for (name, url) in &health_urls {
            match client.get(url).timeout(Duration::from_secs(2)).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    unhealthy_services.push(format!("{} (status: {})", name, resp.status()));
                }
                Err(e) => {
                    unhealthy_services.push(format!("{} (error: {})", name, e));
                }
            }
        }

        if unhealthy_services.is_empty() {
            tracing::info!("All services are healthy");
            return Ok(());
        }

        if start.elapsed() > timeout {
            anyhow::bail!(
                "Timeout waiting for services. Unhealthy: {}",
                unhealthy_services.join(", ")
            );
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
