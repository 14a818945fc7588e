//! Common test utilities for pipeline integration tests.

#![allow(dead_code)]

use generation_service::config::GenerationConfig;
use generation_service::services::providers::mock::MockGenerator;
use preprocess_service::config::PreprocessConfig;
use std::sync::Arc;
use std::time::Duration;
use workflow_tests::{init_tracing, wait_for_services, PipelineClient, ServiceEndpoints};

/// Default timeout for waiting on services.
pub const SERVICE_TIMEOUT: Duration = Duration::from_secs(60);

/// Spawn both services in-process on ephemeral ports, generation backed by
/// the mock generator.
pub async fn spawn_pipeline() -> PipelineClient {
    init_tracing();

    let preprocess = preprocess_service::Application::build(PreprocessConfig::ephemeral())
        .await
        .expect("Failed to build preprocess-service");
    let generation = generation_service::Application::build_with_generator(
        GenerationConfig::for_tests(),
        Arc::new(MockGenerator::new(true)),
    )
    .await
    .expect("Failed to build generation-service");

    let endpoints = ServiceEndpoints::local(preprocess.port(), generation.port());

    tokio::spawn(async move {
        let _ = preprocess.run_until_stopped().await;
    });
    tokio::spawn(async move {
        let _ = generation.run_until_stopped().await;
    });

    PipelineClient::new(endpoints)
}

/// Client for services started outside the test, ensuring they are healthy.
pub async fn connect_external() -> PipelineClient {
    init_tracing();

    let endpoints = ServiceEndpoints::from_env();
    wait_for_services(&endpoints, SERVICE_TIMEOUT)
        .await
        .expect("Services not healthy; start both services first");

    PipelineClient::new(endpoints)
}
