//! Smoke test against externally started services.

mod common;

/// Requires both services running at PREPROCESS_URL and GENERATION_URL.
#[tokio::test]
#[ignore = "requires running services"]
async fn external_pipeline_generates_text() {
    let client = common::connect_external().await;

    let output = client.run("HELLO WORLD").await.expect("pipeline run");

    assert_eq!(output.processed_data, "hello world");
    assert!(output.generated_text.starts_with("hello world"));
}
