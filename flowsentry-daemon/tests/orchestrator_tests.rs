//! Orchestrator lifecycle integration tests.
//!
//! These run against default configuration, which falls back to the
//! builtin model pack and a synthetic holdout set (no /etc paths in
//! the test environment).

use flowsentry_core::config::FlowsentryConfig;
use flowsentry_daemon::orchestrator::Orchestrator;

fn test_config() -> FlowsentryConfig {
    let mut config = FlowsentryConfig::default();
    // keep the test fast: small cache, fast ticks
    config.cache.capacity = 50;
    config.cache.refill_threshold = 10;
    config.analytics.refresh_secs = 1;
    config
}

#[tokio::test]
async fn builds_with_fallback_registry_and_holdout() {
    let orchestrator = Orchestrator::build_from_config(test_config())
        .await
        .expect("orchestrator should build with fallbacks");

    // builtin pack: one model per attack family
    let model_ids = orchestrator.model_ids();
    assert_eq!(model_ids.len(), 5);
    assert!(model_ids.contains(&"syn-flood".to_owned()));
}

#[tokio::test]
async fn health_reflects_module_lifecycle() {
    let mut orchestrator = Orchestrator::build_from_config(test_config())
        .await
        .unwrap();

    // before start: modules report unhealthy
    let health = orchestrator.health().await;
    assert!(health.status.is_unhealthy());
    assert_eq!(health.modules.len(), 2);

    orchestrator.start_modules().await.unwrap();
    let health = orchestrator.health().await;
    assert!(health.status.is_healthy(), "status: {:?}", health.status);

    orchestrator.shutdown().await.unwrap();
    let health = orchestrator.health().await;
    assert!(health.status.is_unhealthy());
}

#[tokio::test]
async fn evaluation_runs_against_live_stream() {
    let mut orchestrator = Orchestrator::build_from_config(test_config())
        .await
        .unwrap();
    orchestrator.start_modules().await.unwrap();

    let report = orchestrator.evaluate("syn-flood").await;
    assert!(report.phase1.is_completed(), "phase1: {}", report.phase1.label());
    assert!(report.phase2.is_completed(), "phase2: {}", report.phase2.label());
    assert!(report.phase3.is_completed(), "phase3: {}", report.phase3.label());

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_config_rejected_at_build() {
    let mut config = test_config();
    config.cache.refill_threshold = config.cache.capacity; // invalid
    let result = Orchestrator::build_from_config(config).await;
    assert!(result.is_err());
}
