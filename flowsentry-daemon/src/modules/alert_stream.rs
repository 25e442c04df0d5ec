//! Alert stream module initialization.
//!
//! Converts `FlowsentryConfig` into a `StreamConfig`, builds the
//! `AlertStreamPipeline`, and wraps it in a `ModuleHandle`. Handles to
//! the pipeline's injected state objects (cache, builder, overview,
//! publisher) are returned separately so the orchestrator can serve
//! the evaluation harness and health reporting.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use flowsentry_alert_stream::{
    AlertBuilder, AlertPublisher, AlertStreamPipelineBuilder, OverviewAggregator, StreamConfig,
    cache::PredictionCache,
};
use flowsentry_classifier::{AdapterRegistry, RotatingFeatureSource};
use flowsentry_core::config::FlowsentryConfig;

use super::ModuleHandle;

/// Handles to the alert stream's injected state objects.
pub struct StreamHandles {
    /// Prediction cache (live target for evaluation Phase 3).
    pub cache: Arc<PredictionCache>,
    /// Alert builder (full-path reconcile target).
    pub builder: Arc<AlertBuilder>,
    /// Overview aggregator (TTL-cached statistics).
    pub overview: Arc<OverviewAggregator>,
    /// Alert publisher (fan-out to subscribers).
    pub publisher: AlertPublisher,
}

/// Initialize the alert stream module.
///
/// # Arguments
///
/// * `config` - The full flowsentry configuration
/// * `registry` - Classifier adapter registry
/// * `source` - Rotating held-out feature source
/// * `cancel` - Daemon-wide cancellation token
pub fn init(
    config: &FlowsentryConfig,
    registry: Arc<AdapterRegistry>,
    source: RotatingFeatureSource,
    cancel: CancellationToken,
) -> Result<(ModuleHandle, StreamHandles)> {
    tracing::info!("initializing alert stream pipeline");

    let stream_config = StreamConfig::from_core(config);

    let pipeline = AlertStreamPipelineBuilder::new()
        .config(stream_config)
        .registry(registry)
        .source(source)
        .cancellation_token(cancel)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build alert stream pipeline: {}", e))?;

    let handles = StreamHandles {
        cache: pipeline.cache(),
        builder: pipeline.alert_builder(),
        overview: pipeline.overview(),
        publisher: pipeline.publisher(),
    };

    let handle = ModuleHandle::new("alert-stream", true, Box::new(pipeline));

    Ok((handle, handles))
}
