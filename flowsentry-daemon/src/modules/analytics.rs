//! Analytics refresher module.
//!
//! Subscribes to the alert publisher and periodically merges the
//! collected alert batch into the time-bucketed analytics engine.
//! The merge itself is a pure synchronous function; this module only
//! provides the refresh loop and lifecycle plumbing around it.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use flowsentry_alert_stream::{AlertPublisher, AlertSubscription};
use flowsentry_analytics::{AnalyticsEngine, AnalyticsParams, AnalyticsSummary};
use flowsentry_core::config::FlowsentryConfig;
use flowsentry_core::error::{FlowsentryError, PipelineError};
use flowsentry_core::pipeline::{HealthStatus, Pipeline};
use flowsentry_core::types::AlertRecord;

use super::ModuleHandle;

/// Shared handle to the analytics engine.
///
/// The orchestrator uses this to answer `analytics()` queries while the
/// refresh loop keeps merging in the background.
#[derive(Clone)]
pub struct AnalyticsHandle {
    engine: Arc<Mutex<AnalyticsEngine>>,
}

impl AnalyticsHandle {
    /// Produce the current windowed summary.
    pub fn summary(&self) -> AnalyticsSummary {
        self.engine.lock().summary(Utc::now())
    }
}

/// Analytics refresher service (implements the core `Pipeline` trait).
pub struct AnalyticsService {
    engine: Arc<Mutex<AnalyticsEngine>>,
    publisher: AlertPublisher,
    refresh_secs: u64,
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
    running: bool,
}

impl AnalyticsService {
    /// Build the service from configuration.
    pub fn new(
        config: &FlowsentryConfig,
        publisher: AlertPublisher,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let params = AnalyticsParams::from_config(&config.analytics);
        let engine = AnalyticsEngine::new(params)
            .map_err(|e| anyhow::anyhow!("failed to build analytics engine: {}", e))?;

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            publisher,
            refresh_secs: config.analytics.refresh_secs,
            cancel,
            task: None,
            running: false,
        })
    }

    /// Shared handle for querying summaries.
    pub fn handle(&self) -> AnalyticsHandle {
        AnalyticsHandle {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl Pipeline for AnalyticsService {
    async fn start(&mut self) -> Result<(), FlowsentryError> {
        if self.running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(refresh_secs = self.refresh_secs, "starting analytics refresher");

        let mut subscription: AlertSubscription = self.publisher.subscribe();
        let engine = Arc::clone(&self.engine);
        let cancel = self.cancel.clone();
        let refresh_secs = self.refresh_secs.max(1);

        self.task = Some(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(refresh_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("analytics refresher cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        // Drain the backlog accumulated since the last tick
                        let mut batch: Vec<AlertRecord> = Vec::new();
                        while let Some(alert) = subscription.try_recv() {
                            batch.push(AlertRecord::from(&alert));
                        }
                        if batch.is_empty() {
                            continue;
                        }
                        let outcome = engine.lock().merge(&batch, Utc::now());
                        tracing::debug!(
                            merged = outcome.merged,
                            duplicates = outcome.duplicates,
                            data_errors = outcome.data_errors,
                            "analytics batch merged"
                        );
                    }
                }
            }
        }));

        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), FlowsentryError> {
        if !self.running {
            return Err(PipelineError::NotRunning.into());
        }

        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && !e.is_cancelled()
        {
            tracing::error!(error = %e, "analytics refresher join failed");
        }

        self.running = false;
        tracing::info!("analytics refresher stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        if self.running {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy("not started".to_owned())
        }
    }
}

/// Initialize the analytics module.
pub fn init(
    config: &FlowsentryConfig,
    publisher: AlertPublisher,
    cancel: CancellationToken,
) -> Result<(ModuleHandle, AnalyticsHandle)> {
    tracing::info!("initializing analytics refresher");

    let service = AnalyticsService::new(config, publisher, cancel)?;
    let handle = service.handle();
    let module = ModuleHandle::new("analytics", true, Box::new(service));

    Ok((module, handle))
}
