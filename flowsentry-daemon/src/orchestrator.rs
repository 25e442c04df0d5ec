//! Module orchestration -- assembly, wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `flowsentry-daemon`.
//! It loads configuration, builds the classifier registry and held-out
//! source, wires the modules, manages startup/shutdown ordering, and
//! runs the main event loop.
//!
//! # Startup Order (producers before consumers)
//!
//! 1. Alert Stream (pops predictions, publishes alerts)
//! 2. Analytics Refresher (consumes published alerts)
//!
//! # Shutdown Order (reverse)
//!
//! 1. Analytics Refresher
//! 2. Alert Stream (cancels replenisher, drains tasks)

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use flowsentry_classifier::{AdapterRegistry, HoldoutSet, RotatingFeatureSource};
use flowsentry_core::config::FlowsentryConfig;
use flowsentry_evaluation::harness::{EvalHarness, LiveTarget};
use flowsentry_evaluation::EvaluationReport;

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::metrics_server;
use crate::modules::alert_stream::StreamHandles;
use crate::modules::analytics::AnalyticsHandle;
use crate::modules::{ModuleRegistry, alert_stream, analytics};

/// Fallback synthetic holdout sizing for development environments
/// without a provisioned holdout file.
const SYNTHETIC_BENIGN_ROWS: usize = 2000;
const SYNTHETIC_ATTACK_ROWS_PER_FAMILY: usize = 200;
const SYNTHETIC_SEED: u64 = 1;

/// The main daemon orchestrator.
///
/// Manages the complete lifecycle of all flowsentry modules:
/// configuration loading, wiring, ordered startup, health monitoring,
/// and graceful shutdown.
pub struct Orchestrator {
    config: FlowsentryConfig,
    modules: ModuleRegistry,
    registry: Arc<AdapterRegistry>,
    holdout: HoldoutSet,
    stream: StreamHandles,
    analytics: AnalyticsHandle,
    cancel: CancellationToken,
    start_time: Instant,
}

impl Orchestrator {
    /// Build from an already-loaded configuration.
    ///
    /// Performs the following steps:
    /// 1. Validate the configuration
    /// 2. Install the metrics recorder (if enabled)
    /// 3. Build the adapter registry (model dir, or builtin pack)
    /// 4. Load the held-out set (file, or synthetic fallback)
    /// 5. Initialize modules in dependency order
    pub async fn build_from_config(config: FlowsentryConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before module initialization
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        // Adapter registry: model dir if present, builtin pack otherwise
        let mut loaded_registry = AdapterRegistry::new();
        let registry = match loaded_registry.load_dir(&config.classifier.model_dir).await {
            Ok(loaded) if loaded > 0 => {
                tracing::info!(models = loaded, "model specs loaded");
                Arc::new(loaded_registry)
            }
            Ok(_) => {
                tracing::warn!(
                    model_dir = %config.classifier.model_dir,
                    "model directory has no usable specs, using builtin model pack"
                );
                Arc::new(AdapterRegistry::with_builtin_models())
            }
            Err(e) => {
                tracing::warn!(
                    model_dir = %config.classifier.model_dir,
                    error = %e,
                    "model directory unavailable, using builtin model pack"
                );
                Arc::new(AdapterRegistry::with_builtin_models())
            }
        };

        // Held-out set: file if present, deterministic synthetic fallback
        let holdout = match HoldoutSet::load_jsonl(&config.classifier.holdout_path).await {
            Ok(set) if !set.is_empty() => set,
            _ => {
                tracing::warn!(
                    holdout_path = %config.classifier.holdout_path,
                    "holdout set unavailable, using synthetic fallback"
                );
                HoldoutSet::synthetic(
                    SYNTHETIC_BENIGN_ROWS,
                    SYNTHETIC_ATTACK_ROWS_PER_FAMILY,
                    SYNTHETIC_SEED,
                )
            }
        };
        let source = RotatingFeatureSource::new(&holdout);

        let cancel = CancellationToken::new();
        let mut modules = ModuleRegistry::new();

        // Alert stream (producer)
        let (stream_module, stream) = alert_stream::init(
            &config,
            Arc::clone(&registry),
            source,
            cancel.child_token(),
        )?;
        modules.register(stream_module);

        // Analytics refresher (consumer)
        let (analytics_module, analytics) =
            analytics::init(&config, stream.publisher.clone(), cancel.child_token())?;
        modules.register(analytics_module);

        tracing::info!(total_modules = modules.count(), "orchestrator initialized");
        if config.metrics.enabled {
            metrics::gauge!(flowsentry_core::metrics::DAEMON_MODULES)
                .set(modules.count() as f64);
        }

        Ok(Self {
            config,
            modules,
            registry,
            holdout,
            stream,
            analytics,
            cancel,
            start_time: Instant::now(),
        })
    }

    /// Start all enabled modules and enter the main event loop.
    ///
    /// Blocks until a shutdown signal is received (SIGINT or SIGTERM).
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("starting all modules");
        if let Err(e) = self.modules.start_all().await {
            tracing::warn!("startup failed, rolling back already-started modules");
            if let Err(stop_err) = self.modules.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            return Err(e);
        }

        tracing::info!("flowsentry-daemon running, modules active");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal, "shutdown signal received");

        self.shutdown().await
    }

    /// Start all modules without entering the signal loop.
    ///
    /// Used by one-shot runs (`--eval`) that need the live cache
    /// prefilled and the stream active, then shut down explicitly.
    pub async fn start_modules(&mut self) -> Result<()> {
        self.modules.start_all().await
    }

    /// Perform graceful shutdown of all modules.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("broadcasting cancellation to all tasks");
        self.cancel.cancel();

        tracing::info!("stopping all modules");
        self.modules.stop_all().await
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let statuses = self.modules.health_statuses().await;
        let modules: Vec<ModuleHealth> = statuses
            .into_iter()
            .map(|(name, enabled, status)| ModuleHealth {
                name,
                enabled,
                status,
            })
            .collect();

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
        }
    }

    /// Current windowed analytics summary.
    pub fn analytics_summary(&self) -> flowsentry_analytics::AnalyticsSummary {
        self.analytics.summary()
    }

    /// Registered model ids.
    pub fn model_ids(&self) -> Vec<String> {
        self.registry.model_ids()
    }

    /// Run the three-phase evaluation harness against the live stream.
    ///
    /// Phases 1/2 bypass the cache and drive the adapter directly;
    /// Phase 3 targets the running cache/builder path.
    pub async fn evaluate(&self, model_id: &str) -> EvaluationReport {
        let mut harness = EvalHarness::new(
            Arc::clone(&self.registry),
            self.holdout.clone(),
            self.config.evaluation.clone(),
        )
        .with_cancellation(self.cancel.child_token());

        harness
            .run_all(
                model_id,
                Some(LiveTarget {
                    cache: &self.stream.cache,
                    builder: &self.stream.builder,
                }),
            )
            .await
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
///
/// Returns the name of the received signal.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(|e| anyhow::anyhow!("failed to listen for ctrl-c: {}", e))?;
                Ok("SIGINT")
            }
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| anyhow::anyhow!("failed to listen for ctrl-c: {}", e))?;
        Ok("SIGINT")
    }
}
