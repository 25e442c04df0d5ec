//! 스트림 오케스트레이션 — 캐시/빌더/발행자/개요의 전체 흐름을 관리합니다.
//!
//! [`AlertStreamPipeline`]은 core의 [`Pipeline`](flowsentry_core::pipeline::Pipeline)
//! trait을 구현하여 `flowsentry-daemon`에서 다른 모듈과 동일한 생명주기로
//! 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! RotatingFeatureSource -> Replenisher -> PredictionCache
//!                                             | pop() (드라이브 루프, 틱마다)
//!                                             v
//!                                        AlertBuilder
//!                                        |         |
//!                                  AlertPublisher  OverviewAggregator
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use flowsentry_classifier::{AdapterRegistry, RotatingFeatureSource};
use flowsentry_core::error::{CacheError, FlowsentryError, PipelineError};
use flowsentry_core::pipeline::{HealthStatus, Pipeline};

use crate::builder::AlertBuilder;
use crate::cache::PredictionCache;
use crate::config::StreamConfig;
use crate::error::AlertStreamError;
use crate::overview::OverviewAggregator;
use crate::publisher::{AlertPublisher, AlertSubscription};
use crate::replenish::Replenisher;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum StreamState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 알림 스트림 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use flowsentry_alert_stream::{AlertStreamPipeline, AlertStreamPipelineBuilder};
///
/// let mut pipeline = AlertStreamPipelineBuilder::new()
///     .config(config)
///     .registry(registry)
///     .source(source)
///     .build()?;
///
/// pipeline.start().await?;
/// let mut subscription = pipeline.subscribe();
/// ```
pub struct AlertStreamPipeline {
    config: StreamConfig,
    state: StreamState,
    cache: Arc<PredictionCache>,
    builder: Arc<AlertBuilder>,
    publisher: AlertPublisher,
    overview: Arc<OverviewAggregator>,
    /// 리필 요청 수신측 — start()에서 리필러로 이동
    replenish_rx: Option<mpsc::Receiver<crate::cache::ReplenishRequest>>,
    replenisher: Option<Replenisher>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl AlertStreamPipeline {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            StreamState::Initialized => "initialized",
            StreamState::Running => "running",
            StreamState::Stopped => "stopped",
        }
    }

    /// 예측 캐시 핸들
    pub fn cache(&self) -> Arc<PredictionCache> {
        Arc::clone(&self.cache)
    }

    /// 알림 빌더 핸들
    pub fn alert_builder(&self) -> Arc<AlertBuilder> {
        Arc::clone(&self.builder)
    }

    /// 개요 집계기 핸들
    pub fn overview(&self) -> Arc<OverviewAggregator> {
        Arc::clone(&self.overview)
    }

    /// 새 알림 구독을 만듭니다.
    pub fn subscribe(&self) -> AlertSubscription {
        self.publisher.subscribe()
    }

    /// 발행자 핸들
    pub fn publisher(&self) -> AlertPublisher {
        self.publisher.clone()
    }
}

impl Pipeline for AlertStreamPipeline {
    async fn start(&mut self) -> Result<(), FlowsentryError> {
        if self.state == StreamState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!("starting alert stream pipeline");

        // 1. 캐시 프리필 (시작 시 1회, 동기)
        let prefilled = self.cache.prefill();
        tracing::info!(predictions = prefilled, "prediction cache prefilled");

        // 2. 리필러 태스크 스폰
        let replenish_rx = self
            .replenish_rx
            .take()
            .ok_or_else(|| PipelineError::InitFailed("replenish channel consumed".to_owned()))?;
        let replenisher = self
            .replenisher
            .take()
            .ok_or_else(|| PipelineError::InitFailed("replenisher consumed".to_owned()))?;
        self.tasks.push(replenisher.spawn(replenish_rx));

        // 3. 드라이브 루프 스폰: 틱마다 모델별 pop → 빌드 → 발행/기록
        let cache = Arc::clone(&self.cache);
        let builder = Arc::clone(&self.builder);
        let publisher = self.publisher.clone();
        let overview = Arc::clone(&self.overview);
        let cancel = self.cancel.clone();
        let interval_ms = self.config.emit_interval_ms;

        self.tasks.push(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let model_ids = cache.model_ids();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("drive loop cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        for model_id in &model_ids {
                            match cache.pop(model_id) {
                                Ok(prediction) => {
                                    if let Some(alert) =
                                        builder.build(&prediction.detection, prediction.flow)
                                    {
                                        publisher.publish(&alert);
                                        overview.record(&alert);
                                    }
                                }
                                Err(CacheError::Empty { .. }) => {
                                    // 저하 상태 경고는 캐시가 이미 남김 — 다음 틱에 재시도
                                }
                                Err(e) => {
                                    tracing::warn!(model_id = %model_id, error = %e, "pop failed");
                                }
                            }
                        }
                    }
                }
            }
        }));

        self.state = StreamState::Running;
        tracing::info!("alert stream pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), FlowsentryError> {
        if self.state != StreamState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping alert stream pipeline");

        // 1. 취소 신호 전파 (진행 중인 리필은 커밋 없이 종료)
        self.cancel.cancel();

        // 2. 백그라운드 태스크 종료 대기
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await
                && !e.is_cancelled()
            {
                tracing::error!(error = %e, "background task join failed");
            }
        }

        self.state = StreamState::Stopped;
        tracing::info!("alert stream pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            StreamState::Running => {
                let degraded = self.cache.degraded_models();
                if !degraded.is_empty() {
                    return HealthStatus::Degraded(format!(
                        "models in sync-fallback mode: {}",
                        degraded.join(", ")
                    ));
                }

                let published = self.publisher.published_count();
                let dropped = self.publisher.dropped_count();
                if published > 0 && dropped * 10 > published {
                    return HealthStatus::Degraded(format!(
                        "high subscriber drop rate: {dropped}/{published}"
                    ));
                }

                HealthStatus::Healthy
            }
            StreamState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            StreamState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 알림 스트림 파이프라인 빌더
///
/// 파이프라인을 구성하고 내부 채널을 생성합니다.
pub struct AlertStreamPipelineBuilder {
    config: StreamConfig,
    registry: Option<Arc<AdapterRegistry>>,
    source: Option<RotatingFeatureSource>,
    cancel: Option<CancellationToken>,
}

impl AlertStreamPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: StreamConfig::default(),
            registry: None,
            source: None,
            cancel: None,
        }
    }

    /// 스트림 설정을 지정합니다.
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// 어댑터 레지스트리를 지정합니다 (필수).
    pub fn registry(mut self, registry: Arc<AdapterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 보류 특징 소스를 지정합니다 (필수).
    pub fn source(mut self, source: RotatingFeatureSource) -> Self {
        self.source = Some(source);
        self
    }

    /// 외부 취소 토큰을 지정합니다.
    ///
    /// 지정하지 않으면 빌더가 새 토큰을 생성합니다.
    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<AlertStreamPipeline, AlertStreamError> {
        self.config.validate()?;

        let registry = self
            .registry
            .ok_or(AlertStreamError::MissingComponent("registry"))?;
        let source = self
            .source
            .ok_or(AlertStreamError::MissingComponent("source"))?;
        let cancel = self.cancel.unwrap_or_default();

        let (replenish_tx, replenish_rx) =
            mpsc::channel(self.config.replenish_channel_capacity);

        let cache = Arc::new(PredictionCache::new(
            &self.config.cache,
            Arc::clone(&registry),
            source,
            replenish_tx,
        ));
        let replenisher =
            Replenisher::new(Arc::clone(&cache), &self.config.cache, cancel.clone());

        let builder = Arc::new(AlertBuilder::from_config(&self.config.alert));
        let publisher = AlertPublisher::new(self.config.publisher.backlog_capacity);
        let overview = Arc::new(OverviewAggregator::from_config(&self.config.overview));

        Ok(AlertStreamPipeline {
            config: self.config,
            state: StreamState::Initialized,
            cache,
            builder,
            publisher,
            overview,
            replenish_rx: Some(replenish_rx),
            replenisher: Some(replenisher),
            cancel,
            tasks: Vec::new(),
        })
    }
}

impl Default for AlertStreamPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
