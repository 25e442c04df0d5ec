//! 백그라운드 리필러 — 예측 캐시 비동기 재충전
//!
//! [`Replenisher`]는 리필 요청 채널을 소비하며 모델별 리필을
//! 독립 태스크로 실행합니다. 단일 비행 보장은 캐시 슬롯의 CAS
//! 플래그가 담당하므로, 여기서는 요청 하나당 태스크 하나를 띄웁니다
//! (서로 다른 모델의 리필은 동시에 진행될 수 있습니다).
//!
//! # 실패 정책
//! 배치 생성이 실패하면 지수 백오프로 재시도하고, 재시도 한도를
//! 넘으면 해당 모델을 동기 폴백 전용 모드로 강등합니다 (치명적 아님).
//!
//! # 취소
//! [`CancellationToken`]이 취소되면 진행 중인 리필은 커밋 없이
//! 종료됩니다. 커밋은 배치 완성 후 한 번의 잠금으로 수행되므로
//! 부분 상태가 보이지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use flowsentry_core::config::CacheConfig;
use flowsentry_core::metrics as m;

use crate::cache::{PredictionCache, ReplenishRequest};

/// 백그라운드 리필러
pub struct Replenisher {
    cache: Arc<PredictionCache>,
    batch_size: usize,
    max_retries: u32,
    backoff: Duration,
    cancel: CancellationToken,
}

impl Replenisher {
    /// 새 리필러를 생성합니다.
    pub fn new(cache: Arc<PredictionCache>, config: &CacheConfig, cancel: CancellationToken) -> Self {
        Self {
            cache,
            batch_size: config.replenish_batch,
            max_retries: config.replenish_max_retries,
            backoff: Duration::from_millis(config.replenish_backoff_ms),
            cancel,
        }
    }

    /// 요청 루프를 백그라운드 태스크로 시작합니다.
    pub fn spawn(self, mut rx: mpsc::Receiver<ReplenishRequest>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        tracing::debug!("replenisher cancelled");
                        break;
                    }
                    request = rx.recv() => {
                        let Some(request) = request else {
                            tracing::debug!("replenish channel closed");
                            break;
                        };
                        self.spawn_replenish(request);
                    }
                }
            }
        })
    }

    /// 모델 하나의 리필 태스크를 띄웁니다.
    fn spawn_replenish(&self, request: ReplenishRequest) {
        let cache = Arc::clone(&self.cache);
        let cancel = self.cancel.clone();
        let batch_size = self.batch_size;
        let max_retries = self.max_retries;
        let backoff = self.backoff;

        tokio::spawn(async move {
            replenish_model(&cache, &request.model_id, batch_size, max_retries, backoff, cancel)
                .await;
        });
    }
}

/// 모델 하나를 리필합니다.
///
/// 성공/실패와 무관하게 종료 시 단일 비행 플래그를 해제합니다.
async fn replenish_model(
    cache: &PredictionCache,
    model_id: &str,
    batch_size: usize,
    max_retries: u32,
    backoff: Duration,
    cancel: CancellationToken,
) {
    let Some(slot) = cache.slot(model_id) else {
        tracing::warn!(model_id, "replenish requested for unknown model");
        return;
    };

    let started = std::time::Instant::now();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            // 부분 결과 폐기 — 커밋 전이므로 캐시는 변하지 않음
            slot.clear_in_flight();
            tracing::debug!(model_id, "replenish cancelled before commit");
            return;
        }

        let batch = cache.predict_batch(model_id, batch_size);
        if !batch.is_empty() {
            let committed = slot.commit_batch(batch, cache.capacity());
            slot.clear_in_flight();
            counter!(m::CACHE_REPLENISH_TOTAL,
                m::LABEL_MODEL => model_id.to_owned(),
                m::LABEL_RESULT => "success")
            .increment(1);
            histogram!(m::CACHE_REPLENISH_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());
            tracing::debug!(model_id, committed, attempt, "replenish committed");
            return;
        }

        attempt += 1;
        if attempt > max_retries {
            // 지속 실패: 동기 폴백 전용 모드로 강등하고 운영 경고
            slot.mark_degraded();
            slot.clear_in_flight();
            counter!(m::CACHE_REPLENISH_TOTAL,
                m::LABEL_MODEL => model_id.to_owned(),
                m::LABEL_RESULT => "failure")
            .increment(1);
            tracing::warn!(
                model_id,
                attempts = attempt,
                "replenish failed repeatedly, model degraded to sync-fallback mode"
            );
            return;
        }

        // 지수 백오프 후 재시도 (취소 신호에 반응)
        let delay = backoff * 2u32.saturating_pow(attempt - 1);
        tokio::select! {
            _ = cancel.cancelled() => {
                slot.clear_in_flight();
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsentry_classifier::{AdapterRegistry, HoldoutSet, RotatingFeatureSource};

    fn build_cache(
        holdout: HoldoutSet,
        capacity: usize,
        refill_threshold: usize,
    ) -> (Arc<PredictionCache>, mpsc::Receiver<ReplenishRequest>, CacheConfig) {
        let registry = Arc::new(AdapterRegistry::with_builtin_models());
        let source = RotatingFeatureSource::new(&holdout);
        let (tx, rx) = mpsc::channel(16);
        let config = CacheConfig {
            capacity,
            refill_threshold,
            replenish_batch: capacity,
            replenish_max_retries: 2,
            replenish_backoff_ms: 10,
            ..CacheConfig::default()
        };
        let cache = Arc::new(PredictionCache::new(&config, registry, source, tx));
        (cache, rx, config)
    }

    #[tokio::test]
    async fn replenisher_refills_drained_model() {
        let (cache, rx, config) = build_cache(HoldoutSet::synthetic(100, 20, 5), 20, 10);
        cache.prefill();

        let cancel = CancellationToken::new();
        let handle = Replenisher::new(Arc::clone(&cache), &config, cancel.clone()).spawn(rx);

        // 임계값 아래로 비움 → 리필 요청 발생
        for _ in 0..15 {
            cache.pop("syn-flood").unwrap();
        }
        assert!(cache.queue_len("syn-flood").unwrap() < 10);

        // 리필러가 커밋할 때까지 대기
        let mut refilled = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if cache.queue_len("syn-flood").unwrap() >= 10 {
                refilled = true;
                break;
            }
        }
        assert!(refilled, "replenisher should refill above threshold");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn persistent_failure_degrades_model() {
        // 빈 보류 소스 → 배치 생성이 항상 실패
        let (cache, rx, config) = build_cache(HoldoutSet::default(), 20, 10);

        let cancel = CancellationToken::new();
        let _handle = Replenisher::new(Arc::clone(&cache), &config, cancel.clone()).spawn(rx);

        // pop은 실패하지만 리필 요청은 만들어짐
        let _ = cache.pop("syn-flood");

        let mut degraded = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !cache.degraded_models().is_empty() {
                degraded = true;
                break;
            }
        }
        assert!(degraded, "model should degrade after retry budget is exhausted");
        assert_eq!(cache.degraded_models(), vec!["syn-flood".to_owned()]);

        cancel.cancel();
    }

    #[tokio::test]
    async fn cancellation_stops_request_loop() {
        let (cache, rx, config) = build_cache(HoldoutSet::synthetic(50, 10, 9), 20, 10);
        let cancel = CancellationToken::new();
        let handle = Replenisher::new(cache, &config, cancel.clone()).spawn(rx);

        cancel.cancel();
        // 취소 후 루프가 종료되어야 함
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("replenisher should exit on cancellation")
            .unwrap();
    }
}
