//! Phase 3 — 라이브 경로 처리량과 지표 대조
//!
//! 증가하는 크기의 배치를 라이브 캐시/어댑터 경로에 직렬로 보내
//! 처리량과 항목당 지연을 측정합니다. 배치 크기를 직렬화해야
//! 유효한 스케일링 곡선이 나오므로 동시 실행하지 않습니다.
//!
//! 이어서 고정 혼합 비율 배치 하나를 전체 알림 빌더 경로로 보내
//! 혼동 행렬 지표를 오프라인(Phase 1 방식) 지표와 허용 오차 내로
//! 대조합니다.

use std::time::Instant;

use metrics::histogram;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use flowsentry_alert_stream::builder::AlertBuilder;
use flowsentry_alert_stream::cache::PredictionCache;
use flowsentry_classifier::{ClassifierAdapter, HoldoutSet};
use flowsentry_core::error::{CacheError, EvalError};
use flowsentry_core::metrics as m;

use crate::dataset::require_rows;
use crate::scoring::ConfusionMatrix;

/// 대조 배치의 최소 행 수
const MIN_RECONCILE_ROWS: usize = 50;

/// 배치 하나의 측정 결과
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BatchTiming {
    /// 배치 크기
    pub batch_size: usize,
    /// 소요 시간 (밀리초)
    pub elapsed_ms: f64,
    /// 초당 처리량
    pub throughput_per_sec: f64,
    /// 항목당 평균 지연 (밀리초)
    pub avg_latency_ms: f64,
    /// 캐시 소진으로 실패한 pop 수
    pub cache_empty: u64,
}

/// 라이브 캐시 경로에 배치 크기를 늘려가며 처리량을 측정합니다.
///
/// 라이브 대상에 모델이 없으면 [`EvalError::Connection`]으로
/// 실패합니다 (단계 수준 실패, 다른 단계는 영향 없음).
pub async fn measure_throughput(
    cache: &PredictionCache,
    model_id: &str,
    batch_sizes: &[usize],
    cancel: &CancellationToken,
) -> Result<Vec<BatchTiming>, EvalError> {
    // 라이브 대상 도달 가능성 확인
    if cache.queue_len(model_id).is_none() {
        return Err(EvalError::Connection {
            target: model_id.to_owned(),
            reason: "model not provisioned in live cache".to_owned(),
        });
    }

    let mut timings = Vec::with_capacity(batch_sizes.len());

    // 배치 크기는 직렬로 — 유효한 스케일링 곡선을 위해
    for &batch_size in batch_sizes {
        if cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        let mut cache_empty = 0u64;
        let started = Instant::now();
        for _ in 0..batch_size {
            match cache.pop(model_id) {
                Ok(_) => {}
                Err(CacheError::Empty { .. }) => cache_empty += 1,
                Err(CacheError::UnknownModel { .. }) => {
                    return Err(EvalError::Connection {
                        target: model_id.to_owned(),
                        reason: "model disappeared from live cache".to_owned(),
                    });
                }
            }
        }
        let elapsed = started.elapsed();
        histogram!(m::EVAL_BATCH_DURATION_SECONDS).record(elapsed.as_secs_f64());

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        timings.push(BatchTiming {
            batch_size,
            elapsed_ms,
            throughput_per_sec: if elapsed.as_secs_f64() > 0.0 {
                batch_size as f64 / elapsed.as_secs_f64()
            } else {
                f64::INFINITY
            },
            avg_latency_ms: elapsed_ms / batch_size.max(1) as f64,
            cache_empty,
        });

        tracing::debug!(model_id, batch_size, elapsed_ms, "throughput batch measured");

        // 다음 배치 전에 리필러에게 양보
        tokio::task::yield_now().await;
    }

    Ok(timings)
}

/// 지표 대조 결과
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReconcileReport {
    /// 대조 배치 행 수
    pub rows: usize,
    /// 전체 빌더 경로 혼동 행렬
    pub live: ConfusionMatrix,
    /// 오프라인(어댑터 직접) 혼동 행렬
    pub offline: ConfusionMatrix,
    /// |live recall − offline recall|
    pub recall_delta: f64,
    /// |live precision − offline precision|
    pub precision_delta: f64,
    /// 허용 오차 내 여부
    pub within_tolerance: bool,
}

/// 고정 혼합 비율 배치를 전체 알림 빌더 경로로 보내 대조합니다.
///
/// 라이브 판정은 "경보 수준 알림이 발행되었는가", 오프라인 판정은
/// 어댑터 레이블 그대로입니다. 두 경로의 recall/precision 차이가
/// 허용 오차를 넘으면 `within_tolerance = false`로 보고합니다.
pub fn reconcile(
    adapter: &dyn ClassifierAdapter,
    builder: &AlertBuilder,
    holdout: &HoldoutSet,
    attack_ratio: f64,
    tolerance: f64,
    cancel: &CancellationToken,
) -> Result<ReconcileReport, EvalError> {
    let attacks = holdout.attack_rows(Some(adapter.attack_type()));
    let benign = holdout.benign_rows();

    // 혼합 비율을 유지할 수 있는 최대 배치 크기 (상한 500)
    let max_by_attack = (attacks.len() as f64 / attack_ratio).floor() as usize;
    let max_by_benign = (benign.len() as f64 / (1.0 - attack_ratio)).floor() as usize;
    let total = max_by_attack.min(max_by_benign).min(500);
    if total < MIN_RECONCILE_ROWS {
        return Err(EvalError::InsufficientData {
            scenario: "reconcile".to_owned(),
            label: "mixed".to_owned(),
            needed: MIN_RECONCILE_ROWS,
            available: total,
        });
    }
    let attack_count = ((total as f64) * attack_ratio).round() as usize;
    let benign_count = total - attack_count;

    let attacks = require_rows(attacks, attack_count.max(1), "reconcile", "attack")?;
    let benign = require_rows(benign, benign_count.max(1), "reconcile", "benign")?;

    let mut live = ConfusionMatrix::default();
    let mut offline = ConfusionMatrix::default();

    let rows = attacks[..attack_count]
        .iter()
        .chain(benign[..benign_count].iter());
    for (idx, row) in rows.enumerate() {
        if idx % 256 == 0 && cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        let Ok(detection) = adapter.predict(&row.features) else {
            // 분류 불가 행은 양쪽 모두에서 제외 (드롭-카운트 정책)
            continue;
        };

        // 오프라인: 어댑터 레이블
        tally(&mut offline, row.is_attack(), detection.is_attack());

        // 라이브: 전체 빌더 경로 — 경보 수준 알림 발행 여부
        let alert = builder.build(&detection, row.flow);
        let live_positive = alert.is_some_and(|a| a.severity.is_alerting());
        tally(&mut live, row.is_attack(), live_positive);
    }

    let recall_delta = (live.recall() - offline.recall()).abs();
    let precision_delta = (live.precision() - offline.precision()).abs();

    Ok(ReconcileReport {
        rows: (attack_count + benign_count),
        live,
        offline,
        recall_delta,
        precision_delta,
        within_tolerance: recall_delta <= tolerance && precision_delta <= tolerance,
    })
}

fn tally(matrix: &mut ConfusionMatrix, truth_attack: bool, predicted_attack: bool) {
    match (truth_attack, predicted_attack) {
        (true, true) => matrix.tp += 1,
        (false, true) => matrix.fp += 1,
        (false, false) => matrix.tn += 1,
        (true, false) => matrix.fn_ += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use flowsentry_alert_stream::cache::ReplenishRequest;
    use flowsentry_classifier::{AdapterRegistry, RotatingFeatureSource};
    use flowsentry_core::config::{AlertConfig, CacheConfig};
    use tokio::sync::mpsc;

    fn live_cache(holdout: &HoldoutSet) -> (Arc<PredictionCache>, mpsc::Receiver<ReplenishRequest>) {
        let registry = Arc::new(AdapterRegistry::with_builtin_models());
        let source = RotatingFeatureSource::new(holdout);
        let (tx, rx) = mpsc::channel(64);
        let config = CacheConfig {
            capacity: 100,
            refill_threshold: 10,
            ..CacheConfig::default()
        };
        let cache = Arc::new(PredictionCache::new(&config, registry, source, tx));
        cache.prefill();
        (cache, rx)
    }

    #[tokio::test]
    async fn throughput_covers_all_batch_sizes_in_order() {
        let holdout = HoldoutSet::synthetic(200, 40, 21);
        let (cache, _rx) = live_cache(&holdout);
        let cancel = CancellationToken::new();

        let timings = measure_throughput(&cache, "syn-flood", &[10, 50, 100], &cancel)
            .await
            .unwrap();

        assert_eq!(timings.len(), 3);
        assert_eq!(timings[0].batch_size, 10);
        assert_eq!(timings[2].batch_size, 100);
        for timing in &timings {
            assert!(timing.throughput_per_sec > 0.0);
            assert!(timing.avg_latency_ms >= 0.0);
        }
    }

    #[tokio::test]
    async fn unknown_model_is_a_connection_failure() {
        let holdout = HoldoutSet::synthetic(50, 10, 21);
        let (cache, _rx) = live_cache(&holdout);
        let cancel = CancellationToken::new();

        let result = measure_throughput(&cache, "no-such-model", &[10], &cancel).await;
        assert!(matches!(result, Err(EvalError::Connection { .. })));
    }

    #[tokio::test]
    async fn cancelled_run_aborts() {
        let holdout = HoldoutSet::synthetic(50, 10, 21);
        let (cache, _rx) = live_cache(&holdout);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = measure_throughput(&cache, "syn-flood", &[10], &cancel).await;
        assert!(matches!(result, Err(EvalError::Cancelled)));
    }

    #[test]
    fn reconcile_live_path_matches_offline_within_tolerance() {
        let registry = AdapterRegistry::with_builtin_models();
        let adapter = registry.require("syn-flood").unwrap();
        let builder = AlertBuilder::from_config(&AlertConfig::default());
        let holdout = HoldoutSet::synthetic(400, 100, 31);
        let cancel = CancellationToken::new();

        let report = reconcile(adapter.as_ref(), &builder, &holdout, 0.3, 0.1, &cancel).unwrap();

        // 빌더 경로는 어댑터 레이블을 왜곡하지 않아야 함
        assert!(report.within_tolerance, "deltas: recall={} precision={}", report.recall_delta, report.precision_delta);
        assert_eq!(report.live.total(), report.offline.total());
    }

    #[test]
    fn reconcile_insufficient_attacks_reports_insufficient_data() {
        let registry = AdapterRegistry::with_builtin_models();
        let adapter = registry.require("syn-flood").unwrap();
        let builder = AlertBuilder::from_config(&AlertConfig::default());
        // syn-flood 공격 행 없음
        let holdout = HoldoutSet::synthetic(100, 0, 31);
        let cancel = CancellationToken::new();

        let result = reconcile(adapter.as_ref(), &builder, &holdout, 0.3, 0.1, &cancel);
        assert!(matches!(result, Err(EvalError::InsufficientData { .. })));
    }
}
