//! 결정 임계값 스윕 — 고정 그리드 스윕과 제약 선택
//!
//! 임계값을 그리드 위에서 스윕하며 recall/precision/F1/FP rate를
//! 계산하고, FP rate 상한을 만족하는 것 중 F1 최대 임계값을 선택합니다.
//! 상한을 만족하는 임계값이 없으면 FP rate 최소 임계값으로 폴백하고
//! 보고서에 플래그를 남깁니다.

use serde::Serialize;

use flowsentry_core::config::EvaluationConfig;
use flowsentry_core::error::EvalError;

use crate::dataset::ScoredRow;
use crate::scoring::ConfusionMatrix;

/// 스윕의 한 점
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThresholdPoint {
    /// 결정 임계값
    pub threshold: f64,
    /// recall
    pub recall: f64,
    /// precision
    pub precision: f64,
    /// F1
    pub f1: f64,
    /// FP rate
    pub fp_rate: f64,
}

/// 임계값 선택 결과
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThresholdSelection {
    /// 선택된 임계값
    pub threshold: f64,
    /// 선택 시점의 F1
    pub f1: f64,
    /// 선택 시점의 FP rate
    pub fp_rate: f64,
    /// FP rate 상한을 만족했는지 여부
    pub fp_ceiling_met: bool,
}

/// 설정의 그리드를 구체화합니다 (예: 0.2, 0.3, ..., 0.9).
pub fn grid(config: &EvaluationConfig) -> Result<Vec<f64>, EvalError> {
    if config.threshold_step <= 0.0 {
        return Err(EvalError::InvalidParams {
            reason: "threshold_step must be positive".to_owned(),
        });
    }
    if config.threshold_end < config.threshold_start {
        return Err(EvalError::InvalidParams {
            reason: "threshold_end must be >= threshold_start".to_owned(),
        });
    }

    let mut points = Vec::new();
    let mut value = config.threshold_start;
    // 부동소수 누적 오차를 피하기 위해 인덱스 기반으로 생성
    let mut step_index = 0u32;
    while value <= config.threshold_end + 1e-9 {
        points.push((value * 1e6).round() / 1e6);
        step_index += 1;
        value = config.threshold_start + config.threshold_step * f64::from(step_index);
    }
    Ok(points)
}

/// 그리드 전체를 스윕합니다.
pub fn sweep(scored: &[ScoredRow], grid: &[f64]) -> Vec<ThresholdPoint> {
    grid.iter()
        .map(|&threshold| {
            let matrix = ConfusionMatrix::from_scores(scored, threshold);
            ThresholdPoint {
                threshold,
                recall: matrix.recall(),
                precision: matrix.precision(),
                f1: matrix.f1(),
                fp_rate: matrix.fp_rate(),
            }
        })
        .collect()
}

/// FP rate 상한 제약 아래에서 F1 최대 임계값을 선택합니다.
///
/// 상한을 만족하는 임계값이 없으면 FP rate 최소(동률이면 F1 최대)
/// 임계값으로 폴백하고 `fp_ceiling_met = false`로 표시합니다.
pub fn select_threshold(
    points: &[ThresholdPoint],
    fp_ceiling: f64,
) -> Result<ThresholdSelection, EvalError> {
    if points.is_empty() {
        return Err(EvalError::InvalidParams {
            reason: "threshold sweep produced no points".to_owned(),
        });
    }

    let qualified = points
        .iter()
        .filter(|p| p.fp_rate <= fp_ceiling)
        .max_by(|a, b| {
            a.f1.partial_cmp(&b.f1)
                .unwrap_or(std::cmp::Ordering::Equal)
                // F1 동률이면 낮은 임계값 (recall 우선)
                .then(b.threshold.partial_cmp(&a.threshold).unwrap_or(std::cmp::Ordering::Equal))
        });

    if let Some(best) = qualified {
        return Ok(ThresholdSelection {
            threshold: best.threshold,
            f1: best.f1,
            fp_rate: best.fp_rate,
            fp_ceiling_met: true,
        });
    }

    // 폴백: FP rate 최소, 동률이면 F1 최대
    let fallback = points
        .iter()
        .min_by(|a, b| {
            a.fp_rate
                .partial_cmp(&b.fp_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.f1.partial_cmp(&a.f1).unwrap_or(std::cmp::Ordering::Equal))
        })
        .unwrap_or(&points[0]);

    tracing::warn!(
        fp_ceiling,
        fallback_threshold = fallback.threshold,
        "no threshold satisfies fp-rate ceiling, falling back to lowest fp-rate"
    );

    Ok(ThresholdSelection {
        threshold: fallback.threshold,
        f1: fallback.f1,
        fp_rate: fallback.fp_rate,
        fp_ceiling_met: false,
    })
}
