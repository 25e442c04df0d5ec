//! Phase 2 — 정규 시나리오 타임라인
//!
//! 보류 행에서 네 가지 타임라인을 구성해 탐지 동작을 검증합니다.
//!
//! - **baseline-stability**: benign만 — 성공 기준은 ~0 오탐
//! - **pure-attack**: 공격만 — recall ≥ 목표
//! - **mixed-timeline**: benign 블록 → 공격 버스트 → benign 블록,
//!   탐지 지연(버스트 시작부터 첫 정탐까지의 위치)과 버스트 밖 오탐 측정
//! - **stealth-slow**: 큰 benign 풀에 낮은 밀도의 공격을 섞어
//!   recall이 수용 가능한 최소 공격 밀도 측정
//!
//! 필요한 레이블 행이 부족한 시나리오는 [`EvalError::InsufficientData`]로
//! 실패하며, 하니스는 그 시나리오만 skipped로 기록합니다.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use flowsentry_classifier::{ClassifierAdapter, HoldoutSet, LabeledFlow};
use flowsentry_core::error::EvalError;

use crate::dataset::require_rows;

/// 시나리오 구성 파라미터
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScenarioParams {
    /// baseline 시나리오의 benign 행 수
    pub baseline_rows: usize,
    /// pure-attack 시나리오의 최소 공격 행 수
    pub pure_attack_min_rows: usize,
    /// mixed 시나리오의 benign 블록 크기 (앞뒤 각각)
    pub mixed_benign_block: usize,
    /// mixed 시나리오의 공격 버스트 크기
    pub mixed_burst: usize,
    /// stealth 시나리오의 benign 풀 크기
    pub stealth_benign_pool: usize,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            baseline_rows: 200,
            pure_attack_min_rows: 20,
            mixed_benign_block: 1000,
            mixed_burst: 50,
            stealth_benign_pool: 1000,
        }
    }
}

impl ScenarioParams {
    /// 가용 데이터에 맞춰 파라미터를 줄입니다 (최소값 아래로는 내리지 않음).
    ///
    /// 스펙 기본값(1000/50/1000)은 충분한 데이터셋에서 그대로 쓰이고,
    /// 작은 데이터셋에서는 가용 행의 절반 블록으로 줄어듭니다.
    pub fn clamped_to(&self, benign_available: usize, attack_available: usize) -> Self {
        Self {
            baseline_rows: self.baseline_rows.min(benign_available.max(1)),
            pure_attack_min_rows: self.pure_attack_min_rows,
            mixed_benign_block: self.mixed_benign_block.min((benign_available / 2).max(1)),
            mixed_burst: self.mixed_burst.min(attack_available.max(1)),
            stealth_benign_pool: self.stealth_benign_pool.min(benign_available.max(1)),
        }
    }
}

/// 시나리오 실행 문맥
pub struct ScenarioContext<'a> {
    /// 평가 대상 어댑터
    pub adapter: &'a dyn ClassifierAdapter,
    /// 보류 데이터셋
    pub holdout: &'a HoldoutSet,
    /// 결정 임계값 (Phase 1 선택값 또는 모델 기본값)
    pub threshold: f64,
    /// 취소 신호
    pub cancel: &'a CancellationToken,
}

impl ScenarioContext<'_> {
    /// 행 하나를 임계값으로 판정합니다. 분류 불가 행은 benign으로 칩니다.
    fn predicts_attack(&self, row: &LabeledFlow) -> bool {
        self.adapter
            .predict(&row.features)
            .map(|d| d.confidence >= self.threshold)
            .unwrap_or(false)
    }

    fn check_cancelled(&self) -> Result<(), EvalError> {
        if self.cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }
        Ok(())
    }
}

/// baseline-stability 결과
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BaselineReport {
    /// 실행한 benign 행 수
    pub rows: usize,
    /// 오탐 수
    pub false_positives: u64,
    /// 오탐 비율
    pub fp_rate: f64,
    /// 성공 여부 (fp_rate ≤ 상한)
    pub passed: bool,
}

/// (a) baseline-stability: benign만 실행합니다.
pub fn baseline_stability(
    ctx: &ScenarioContext<'_>,
    params: &ScenarioParams,
    fp_rate_ceiling: f64,
) -> Result<BaselineReport, EvalError> {
    let rows = require_rows(
        ctx.holdout.benign_rows(),
        params.baseline_rows,
        "baseline-stability",
        "benign",
    )?;
    let rows = &rows[..params.baseline_rows];

    let mut false_positives = 0u64;
    for (idx, row) in rows.iter().enumerate() {
        if idx % 256 == 0 {
            ctx.check_cancelled()?;
        }
        if ctx.predicts_attack(row) {
            false_positives += 1;
        }
    }

    let fp_rate = false_positives as f64 / rows.len() as f64;
    Ok(BaselineReport {
        rows: rows.len(),
        false_positives,
        fp_rate,
        passed: fp_rate <= fp_rate_ceiling,
    })
}

/// pure-attack 결과
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PureAttackReport {
    /// 실행한 공격 행 수
    pub rows: usize,
    /// 탐지된 수
    pub detected: u64,
    /// recall
    pub recall: f64,
    /// 성공 여부 (recall ≥ 목표)
    pub passed: bool,
}

/// (b) pure-attack: 이 어댑터의 공격 유형 행만 실행합니다.
pub fn pure_attack(
    ctx: &ScenarioContext<'_>,
    params: &ScenarioParams,
    recall_target: f64,
) -> Result<PureAttackReport, EvalError> {
    let rows = require_rows(
        ctx.holdout.attack_rows(Some(ctx.adapter.attack_type())),
        params.pure_attack_min_rows,
        "pure-attack",
        "attack",
    )?;

    let mut detected = 0u64;
    for (idx, row) in rows.iter().enumerate() {
        if idx % 256 == 0 {
            ctx.check_cancelled()?;
        }
        if ctx.predicts_attack(row) {
            detected += 1;
        }
    }

    let recall = detected as f64 / rows.len() as f64;
    Ok(PureAttackReport {
        rows: rows.len(),
        detected,
        recall,
        passed: recall >= recall_target,
    })
}

/// mixed-timeline 결과
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MixedTimelineReport {
    /// 앞 benign 블록 크기
    pub benign_before: usize,
    /// 공격 버스트 크기
    pub burst_len: usize,
    /// 뒤 benign 블록 크기
    pub benign_after: usize,
    /// 탐지 지연 — 버스트 시작부터 첫 정탐까지의 위치 (미탐지면 None)
    pub detection_delay: Option<usize>,
    /// 버스트 밖 오탐 수
    pub fp_outside_burst: u64,
    /// 성공 여부 (버스트 내 탐지 + 버스트 밖 오탐 상한)
    pub passed: bool,
}

/// (c) mixed-timeline: benign 블록 → 공격 버스트 → benign 블록.
pub fn mixed_timeline(
    ctx: &ScenarioContext<'_>,
    params: &ScenarioParams,
    fp_rate_ceiling: f64,
) -> Result<MixedTimelineReport, EvalError> {
    let block = params.mixed_benign_block;
    let burst_len = params.mixed_burst;

    let benign = require_rows(
        ctx.holdout.benign_rows(),
        block * 2,
        "mixed-timeline",
        "benign",
    )?;
    let burst = require_rows(
        ctx.holdout.attack_rows(Some(ctx.adapter.attack_type())),
        burst_len,
        "mixed-timeline",
        "attack",
    )?;
    let burst = &burst[..burst_len];

    // 앞 블록
    let mut fp_outside_burst = 0u64;
    for (idx, row) in benign[..block].iter().enumerate() {
        if idx % 256 == 0 {
            ctx.check_cancelled()?;
        }
        if ctx.predicts_attack(row) {
            fp_outside_burst += 1;
        }
    }

    // 버스트: 첫 정탐 위치가 탐지 지연
    let mut detection_delay = None;
    for (position, row) in burst.iter().enumerate() {
        if position % 256 == 0 {
            ctx.check_cancelled()?;
        }
        if ctx.predicts_attack(row) && detection_delay.is_none() {
            detection_delay = Some(position);
        }
    }

    // 뒤 블록
    for (idx, row) in benign[block..block * 2].iter().enumerate() {
        if idx % 256 == 0 {
            ctx.check_cancelled()?;
        }
        if ctx.predicts_attack(row) {
            fp_outside_burst += 1;
        }
    }

    let outside_rows = (block * 2) as f64;
    let passed = detection_delay.is_some()
        && (fp_outside_burst as f64 / outside_rows) <= fp_rate_ceiling;

    Ok(MixedTimelineReport {
        benign_before: block,
        burst_len,
        benign_after: block,
        detection_delay,
        fp_outside_burst,
        passed,
    })
}

/// 밀도 하나의 측정 결과
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DensityPoint {
    /// 공격 밀도 (공격 행 / benign 풀)
    pub density: f64,
    /// 타임라인 전체 행 수
    pub rows: usize,
    /// 타임라인의 공격 행 수
    pub attack_rows: usize,
    /// 공격 행 recall
    pub recall: f64,
}

/// stealth-slow 결과
#[derive(Debug, Clone, Serialize)]
pub struct StealthReport {
    /// 밀도별 측정값 (오름차순)
    pub densities: Vec<DensityPoint>,
    /// recall이 목표 이상인 최소 밀도
    pub min_effective_density: Option<f64>,
    /// 성공 여부 (어떤 밀도에서든 목표 recall 달성)
    pub passed: bool,
}

/// (d) stealth-slow: 낮은 공격 밀도에서의 recall을 측정합니다.
///
/// 셔플은 시드된 RNG로 수행되어 재현 가능합니다.
pub fn stealth_slow(
    ctx: &ScenarioContext<'_>,
    params: &ScenarioParams,
    densities: &[f64],
    recall_target: f64,
    seed: u64,
) -> Result<StealthReport, EvalError> {
    let benign = require_rows(
        ctx.holdout.benign_rows(),
        params.stealth_benign_pool,
        "stealth-slow",
        "benign",
    )?;
    let pool = &benign[..params.stealth_benign_pool];

    let attacks = require_rows(
        ctx.holdout.attack_rows(Some(ctx.adapter.attack_type())),
        1,
        "stealth-slow",
        "attack",
    )?;

    let mut points = Vec::with_capacity(densities.len());
    let mut min_effective_density = None;

    for (idx, &density) in densities.iter().enumerate() {
        ctx.check_cancelled()?;

        let attack_count = ((pool.len() as f64 * density).ceil() as usize).max(1);

        // 공격 행은 가용 집합을 순환하며 채움
        let mut timeline: Vec<(&LabeledFlow, bool)> =
            pool.iter().map(|row| (*row, false)).collect();
        for i in 0..attack_count {
            timeline.push((attacks[i % attacks.len()], true));
        }

        // 시드된 셔플 — 밀도마다 다른 배치, 실행마다 동일
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(idx as u64));
        timeline.shuffle(&mut rng);

        let mut detected = 0u64;
        for (row_idx, (row, is_attack)) in timeline.iter().enumerate() {
            if row_idx % 256 == 0 {
                ctx.check_cancelled()?;
            }
            if *is_attack && ctx.predicts_attack(row) {
                detected += 1;
            }
        }

        let recall = detected as f64 / attack_count as f64;
        if recall >= recall_target && min_effective_density.is_none() {
            min_effective_density = Some(density);
        }
        points.push(DensityPoint {
            density,
            rows: timeline.len(),
            attack_rows: attack_count,
            recall,
        });
    }

    Ok(StealthReport {
        passed: min_effective_density.is_some(),
        min_effective_density,
        densities: points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use flowsentry_classifier::FeatureSchema;
    use flowsentry_core::error::ClassifierError;
    use flowsentry_core::types::{
        AttackType, Detection, DetectionLabel, FlowFeatureVector,
    };

    /// 결정적 합성 분류기: 첫 특징값이 곧 공격 점수
    ///
    /// benign 행(첫 특징 0.0)은 절대 오탐하지 않고, 공격 행
    /// (첫 특징 0.95)은 항상 탐지하는 zero-FP/100%-recall 분류기.
    struct SyntheticClassifier {
        schema: FeatureSchema,
    }

    impl SyntheticClassifier {
        fn new() -> Self {
            Self {
                schema: FeatureSchema::new("synthetic-v1", vec!["signal".to_owned()]),
            }
        }
    }

    impl ClassifierAdapter for SyntheticClassifier {
        fn model_id(&self) -> &str {
            "synthetic-syn-flood"
        }

        fn attack_type(&self) -> AttackType {
            AttackType::SynFlood
        }

        fn schema(&self) -> &FeatureSchema {
            &self.schema
        }

        fn predict(&self, vector: &FlowFeatureVector) -> Result<Detection, ClassifierError> {
            let score = vector.values.first().copied().unwrap_or(0.0);
            Ok(Detection {
                model_id: self.model_id().to_owned(),
                attack_type: AttackType::SynFlood,
                label: if score >= 0.5 {
                    DetectionLabel::Attack
                } else {
                    DetectionLabel::Benign
                },
                confidence: score,
                attributions: vec![],
            })
        }
    }

    fn synthetic_holdout(benign: usize, attack: usize) -> HoldoutSet {
        let mut rows = Vec::new();
        for i in 0..benign {
            rows.push(LabeledFlow {
                flow: flow(i as u16),
                features: FlowFeatureVector::new("synthetic-v1", vec![0.0]),
                label: DetectionLabel::Benign,
                attack_type: None,
            });
        }
        for i in 0..attack {
            rows.push(LabeledFlow {
                flow: flow((benign + i) as u16),
                features: FlowFeatureVector::new("synthetic-v1", vec![0.95]),
                label: DetectionLabel::Attack,
                attack_type: Some(AttackType::SynFlood),
            });
        }
        HoldoutSet::from_rows(rows)
    }

    fn flow(port: u16) -> flowsentry_core::types::FlowMetadata {
        flowsentry_core::types::FlowMetadata {
            src_ip: "10.0.0.1".parse().unwrap(),
            src_port: port,
            dst_ip: "10.0.0.2".parse().unwrap(),
            dst_port: 443,
            protocol: flowsentry_core::types::Protocol::Tcp,
        }
    }

    fn ctx<'a>(
        adapter: &'a dyn ClassifierAdapter,
        holdout: &'a HoldoutSet,
        cancel: &'a CancellationToken,
    ) -> ScenarioContext<'a> {
        ScenarioContext {
            adapter,
            holdout,
            threshold: 0.5,
            cancel,
        }
    }

    /// 스펙 §8: zero-FP 합성 분류기의 100% benign 입력은 정확히 오탐 0
    #[test]
    fn baseline_with_zero_fp_classifier_has_exactly_zero_fp() {
        let adapter = SyntheticClassifier::new();
        let holdout = synthetic_holdout(300, 0);
        let cancel = CancellationToken::new();
        let params = ScenarioParams::default().clamped_to(300, 0);

        let report =
            baseline_stability(&ctx(&adapter, &holdout, &cancel), &params, 0.05).unwrap();
        assert_eq!(report.false_positives, 0);
        assert!(report.passed);
    }

    #[test]
    fn baseline_insufficient_benign_is_skipped() {
        let adapter = SyntheticClassifier::new();
        let holdout = synthetic_holdout(5, 0);
        let cancel = CancellationToken::new();
        let params = ScenarioParams::default(); // baseline_rows = 200

        let result = baseline_stability(&ctx(&adapter, &holdout, &cancel), &params, 0.05);
        assert!(matches!(result, Err(EvalError::InsufficientData { .. })));
    }

    #[test]
    fn pure_attack_reaches_recall_target() {
        let adapter = SyntheticClassifier::new();
        let holdout = synthetic_holdout(0, 50);
        let cancel = CancellationToken::new();
        let params = ScenarioParams::default();

        let report = pure_attack(&ctx(&adapter, &holdout, &cancel), &params, 0.9).unwrap();
        assert_eq!(report.detected, 50);
        assert_eq!(report.recall, 1.0);
        assert!(report.passed);
    }

    /// 스펙 §8: benign(1000) → 버스트(50) → benign(1000),
    /// ≥90%-recall/0%-FP 분류기 → 지연 ≤ 50, 버스트 밖 오탐 0
    #[test]
    fn mixed_timeline_detects_burst_without_outside_fp() {
        let adapter = SyntheticClassifier::new();
        let holdout = synthetic_holdout(2000, 50);
        let cancel = CancellationToken::new();
        let params = ScenarioParams::default().clamped_to(2000, 50);
        assert_eq!(params.mixed_benign_block, 1000);
        assert_eq!(params.mixed_burst, 50);

        let report =
            mixed_timeline(&ctx(&adapter, &holdout, &cancel), &params, 0.05).unwrap();
        assert_eq!(report.fp_outside_burst, 0);
        let delay = report.detection_delay.expect("burst must be detected");
        assert!(delay <= 50);
        assert!(report.passed);
    }

    #[test]
    fn mixed_timeline_without_attacks_is_skipped() {
        let adapter = SyntheticClassifier::new();
        let holdout = synthetic_holdout(2000, 0);
        let cancel = CancellationToken::new();
        let params = ScenarioParams::default().clamped_to(2000, 0);

        let result = mixed_timeline(&ctx(&adapter, &holdout, &cancel), &params, 0.05);
        assert!(matches!(
            result,
            Err(EvalError::InsufficientData { .. })
        ));
    }

    #[test]
    fn stealth_slow_finds_min_effective_density() {
        let adapter = SyntheticClassifier::new();
        let holdout = synthetic_holdout(1000, 100);
        let cancel = CancellationToken::new();
        let params = ScenarioParams::default().clamped_to(1000, 100);

        let report = stealth_slow(
            &ctx(&adapter, &holdout, &cancel),
            &params,
            &[0.01, 0.05, 0.1],
            0.9,
            42,
        )
        .unwrap();

        assert_eq!(report.densities.len(), 3);
        // 완벽한 분류기 → 가장 낮은 밀도에서도 recall 1.0
        assert_eq!(report.min_effective_density, Some(0.01));
        assert!(report.passed);
        for point in &report.densities {
            assert_eq!(point.recall, 1.0);
        }
    }

    #[test]
    fn stealth_shuffle_is_reproducible() {
        let adapter = SyntheticClassifier::new();
        let holdout = synthetic_holdout(200, 20);
        let cancel = CancellationToken::new();
        let params = ScenarioParams {
            stealth_benign_pool: 200,
            ..ScenarioParams::default()
        };

        let a = stealth_slow(&ctx(&adapter, &holdout, &cancel), &params, &[0.05], 0.9, 7)
            .unwrap();
        let b = stealth_slow(&ctx(&adapter, &holdout, &cancel), &params, &[0.05], 0.9, 7)
            .unwrap();
        assert_eq!(a.densities[0].recall, b.densities[0].recall);
        assert_eq!(a.densities[0].attack_rows, b.densities[0].attack_rows);
    }

    #[test]
    fn cancelled_context_aborts_scenario() {
        let adapter = SyntheticClassifier::new();
        let holdout = synthetic_holdout(300, 0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let params = ScenarioParams::default().clamped_to(300, 0);

        let result = baseline_stability(&ctx(&adapter, &holdout, &cancel), &params, 0.05);
        assert!(matches!(result, Err(EvalError::Cancelled)));
    }

    #[test]
    fn adapter_trait_object_works_via_arc() {
        // 하니스가 Arc<dyn ClassifierAdapter>로 호출하는 경로 확인
        let adapter: Arc<dyn ClassifierAdapter> = Arc::new(SyntheticClassifier::new());
        let holdout = synthetic_holdout(250, 0);
        let cancel = CancellationToken::new();
        let params = ScenarioParams::default().clamped_to(250, 0);

        let report =
            baseline_stability(&ctx(adapter.as_ref(), &holdout, &cancel), &params, 0.05)
                .unwrap();
        assert!(report.passed);
    }
}
