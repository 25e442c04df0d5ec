//! 평가 하니스 — 단계 상태 기계와 run_all
//!
//! 상태 전이: `Init → Running(단계들, 임의 부분집합/순서) → Report → Done`.
//! 단계들은 서로 독립적이며, 한 단계의 실패/스킵은 다른 단계의
//! 결과를 버리지 않습니다.
//!
//! Phase 1/2는 어댑터를 직접 호출하고 (캐시 우회), Phase 3만
//! 라이브 캐시/빌더 경로를 사용합니다.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use metrics::counter;
use tokio_util::sync::CancellationToken;

use flowsentry_alert_stream::builder::AlertBuilder;
use flowsentry_alert_stream::cache::PredictionCache;
use flowsentry_classifier::{AdapterRegistry, ClassifierAdapter, HoldoutSet};
use flowsentry_core::config::EvaluationConfig;
use flowsentry_core::error::{ClassifierError, EvalError};
use flowsentry_core::metrics as m;

use crate::dataset::{require_rows, score_rows};
use crate::report::{
    EvaluationReport, Phase1Report, Phase2Report, Phase3Report, PhaseStatus,
};
use crate::scenario::{
    ScenarioContext, ScenarioParams, baseline_stability, mixed_timeline, pure_attack,
    stealth_slow,
};
use crate::scoring::{ConfusionMatrix, pr_auc, roc_auc};
use crate::threshold::{grid, select_threshold, sweep};
use crate::throughput::{measure_throughput, reconcile};

/// Phase 1이 요구하는 클래스별 최소 행 수
const MIN_CLASS_ROWS: usize = 10;

/// 하니스 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    /// 생성됨
    Init,
    /// 단계 실행 중
    Running,
    /// 보고서 작성 중
    Report,
    /// 완료
    Done,
}

impl fmt::Display for HarnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Running => write!(f, "running"),
            Self::Report => write!(f, "report"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Phase 3의 라이브 대상
pub struct LiveTarget<'a> {
    /// 실행 중인 예측 캐시
    pub cache: &'a PredictionCache,
    /// 전체 경로 대조에 쓰일 알림 빌더
    pub builder: &'a AlertBuilder,
}

/// 3단계 평가 하니스
///
/// 명시적으로 생성되는 상태 객체입니다. 같은 레지스트리/보류 셋으로
/// 여러 모델을 순차 평가할 수 있습니다.
pub struct EvalHarness {
    registry: Arc<AdapterRegistry>,
    holdout: HoldoutSet,
    config: EvaluationConfig,
    cancel: CancellationToken,
    state: HarnessState,
}

impl EvalHarness {
    /// 하니스를 생성합니다.
    pub fn new(
        registry: Arc<AdapterRegistry>,
        holdout: HoldoutSet,
        config: EvaluationConfig,
    ) -> Self {
        Self {
            registry,
            holdout,
            config,
            cancel: CancellationToken::new(),
            state: HarnessState::Init,
        }
    }

    /// 외부 취소 토큰을 연결합니다.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 현재 상태
    pub fn state(&self) -> HarnessState {
        self.state
    }

    fn adapter(&self, model_id: &str) -> Result<Arc<dyn ClassifierAdapter>, EvalError> {
        self.registry.require(model_id).map_err(|e| match e {
            ClassifierError::ModelNotFound { model_id } => EvalError::InvalidParams {
                reason: format!("unknown model: {model_id}"),
            },
            other => EvalError::InvalidParams {
                reason: other.to_string(),
            },
        })
    }

    /// Phase 1: 보류 레이블 셋 위의 데이터셋 수준 지표
    pub fn run_phase1(&self, model_id: &str) -> Result<Phase1Report, EvalError> {
        let adapter = self.adapter(model_id)?;

        let benign = require_rows(
            self.holdout.benign_rows(),
            MIN_CLASS_ROWS,
            "phase1",
            "benign",
        )?;
        let attacks = require_rows(
            self.holdout.attack_rows(Some(adapter.attack_type())),
            MIN_CLASS_ROWS,
            "phase1",
            "attack",
        )?;

        if self.cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        let rows: Vec<_> = benign.into_iter().chain(attacks).collect();
        let (scored, dropped_rows) = score_rows(adapter.as_ref(), &rows);

        let sweep_grid = grid(&self.config)?;
        let points = sweep(&scored, &sweep_grid);
        let selection = select_threshold(&points, self.config.fp_rate_ceiling)?;
        let confusion = ConfusionMatrix::from_scores(&scored, selection.threshold);
        let (attack_class, benign_class) = confusion.class_metrics();

        Ok(Phase1Report {
            rows: scored.len(),
            dropped_rows,
            roc_auc: roc_auc(&scored),
            pr_auc: pr_auc(&scored),
            sweep: points,
            selection,
            confusion,
            attack_class,
            benign_class,
        })
    }

    /// Phase 2: 네 가지 정규 시나리오
    ///
    /// `threshold`가 `None`이면 Phase 1을 먼저 돌리지 않은 실행이므로
    /// 관례적 기본값 0.5를 사용합니다. 개별 시나리오의 데이터 부족은
    /// 그 시나리오만 skipped로 만들고 나머지는 계속합니다.
    pub fn run_phase2(
        &self,
        model_id: &str,
        threshold: Option<f64>,
    ) -> Result<Phase2Report, EvalError> {
        let adapter = self.adapter(model_id)?;
        let threshold = threshold.unwrap_or(0.5);

        let benign_available = self.holdout.benign_rows().len();
        let attack_available = self
            .holdout
            .attack_rows(Some(adapter.attack_type()))
            .len();
        let params = ScenarioParams::default().clamped_to(benign_available, attack_available);

        let ctx = ScenarioContext {
            adapter: adapter.as_ref(),
            holdout: &self.holdout,
            threshold,
            cancel: &self.cancel,
        };

        // 시나리오 조각 하나의 취소는 전체 단계 실패로 승격
        let baseline = baseline_stability(&ctx, &params, self.config.fp_rate_ceiling);
        if matches!(baseline, Err(EvalError::Cancelled)) {
            return Err(EvalError::Cancelled);
        }
        let pure = pure_attack(&ctx, &params, self.config.recall_target);
        if matches!(pure, Err(EvalError::Cancelled)) {
            return Err(EvalError::Cancelled);
        }
        let mixed = mixed_timeline(&ctx, &params, self.config.fp_rate_ceiling);
        if matches!(mixed, Err(EvalError::Cancelled)) {
            return Err(EvalError::Cancelled);
        }
        let stealth = stealth_slow(
            &ctx,
            &params,
            &self.config.stealth_densities,
            self.config.recall_target,
            self.config.shuffle_seed,
        );
        if matches!(stealth, Err(EvalError::Cancelled)) {
            return Err(EvalError::Cancelled);
        }

        Ok(Phase2Report {
            threshold,
            baseline: PhaseStatus::from_result(baseline),
            pure_attack: PhaseStatus::from_result(pure),
            mixed_timeline: PhaseStatus::from_result(mixed),
            stealth_slow: PhaseStatus::from_result(stealth),
        })
    }

    /// Phase 3: 라이브 캐시/어댑터 경로 처리량 + 지표 대조
    pub async fn run_phase3(
        &self,
        model_id: &str,
        live: &LiveTarget<'_>,
    ) -> Result<Phase3Report, EvalError> {
        let adapter = self.adapter(model_id)?;

        let timings = measure_throughput(
            live.cache,
            model_id,
            &self.config.batch_sizes,
            &self.cancel,
        )
        .await?;

        let reconcile_result = reconcile(
            adapter.as_ref(),
            live.builder,
            &self.holdout,
            self.config.mixed_attack_ratio,
            self.config.reconcile_tolerance,
            &self.cancel,
        );
        if matches!(reconcile_result, Err(EvalError::Cancelled)) {
            return Err(EvalError::Cancelled);
        }

        Ok(Phase3Report {
            timings,
            reconcile: PhaseStatus::from_result(reconcile_result),
        })
    }

    /// 세 단계를 모두 실행하고 부분 성공 보고서를 만듭니다.
    ///
    /// `live`가 `None`이면 Phase 3은 라이브 대상 도달 불가로
    /// 단계 수준 실패가 되며, 다른 단계는 영향을 받지 않습니다.
    pub async fn run_all(
        &mut self,
        model_id: &str,
        live: Option<LiveTarget<'_>>,
    ) -> EvaluationReport {
        self.state = HarnessState::Running;
        tracing::info!(model_id, "evaluation run started");

        let phase1 = PhaseStatus::from_result(self.run_phase1(model_id));
        counter!(m::EVAL_PHASES_TOTAL, m::LABEL_RESULT => phase1.label()).increment(1);

        let selected_threshold = phase1
            .report()
            .map(|report: &Phase1Report| report.selection.threshold);
        let phase2 = PhaseStatus::from_result(self.run_phase2(model_id, selected_threshold));
        counter!(m::EVAL_PHASES_TOTAL, m::LABEL_RESULT => phase2.label()).increment(1);

        let phase3 = match &live {
            Some(target) => PhaseStatus::from_result(self.run_phase3(model_id, target).await),
            None => PhaseStatus::Failed {
                reason: EvalError::Connection {
                    target: model_id.to_owned(),
                    reason: "no live target provisioned".to_owned(),
                }
                .to_string(),
            },
        };
        counter!(m::EVAL_PHASES_TOTAL, m::LABEL_RESULT => phase3.label()).increment(1);

        self.state = HarnessState::Report;
        let report = EvaluationReport {
            model_id: model_id.to_owned(),
            generated_at: SystemTime::now(),
            phase1,
            phase2,
            phase3,
        };

        tracing::info!(
            model_id,
            phase1 = report.phase1.label(),
            phase2 = report.phase2.label(),
            phase3 = report.phase3.label(),
            "evaluation run finished"
        );
        self.state = HarnessState::Done;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsentry_classifier::RotatingFeatureSource;
    use flowsentry_core::config::{AlertConfig, CacheConfig};
    use tokio::sync::mpsc;

    fn harness(benign: usize, attacks_per_family: usize) -> EvalHarness {
        let registry = Arc::new(AdapterRegistry::with_builtin_models());
        let holdout = HoldoutSet::synthetic(benign, attacks_per_family, 17);
        EvalHarness::new(registry, holdout, EvaluationConfig::default())
    }

    #[test]
    fn phase1_produces_full_metrics() {
        let harness = harness(300, 60);
        let report = harness.run_phase1("syn-flood").unwrap();

        assert_eq!(report.rows, 300 + 60);
        assert_eq!(report.dropped_rows, 0);
        // 합성 데이터는 내장 모델이 잘 분리하도록 설계됨
        assert!(report.roc_auc > 0.9, "roc_auc = {}", report.roc_auc);
        assert!(report.pr_auc > 0.8, "pr_auc = {}", report.pr_auc);
        assert_eq!(report.sweep.len(), 8);
        assert!(report.selection.threshold >= 0.2);
        assert!(report.confusion.total() == 360);
        assert_eq!(report.attack_class.support, 60);
        assert_eq!(report.benign_class.support, 300);
    }

    #[test]
    fn phase1_with_tiny_dataset_is_insufficient() {
        let harness = harness(2, 1);
        let result = harness.run_phase1("syn-flood");
        assert!(matches!(result, Err(EvalError::InsufficientData { .. })));
    }

    #[test]
    fn phase1_unknown_model_is_invalid_params() {
        let harness = harness(100, 20);
        let result = harness.run_phase1("no-such-model");
        assert!(matches!(result, Err(EvalError::InvalidParams { .. })));
    }

    #[test]
    fn phase2_runs_all_four_scenarios() {
        let harness = harness(500, 60);
        let report = harness.run_phase2("syn-flood", Some(0.5)).unwrap();

        assert_eq!(report.completed_scenarios(), 4);
        assert!(report.baseline.is_completed());
        assert!(report.pure_attack.is_completed());
        assert!(report.mixed_timeline.is_completed());
        assert!(report.stealth_slow.is_completed());
    }

    #[test]
    fn phase2_scenario_skip_does_not_fail_phase() {
        // 공격 행이 전혀 없음 → 공격 의존 시나리오만 skipped
        let harness = harness(500, 0);
        let report = harness.run_phase2("syn-flood", None).unwrap();

        assert!(report.baseline.is_completed());
        assert_eq!(report.pure_attack.label(), "skipped");
        assert_eq!(report.mixed_timeline.label(), "skipped");
        assert_eq!(report.stealth_slow.label(), "skipped");
    }

    #[tokio::test]
    async fn run_all_is_partial_success_without_live_target() {
        let mut harness = harness(300, 60);
        let report = harness.run_all("syn-flood", None).await;

        assert_eq!(harness.state(), HarnessState::Done);
        assert!(report.phase1.is_completed());
        assert!(report.phase2.is_completed());
        // 라이브 대상 없음 → Phase 3만 실패
        assert_eq!(report.phase3.label(), "failed");
        assert!(report.any_completed());

        // 보고서는 JSON으로 영속화 가능해야 함
        let json = report.to_json().unwrap();
        assert!(json.contains("\"model_id\": \"syn-flood\""));
    }

    #[tokio::test]
    async fn run_all_with_live_target_completes_phase3() {
        let registry = Arc::new(AdapterRegistry::with_builtin_models());
        let holdout = HoldoutSet::synthetic(400, 80, 17);
        let source = RotatingFeatureSource::new(&holdout);
        let (tx, _rx) = mpsc::channel(64);
        let cache_config = CacheConfig {
            capacity: 2100,
            refill_threshold: 50,
            ..CacheConfig::default()
        };
        let cache = PredictionCache::new(&cache_config, Arc::clone(&registry), source, tx);
        cache.prefill();
        let builder = AlertBuilder::from_config(&AlertConfig::default());

        let mut harness = EvalHarness::new(
            registry,
            HoldoutSet::synthetic(400, 80, 17),
            EvaluationConfig::default(),
        );
        let report = harness
            .run_all(
                "syn-flood",
                Some(LiveTarget {
                    cache: &cache,
                    builder: &builder,
                }),
            )
            .await;

        assert!(report.phase1.is_completed());
        assert!(report.phase3.is_completed());
        let phase3 = report.phase3.report().unwrap();
        assert_eq!(phase3.timings.len(), 4); // 100/500/1000/2000
        assert!(phase3.reconcile.is_completed());
    }

    #[tokio::test]
    async fn cancelled_harness_fails_phases_not_run_yet() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut harness = harness(300, 60).with_cancellation(cancel);

        let report = harness.run_all("syn-flood", None).await;
        // 취소된 실행의 단계들은 failed로 보고되고, run 자체는 완료됨
        assert_eq!(report.phase1.label(), "failed");
        assert_eq!(report.phase2.label(), "failed");
        assert_eq!(harness.state(), HarnessState::Done);
    }
}
