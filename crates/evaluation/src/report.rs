//! 평가 보고서 — 설계상 부분 성공
//!
//! 각 단계는 `completed | skipped(사유) | failed(사유)`로 보고되며,
//! 한 단계의 실패가 이미 완료된 단계를 버리지 않습니다.

use std::time::SystemTime;

use serde::Serialize;

use flowsentry_core::error::EvalError;

use crate::scenario::{
    BaselineReport, MixedTimelineReport, PureAttackReport, StealthReport,
};
use crate::scoring::{ClassMetrics, ConfusionMatrix};
use crate::threshold::{ThresholdPoint, ThresholdSelection};
use crate::throughput::{BatchTiming, ReconcileReport};

/// 단계 (또는 시나리오 조각)의 상태
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PhaseStatus<T> {
    /// 완료
    Completed {
        /// 단계 보고서
        report: T,
    },
    /// 건너뜀 (데이터 부족 등)
    Skipped {
        /// 건너뛴 사유
        reason: String,
    },
    /// 실패
    Failed {
        /// 실패 사유
        reason: String,
    },
}

impl<T> PhaseStatus<T> {
    /// 결과를 단계 상태로 분류합니다.
    ///
    /// [`EvalError::InsufficientData`]는 skipped, 나머지 에러는 failed.
    pub fn from_result(result: Result<T, EvalError>) -> Self {
        match result {
            Ok(report) => Self::Completed { report },
            Err(e @ EvalError::InsufficientData { .. }) => Self::Skipped {
                reason: e.to_string(),
            },
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// 완료 여부
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// 완료된 경우 보고서 참조
    pub fn report(&self) -> Option<&T> {
        match self {
            Self::Completed { report } => Some(report),
            _ => None,
        }
    }

    /// 상태 레이블 ("completed" 등)
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Phase 1 (데이터셋 수준) 보고서
#[derive(Debug, Clone, Serialize)]
pub struct Phase1Report {
    /// 평가에 쓰인 행 수
    pub rows: usize,
    /// 분류기 에러로 드롭된 행 수
    pub dropped_rows: usize,
    /// ROC-AUC
    pub roc_auc: f64,
    /// PR-AUC
    pub pr_auc: f64,
    /// 결정 임계값 스윕 (그리드 오름차순)
    pub sweep: Vec<ThresholdPoint>,
    /// 제약 선택 결과
    pub selection: ThresholdSelection,
    /// 선택된 임계값에서의 혼동 행렬
    pub confusion: ConfusionMatrix,
    /// attack 클래스 지표
    pub attack_class: ClassMetrics,
    /// benign 클래스 지표
    pub benign_class: ClassMetrics,
}

/// Phase 2 (시나리오) 보고서 — 시나리오별 상태 포함
#[derive(Debug, Clone, Serialize)]
pub struct Phase2Report {
    /// 사용한 결정 임계값
    pub threshold: f64,
    /// (a) baseline-stability
    pub baseline: PhaseStatus<BaselineReport>,
    /// (b) pure-attack
    pub pure_attack: PhaseStatus<PureAttackReport>,
    /// (c) mixed-timeline
    pub mixed_timeline: PhaseStatus<MixedTimelineReport>,
    /// (d) stealth-slow
    pub stealth_slow: PhaseStatus<StealthReport>,
}

impl Phase2Report {
    /// 완료된 시나리오 수
    pub fn completed_scenarios(&self) -> usize {
        [
            self.baseline.is_completed(),
            self.pure_attack.is_completed(),
            self.mixed_timeline.is_completed(),
            self.stealth_slow.is_completed(),
        ]
        .iter()
        .filter(|c| **c)
        .count()
    }
}

/// Phase 3 (시스템 수준) 보고서
#[derive(Debug, Clone, Serialize)]
pub struct Phase3Report {
    /// 배치별 처리량 측정 (크기 오름차순)
    pub timings: Vec<BatchTiming>,
    /// 오프라인 지표 대조
    pub reconcile: PhaseStatus<ReconcileReport>,
}

/// 평가 실행 전체 보고서
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// 평가 대상 모델
    pub model_id: String,
    /// 보고서 생성 시각
    pub generated_at: SystemTime,
    /// Phase 1 상태
    pub phase1: PhaseStatus<Phase1Report>,
    /// Phase 2 상태
    pub phase2: PhaseStatus<Phase2Report>,
    /// Phase 3 상태
    pub phase3: PhaseStatus<Phase3Report>,
}

impl EvaluationReport {
    /// 한 단계라도 완료되었는지 확인합니다.
    pub fn any_completed(&self) -> bool {
        self.phase1.is_completed() || self.phase2.is_completed() || self.phase3.is_completed()
    }

    /// JSON 직렬화 (외부 영속화는 호출자 책임)
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
