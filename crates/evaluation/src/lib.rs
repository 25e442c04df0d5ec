#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`dataset`]: 레이블 파티션 준비와 어댑터 스코어링
//! - [`scoring`]: 혼동 행렬, precision/recall/F1, ROC/PR-AUC
//! - [`threshold`]: 결정 임계값 스윕과 FP 상한 제약 선택
//! - [`scenario`]: 네 가지 정규 시나리오 타임라인
//! - [`throughput`]: 라이브 경로 배치 스케일링과 지표 대조
//! - [`harness`]: 단계 상태 기계와 run_all
//! - [`report`]: 부분 성공 보고서 타입

pub mod dataset;
pub mod harness;
pub mod report;
pub mod scenario;
pub mod scoring;
pub mod threshold;
pub mod throughput;

// --- 주요 타입 re-export ---

pub use dataset::{ScoredRow, score_rows};
pub use harness::EvalHarness;
pub use report::{EvaluationReport, Phase1Report, Phase2Report, Phase3Report, PhaseStatus};
pub use scenario::{
    BaselineReport, MixedTimelineReport, PureAttackReport, ScenarioParams, StealthReport,
};
pub use scoring::{ClassMetrics, ConfusionMatrix, pr_auc, roc_auc};
pub use threshold::{ThresholdPoint, ThresholdSelection, select_threshold, sweep};
pub use throughput::{BatchTiming, ReconcileReport};
