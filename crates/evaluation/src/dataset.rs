//! 데이터셋 준비 — 레이블 파티션과 어댑터 스코어링
//!
//! 시나리오가 요구하는 레이블 행 수를 만족하지 못하면
//! [`EvalError::InsufficientData`]를 반환합니다. 해당 단계는
//! skipped로 기록되고 실행은 계속됩니다.

use flowsentry_classifier::{ClassifierAdapter, LabeledFlow};
use flowsentry_core::error::EvalError;

/// 정답과 모델 점수를 묶은 행
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRow {
    /// 정답: 공격 여부
    pub truth_attack: bool,
    /// 모델의 공격 확률 점수
    pub score: f64,
}

/// 행 목록을 어댑터로 스코어링합니다.
///
/// 분류기 에러가 난 행은 드롭하고 드롭 수를 함께 반환합니다
/// (에러는 원시 형태로 전파되지 않습니다).
pub fn score_rows(
    adapter: &dyn ClassifierAdapter,
    rows: &[&LabeledFlow],
) -> (Vec<ScoredRow>, usize) {
    let mut scored = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for row in rows {
        match adapter.predict(&row.features) {
            Ok(detection) => scored.push(ScoredRow {
                truth_attack: row.is_attack(),
                score: detection.confidence,
            }),
            Err(e) => {
                dropped += 1;
                tracing::debug!(error = %e, "dropping unscorable row");
            }
        }
    }

    (scored, dropped)
}

/// 필요한 수의 레이블 행을 요구합니다.
///
/// 부족하면 [`EvalError::InsufficientData`]로 실패합니다.
pub fn require_rows<'a>(
    rows: Vec<&'a LabeledFlow>,
    needed: usize,
    scenario: &str,
    label: &str,
) -> Result<Vec<&'a LabeledFlow>, EvalError> {
    if rows.len() < needed {
        return Err(EvalError::InsufficientData {
            scenario: scenario.to_owned(),
            label: label.to_owned(),
            needed,
            available: rows.len(),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsentry_classifier::{AdapterRegistry, HoldoutSet};
    use flowsentry_core::types::AttackType;

    #[test]
    fn score_rows_produces_score_per_row() {
        let registry = AdapterRegistry::with_builtin_models();
        let adapter = registry.require("syn-flood").unwrap();
        let holdout = HoldoutSet::synthetic(20, 5, 2);

        let rows = holdout.attack_rows(Some(AttackType::SynFlood));
        let (scored, dropped) = score_rows(adapter.as_ref(), &rows);
        assert_eq!(scored.len(), 5);
        assert_eq!(dropped, 0);
        assert!(scored.iter().all(|r| r.truth_attack));
        assert!(scored.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn require_rows_fails_when_short() {
        let holdout = HoldoutSet::synthetic(3, 0, 2);
        let result = require_rows(holdout.benign_rows(), 10, "baseline-stability", "benign");
        assert!(matches!(
            result,
            Err(EvalError::InsufficientData {
                needed: 10,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn require_rows_passes_when_enough() {
        let holdout = HoldoutSet::synthetic(10, 0, 2);
        let rows = require_rows(holdout.benign_rows(), 10, "baseline-stability", "benign");
        assert_eq!(rows.unwrap().len(), 10);
    }
}
