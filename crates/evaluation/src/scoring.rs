//! 분류 지표 — 혼동 행렬, precision/recall/F1, ROC/PR-AUC
//!
//! 전부 순수 함수입니다. AUC는 점수 내림차순 정렬 후 사다리꼴
//! (ROC) / 스텝 (PR, average precision) 적분으로 계산합니다.

use serde::Serialize;

use crate::dataset::ScoredRow;

/// 이진 혼동 행렬
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    /// 공격을 공격으로 판정
    pub tp: u64,
    /// benign을 공격으로 판정
    pub fp: u64,
    /// benign을 benign으로 판정
    pub tn: u64,
    /// 공격을 benign으로 판정
    pub fn_: u64,
}

impl ConfusionMatrix {
    /// 점수 행을 임계값으로 이진 판정하여 행렬을 만듭니다.
    pub fn from_scores(scored: &[ScoredRow], threshold: f64) -> Self {
        let mut matrix = Self::default();
        for row in scored {
            let predicted_attack = row.score >= threshold;
            match (row.truth_attack, predicted_attack) {
                (true, true) => matrix.tp += 1,
                (false, true) => matrix.fp += 1,
                (false, false) => matrix.tn += 1,
                (true, false) => matrix.fn_ += 1,
            }
        }
        matrix
    }

    /// 전체 행 수
    pub fn total(&self) -> u64 {
        self.tp + self.fp + self.tn + self.fn_
    }

    /// precision = TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// recall = TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// F1 = 2PR / (P + R)
    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    /// FP rate = FP / (FP + TN)
    pub fn fp_rate(&self) -> f64 {
        ratio(self.fp, self.fp + self.tn)
    }

    /// accuracy = (TP + TN) / total
    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// 클래스별 지표 (attack 클래스, benign 클래스 순)
    pub fn class_metrics(&self) -> (ClassMetrics, ClassMetrics) {
        let attack = ClassMetrics {
            precision: self.precision(),
            recall: self.recall(),
            f1: self.f1(),
            support: self.tp + self.fn_,
        };
        // benign 클래스는 레이블 반전 관점
        let benign_precision = ratio(self.tn, self.tn + self.fn_);
        let benign_recall = ratio(self.tn, self.tn + self.fp);
        let benign_f1 = if benign_precision + benign_recall == 0.0 {
            0.0
        } else {
            2.0 * benign_precision * benign_recall / (benign_precision + benign_recall)
        };
        let benign = ClassMetrics {
            precision: benign_precision,
            recall: benign_recall,
            f1: benign_f1,
            support: self.tn + self.fp,
        };
        (attack, benign)
    }
}

/// 클래스 하나의 지표
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassMetrics {
    /// precision
    pub precision: f64,
    /// recall
    pub recall: f64,
    /// F1
    pub f1: f64,
    /// 해당 클래스의 정답 행 수
    pub support: u64,
}

/// ROC-AUC — 점수 내림차순 스윕의 (FPR, TPR) 곡선 사다리꼴 적분
///
/// 양성 또는 음성이 없으면 0.5를 반환합니다 (무정보).
pub fn roc_auc(scored: &[ScoredRow]) -> f64 {
    let positives = scored.iter().filter(|r| r.truth_attack).count() as f64;
    let negatives = scored.len() as f64 - positives;
    if positives == 0.0 || negatives == 0.0 {
        return 0.5;
    }

    let mut sorted: Vec<&ScoredRow> = scored.iter().collect();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut auc = 0.0;
    let (mut tp, mut fp) = (0u64, 0u64);
    let (mut prev_tpr, mut prev_fpr) = (0.0f64, 0.0f64);
    let mut idx = 0;

    while idx < sorted.len() {
        // 동점 점수는 한 번에 처리 (곡선의 한 점)
        let score = sorted[idx].score;
        while idx < sorted.len() && sorted[idx].score == score {
            if sorted[idx].truth_attack {
                tp += 1;
            } else {
                fp += 1;
            }
            idx += 1;
        }
        let tpr = tp as f64 / positives;
        let fpr = fp as f64 / negatives;
        auc += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
        prev_tpr = tpr;
        prev_fpr = fpr;
    }

    // 곡선 끝점 (1, 1)까지
    auc += (1.0 - prev_fpr) * (1.0 + prev_tpr) / 2.0;
    auc
}

/// PR-AUC (average precision) — 점수 내림차순 스텝 적분
///
/// 양성이 없으면 0.0을 반환합니다.
pub fn pr_auc(scored: &[ScoredRow]) -> f64 {
    let positives = scored.iter().filter(|r| r.truth_attack).count() as f64;
    if positives == 0.0 {
        return 0.0;
    }

    let mut sorted: Vec<&ScoredRow> = scored.iter().collect();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut auc = 0.0;
    let (mut tp, mut fp) = (0u64, 0u64);
    let mut prev_recall = 0.0f64;
    let mut idx = 0;

    while idx < sorted.len() {
        let score = sorted[idx].score;
        while idx < sorted.len() && sorted[idx].score == score {
            if sorted[idx].truth_attack {
                tp += 1;
            } else {
                fp += 1;
            }
            idx += 1;
        }
        let recall = tp as f64 / positives;
        let precision = tp as f64 / (tp + fp) as f64;
        auc += (recall - prev_recall) * precision;
        prev_recall = recall;
    }

    auc
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
