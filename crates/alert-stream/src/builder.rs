//! 알림 생성 — 분류기 판정을 소비자용 알림으로 변환합니다.
//!
//! [`AlertBuilder`]는 판정과 플로우 메타데이터를 받아 심각도 밴드를
//! 적용하고, 사람이 읽을 수 있는 레이블·공격 체인 주석·상위 특징을
//! 붙인 [`Alert`]를 생성합니다.
//!
//! # 로그 볼륨 정책
//! high/critical이면서 로깅 신뢰도 임계값 이상인 알림만 개별 로깅하고,
//! 나머지는 집계 카운터로만 셉니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use metrics::counter;

use flowsentry_core::config::{AlertConfig, SeverityBandsConfig};
use flowsentry_core::metrics as m;
use flowsentry_core::types::{
    Alert, AttackType, Detection, FeatureAttribution, FlowMetadata, Severity,
};

/// 심각도 밴드 — 공격 유형별 오버라이드를 포함한 판정 규칙
///
/// 설정에서 주입되며 하드코딩되지 않습니다.
#[derive(Debug, Clone)]
pub struct SeverityBands {
    default: SeverityBandsConfig,
    overrides: HashMap<AttackType, SeverityBandsConfig>,
}

impl SeverityBands {
    /// 알림 설정에서 밴드를 구성합니다.
    ///
    /// 알 수 없는 공격 유형 키의 오버라이드는 경고 로그를 남기고 무시합니다.
    pub fn from_config(config: &AlertConfig) -> Self {
        let mut overrides = HashMap::new();
        for (key, bands) in &config.severity_overrides {
            match AttackType::from_str_loose(key) {
                Some(attack) => {
                    overrides.insert(attack, *bands);
                }
                None => {
                    tracing::warn!(key, "ignoring severity override for unknown attack type");
                }
            }
        }
        Self {
            default: config.severity_bands,
            overrides,
        }
    }

    /// 공격 유형과 신뢰도에서 심각도를 판정합니다.
    ///
    /// 고정된 공격 유형에 대해 신뢰도가 높아지면 심각도는
    /// 절대 낮아지지 않습니다 (밴드 단조성은 설정 검증에서 보장).
    pub fn severity_for(&self, attack: AttackType, confidence: f64) -> Severity {
        let bands = self.overrides.get(&attack).unwrap_or(&self.default);
        if confidence >= bands.critical {
            Severity::Critical
        } else if confidence >= bands.high {
            Severity::High
        } else if confidence >= bands.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// 알림 빌더
///
/// 내부 카운터가 원자적이므로 `Arc`로 공유하여 여러 경로
/// (드라이브 루프, 평가 하니스)에서 동시에 사용할 수 있습니다.
pub struct AlertBuilder {
    bands: SeverityBands,
    informational: bool,
    top_k: usize,
    log_confidence_threshold: f64,
    built: AtomicU64,
    suppressed_benign: AtomicU64,
}

impl AlertBuilder {
    /// 알림 설정에서 빌더를 생성합니다.
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            bands: SeverityBands::from_config(config),
            informational: config.informational,
            top_k: config.top_features,
            log_confidence_threshold: config.log_confidence_threshold,
            built: AtomicU64::new(0),
            suppressed_benign: AtomicU64::new(0),
        }
    }

    /// 판정과 플로우 메타데이터에서 알림을 생성합니다.
    ///
    /// BENIGN 판정은 informational 모드가 아니면 `None`을 반환합니다.
    /// informational 모드에서는 `Severity::Info` 알림이 생성되며,
    /// Info는 경보 수준이 아니므로 BENIGN이 경보를 만드는 일은 없습니다.
    pub fn build(&self, detection: &Detection, flow: FlowMetadata) -> Option<Alert> {
        let severity = if detection.is_attack() {
            self.bands
                .severity_for(detection.attack_type, detection.confidence)
        } else {
            if !self.informational {
                self.suppressed_benign.fetch_add(1, Ordering::Relaxed);
                counter!(m::ALERTS_SUPPRESSED_BENIGN_TOTAL).increment(1);
                return None;
            }
            Severity::Info
        };

        let alert = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: SystemTime::now(),
            flow,
            attack_type: detection.attack_type,
            severity,
            score: detection.confidence,
            label_human: detection.attack_type.human_label().to_owned(),
            chain_stage: detection
                .attack_type
                .secondary_stage()
                .map(str::to_owned),
            top_features: top_features(&detection.attributions, self.top_k),
        };

        self.built.fetch_add(1, Ordering::Relaxed);
        counter!(m::ALERTS_BUILT_TOTAL,
            m::LABEL_SEVERITY => severity.to_string().to_lowercase(),
            m::LABEL_ATTACK_TYPE => detection.attack_type.as_str())
        .increment(1);

        // 로그 볼륨 제한: high/critical + 임계값 이상만 개별 로깅
        if severity >= Severity::High && detection.confidence >= self.log_confidence_threshold {
            tracing::warn!(
                alert_id = %alert.id,
                attack = %alert.attack_type,
                severity = %alert.severity,
                score = alert.score,
                flow = %alert.flow,
                "alert raised"
            );
        }

        Some(alert)
    }

    /// 생성된 총 알림 수
    pub fn built_count(&self) -> u64 {
        self.built.load(Ordering::Relaxed)
    }

    /// BENIGN 판정으로 억제된 수
    pub fn suppressed_benign_count(&self) -> u64 {
        self.suppressed_benign.load(Ordering::Relaxed)
    }
}

/// 기여도 절대값 내림차순 상위 K개를 반환합니다.
///
/// 기여도가 없으면 빈 목록입니다 (null 아님).
fn top_features(attributions: &[FeatureAttribution], k: usize) -> Vec<FeatureAttribution> {
    let mut sorted: Vec<FeatureAttribution> = attributions.to_vec();
    sorted.sort_by(|a, b| {
        b.contribution
            .abs()
            .partial_cmp(&a.contribution.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(k);
    sorted
}
