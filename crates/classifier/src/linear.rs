//! 로지스틱 선형 분류기 — 모델 스펙 기반 스코어링
//!
//! 학습이 끝난 가중치를 [`ModelSpec`] JSON으로 받아
//! `sigmoid(bias + w·x)` 로 공격 확률을 계산합니다.
//! 특징별 기여도는 `weight * value` 입니다.

use serde::{Deserialize, Serialize};

use flowsentry_core::error::ClassifierError;
use flowsentry_core::types::{
    AttackType, Detection, DetectionLabel, FeatureAttribution, FlowFeatureVector,
};

use crate::adapter::ClassifierAdapter;
use crate::schema::FeatureSchema;

/// 모델 스펙 — 모델 디렉토리의 JSON 파일 하나에 대응
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// 모델 고유 ID
    pub model_id: String,
    /// 담당 공격 유형
    pub attack_type: AttackType,
    /// 특징 스키마 식별자
    pub schema_id: String,
    /// 특징 이름 (가중치와 같은 순서)
    pub features: Vec<String>,
    /// 특징별 가중치
    pub weights: Vec<f64>,
    /// 절편
    pub bias: f64,
    /// 공격 판정 결정 임계값
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
}

fn default_decision_threshold() -> f64 {
    0.5
}

/// 로지스틱 선형 분류기
///
/// 가중치는 생성 이후 읽기 전용이므로 `&self` 호출이 동시성 안전합니다.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    model_id: String,
    attack_type: AttackType,
    schema: FeatureSchema,
    weights: Vec<f64>,
    bias: f64,
    decision_threshold: f64,
}

impl LinearClassifier {
    /// 모델 스펙에서 분류기를 생성합니다.
    ///
    /// 가중치 수와 특징 수가 다르거나 임계값이 범위를 벗어나면 실패합니다.
    pub fn from_spec(spec: ModelSpec) -> Result<Self, ClassifierError> {
        if spec.weights.len() != spec.features.len() {
            return Err(ClassifierError::ModelLoad {
                path: spec.model_id.clone(),
                reason: format!(
                    "weight count {} does not match feature count {}",
                    spec.weights.len(),
                    spec.features.len()
                ),
            });
        }
        if !(0.0..=1.0).contains(&spec.decision_threshold) {
            return Err(ClassifierError::ModelLoad {
                path: spec.model_id.clone(),
                reason: format!("decision threshold out of range: {}", spec.decision_threshold),
            });
        }

        Ok(Self {
            model_id: spec.model_id,
            attack_type: spec.attack_type,
            schema: FeatureSchema::new(spec.schema_id, spec.features),
            weights: spec.weights,
            bias: spec.bias,
            decision_threshold: spec.decision_threshold,
        })
    }

    /// 결정 임계값을 반환합니다.
    pub fn decision_threshold(&self) -> f64 {
        self.decision_threshold
    }

    /// 원시 공격 확률을 계산합니다 (레이블 판정 없이).
    pub fn score(&self, vector: &FlowFeatureVector) -> Result<f64, ClassifierError> {
        self.schema.validate(&self.model_id, vector)?;
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(&vector.values)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        Ok(sigmoid(z))
    }
}

impl ClassifierAdapter for LinearClassifier {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn attack_type(&self) -> AttackType {
        self.attack_type
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn predict(&self, vector: &FlowFeatureVector) -> Result<Detection, ClassifierError> {
        let confidence = self.score(vector)?;

        let label = if confidence >= self.decision_threshold {
            DetectionLabel::Attack
        } else {
            DetectionLabel::Benign
        };

        let attributions = self
            .schema
            .features
            .iter()
            .zip(self.weights.iter().zip(&vector.values))
            .map(|(feature, (w, x))| FeatureAttribution {
                feature: feature.clone(),
                contribution: w * x,
            })
            .collect();

        Ok(Detection {
            model_id: self.model_id.clone(),
            attack_type: self.attack_type,
            label,
            confidence,
            attributions,
        })
    }
}

/// 수치 안정적인 시그모이드
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
