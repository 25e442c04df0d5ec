//! 특징 스키마 — 입력 벡터의 형태 계약
//!
//! 모든 모델은 고정된 순서의 특징 스키마를 전제로 합니다.
//! 스키마가 다른 벡터는 [`ClassifierError::SchemaMismatch`]로 거부됩니다.

use serde::{Deserialize, Serialize};

use flowsentry_core::error::ClassifierError;
use flowsentry_core::types::FlowFeatureVector;

/// 특징 스키마
///
/// 특징 이름의 순서가 곧 벡터 값의 순서입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// 스키마 식별자 (예: "flow-v1")
    pub id: String,
    /// 순서가 고정된 특징 이름 목록
    pub features: Vec<String>,
}

impl FeatureSchema {
    /// 새 스키마를 생성합니다.
    pub fn new(id: impl Into<String>, features: Vec<String>) -> Self {
        Self {
            id: id.into(),
            features,
        }
    }

    /// 특징 개수를 반환합니다.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// 특징이 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// 입력 벡터를 스키마에 대조하여 검증합니다.
    ///
    /// 특징 개수가 다르거나 NaN/무한대 값이 있으면 실패합니다.
    pub fn validate(
        &self,
        model_id: &str,
        vector: &FlowFeatureVector,
    ) -> Result<(), ClassifierError> {
        if vector.len() != self.features.len() {
            return Err(ClassifierError::SchemaMismatch {
                model_id: model_id.to_owned(),
                expected: self.features.len(),
                actual: vector.len(),
            });
        }

        for (index, value) in vector.values.iter().enumerate() {
            if !value.is_finite() {
                return Err(ClassifierError::InvalidFeature {
                    index,
                    reason: format!("non-finite value: {value}"),
                });
            }
        }

        Ok(())
    }
}

/// 기본 플로우 특징 스키마 ("flow-v1")
///
/// 내장 모델 팩이 사용하는 8개 특징입니다.
pub fn default_flow_schema() -> FeatureSchema {
    FeatureSchema::new(
        "flow-v1",
        [
            "pkts_per_sec",
            "syn_ratio",
            "mean_pkt_len",
            "uniq_dst_ports",
            "dns_qname_entropy",
            "conn_duration",
            "bytes_out_in_ratio",
            "auth_failures",
        ]
        .iter()
        .map(|s| (*s).to_owned())
        .collect(),
    )
}
