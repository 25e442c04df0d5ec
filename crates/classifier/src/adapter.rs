//! 분류기 어댑터 trait — 탐지 로직 확장 포인트
//!
//! 공격 유형 하나당 어댑터 하나를 둡니다. 어댑터는 상태를 변경하지
//! 않으며(가중치 읽기 전용), 동시 호출에 안전해야 합니다.

use flowsentry_core::error::ClassifierError;
use flowsentry_core::types::{AttackType, Detection, FlowFeatureVector};

use crate::schema::FeatureSchema;

/// 분류기 어댑터 trait
///
/// 새로운 모델 종류를 추가하려면 이 trait을 구현합니다.
pub trait ClassifierAdapter: Send + Sync {
    /// 모델 고유 ID (레지스트리/캐시 키)
    fn model_id(&self) -> &str;

    /// 이 모델이 담당하는 공격 유형
    fn attack_type(&self) -> AttackType;

    /// 모델이 요구하는 특징 스키마
    fn schema(&self) -> &FeatureSchema;

    /// 특징 벡터 하나를 판정합니다.
    ///
    /// 스키마 불일치 시 [`ClassifierError`]로 실패합니다.
    /// 부수효과가 없어 병렬 배치 호출에 안전합니다.
    fn predict(&self, vector: &FlowFeatureVector) -> Result<Detection, ClassifierError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn adapter_is_object_safe_and_shareable() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn ClassifierAdapter>();
        assert_send_sync::<Arc<dyn ClassifierAdapter>>();
    }
}
