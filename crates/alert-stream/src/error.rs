//! 알림 스트림 에러 타입
//!
//! [`AlertStreamError`]는 스트림 파이프라인 내부에서 발생하는 에러를 표현합니다.
//! `From<AlertStreamError> for FlowsentryError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use flowsentry_core::error::{FlowsentryError, PipelineError};

/// 알림 스트림 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AlertStreamError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 파이프라인 구성 요소 누락
    #[error("missing component: {0}")]
    MissingComponent(&'static str),
}

impl From<AlertStreamError> for FlowsentryError {
    fn from(err: AlertStreamError) -> Self {
        FlowsentryError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
