//! 알림 스트림 설정
//!
//! [`StreamConfig`]는 core의 [`FlowsentryConfig`](flowsentry_core::config::FlowsentryConfig)
//! 중 스트림 파이프라인이 사용하는 섹션을 모아 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use flowsentry_core::config::FlowsentryConfig;
//! use flowsentry_alert_stream::config::StreamConfig;
//!
//! let core_config = FlowsentryConfig::default();
//! let config = StreamConfig::from_core(&core_config);
//! ```

use serde::{Deserialize, Serialize};

use flowsentry_core::config::{AlertConfig, CacheConfig, OverviewConfig, PublisherConfig};

use crate::error::AlertStreamError;

/// 알림 스트림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// 예측 캐시 설정
    pub cache: CacheConfig,
    /// 알림 빌더 설정
    pub alert: AlertConfig,
    /// 발행자 설정
    pub publisher: PublisherConfig,
    /// 개요 집계 설정
    pub overview: OverviewConfig,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 드라이브 루프 주기 (밀리초) — 틱마다 모델별 pop → 알림 발행
    pub emit_interval_ms: u64,
    /// 리필 요청 채널 용량
    pub replenish_channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            alert: AlertConfig::default(),
            publisher: PublisherConfig::default(),
            overview: OverviewConfig::default(),
            emit_interval_ms: 500,
            replenish_channel_capacity: 64,
        }
    }
}

impl StreamConfig {
    /// core 설정에서 스트림 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &flowsentry_core::config::FlowsentryConfig) -> Self {
        Self {
            cache: core.cache.clone(),
            alert: core.alert.clone(),
            publisher: core.publisher.clone(),
            overview: core.overview.clone(),
            ..Self::default()
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), AlertStreamError> {
        if self.emit_interval_ms == 0 {
            return Err(AlertStreamError::Config {
                field: "emit_interval_ms".to_owned(),
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.replenish_channel_capacity == 0 {
            return Err(AlertStreamError::Config {
                field: "replenish_channel_capacity".to_owned(),
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.cache.capacity == 0 {
            return Err(AlertStreamError::Config {
                field: "cache.capacity".to_owned(),
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.cache.refill_threshold >= self.cache.capacity {
            return Err(AlertStreamError::Config {
                field: "cache.refill_threshold".to_owned(),
                reason: "must be less than cache.capacity".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(StreamConfig::default().validate().is_ok());
    }

    #[test]
    fn from_core_copies_sections() {
        let mut core = flowsentry_core::config::FlowsentryConfig::default();
        core.cache.capacity = 64;
        core.cache.refill_threshold = 8;
        core.overview.ttl_secs = 7;

        let config = StreamConfig::from_core(&core);
        assert_eq!(config.cache.capacity, 64);
        assert_eq!(config.overview.ttl_secs, 7);
        // 확장 필드는 기본값
        assert_eq!(config.emit_interval_ms, 500);
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config = StreamConfig::default();
        config.emit_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
