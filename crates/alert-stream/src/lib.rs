#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`cache`]: 모델별 유한 예측 큐와 단일 비행 리필 스케줄링
//! - [`replenish`]: 백그라운드 리필 태스크 (백오프, 원자적 커밋, 취소)
//! - [`builder`]: 판정 → 알림 변환 (심각도 밴드, 체인 주석, 상위 특징)
//! - [`publisher`]: 구독자별 drop-oldest 백로그 팬아웃
//! - [`overview`]: TTL 캐시 개요 통계
//! - [`pipeline`]: 전체 스트림 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 스트림 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! RotatingFeatureSource -> Replenisher -> PredictionCache -> pop()
//!                                             |
//!                          AlertBuilder <-----+
//!                               |
//!              +----------------+----------------+
//!              v                                 v
//!        AlertPublisher                  OverviewAggregator
//!        (구독자 팬아웃)                  (TTL 캐시 개요)
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod overview;
pub mod pipeline;
pub mod publisher;
pub mod replenish;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{AlertStreamPipeline, AlertStreamPipelineBuilder};

// 설정
pub use config::StreamConfig;

// 에러
pub use error::AlertStreamError;

// 캐시
pub use cache::{Prediction, PredictionCache, ReplenishRequest};

// 리필러
pub use replenish::Replenisher;

// 알림 빌더
pub use builder::{AlertBuilder, SeverityBands};

// 발행자
pub use publisher::{AlertPublisher, AlertSubscription};

// 개요 집계
pub use overview::{OverviewAggregator, OverviewSnapshot};
