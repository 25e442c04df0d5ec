#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`timestamp`]: 결정적 타임스탬프 해석 (기본 필드 → 구조화 ID 폴백 → 드롭)
//! - [`bucket`]: 시간 버킷과 카운트 흡수
//! - [`engine`]: 증분 병합, 윈도우 제거, 갭 필링, 파생 시계열

pub mod bucket;
pub mod engine;
pub mod timestamp;

// --- 주요 타입 re-export ---

pub use bucket::{SourceCounts, TimeBucket, bucket_start};
pub use engine::{
    AnalyticsEngine, AnalyticsParams, AnalyticsSummary, BucketSummary, MergeOutcome, TopSource,
    analyze,
};
pub use timestamp::resolve_timestamp;
