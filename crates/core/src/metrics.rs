//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `flowsentry_`
//! - 모듈명: `cache_`, `alerts_`, `publisher_`, `analytics_`, `eval_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 모델 레이블 키 (syn-flood, port-scan, ...)
pub const LABEL_MODEL: &str = "model";

/// 심각도 레이블 키 (info, low, medium, high, critical)
pub const LABEL_SEVERITY: &str = "severity";

/// 공격 유형 레이블 키
pub const LABEL_ATTACK_TYPE: &str = "attack_type";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Prediction Cache 메트릭 ───────────────────────────────────────

/// Cache: pop 성공 수 (counter, label: model)
pub const CACHE_HITS_TOTAL: &str = "flowsentry_cache_hits_total";

/// Cache: 캐시 소진 수 (counter, label: model)
pub const CACHE_MISSES_TOTAL: &str = "flowsentry_cache_misses_total";

/// Cache: 동기 폴백 호출 수 (counter, label: model)
pub const CACHE_SYNC_FALLBACKS_TOTAL: &str = "flowsentry_cache_sync_fallbacks_total";

/// Cache: 리필 실행 수 (counter, label: model, result)
pub const CACHE_REPLENISH_TOTAL: &str = "flowsentry_cache_replenish_total";

/// Cache: 현재 큐 길이 (gauge, label: model)
pub const CACHE_QUEUE_LENGTH: &str = "flowsentry_cache_queue_length";

/// Cache: 리필 소요 시간 (histogram, 초)
pub const CACHE_REPLENISH_DURATION_SECONDS: &str = "flowsentry_cache_replenish_duration_seconds";

// ─── Alert Builder / Publisher 메트릭 ──────────────────────────────

/// Alerts: 생성된 알림 수 (counter, label: severity, attack_type)
pub const ALERTS_BUILT_TOTAL: &str = "flowsentry_alerts_built_total";

/// Alerts: BENIGN 판정으로 억제된 수 (counter)
pub const ALERTS_SUPPRESSED_BENIGN_TOTAL: &str = "flowsentry_alerts_suppressed_benign_total";

/// Alerts: 드롭된 판정 수 — 분류기 에러 (counter)
pub const DETECTIONS_DROPPED_TOTAL: &str = "flowsentry_detections_dropped_total";

/// Publisher: 발행된 알림 수 (counter)
pub const PUBLISHER_PUBLISHED_TOTAL: &str = "flowsentry_publisher_published_total";

/// Publisher: 백로그 초과로 드롭된 알림 수 (counter)
pub const PUBLISHER_DROPPED_TOTAL: &str = "flowsentry_publisher_dropped_total";

/// Publisher: 활성 구독자 수 (gauge)
pub const PUBLISHER_SUBSCRIBERS: &str = "flowsentry_publisher_subscribers";

// ─── Overview / Analytics 메트릭 ───────────────────────────────────

/// Overview: 캐시 적중으로 응답한 수 (counter)
pub const OVERVIEW_CACHE_HITS_TOTAL: &str = "flowsentry_overview_cache_hits_total";

/// Overview: 재계산 수 (counter)
pub const OVERVIEW_RECOMPUTES_TOTAL: &str = "flowsentry_overview_recomputes_total";

/// Analytics: 병합된 알림 수 (counter)
pub const ANALYTICS_MERGED_TOTAL: &str = "flowsentry_analytics_merged_total";

/// Analytics: 타임스탬프 불량으로 드롭된 레코드 수 (counter)
pub const ANALYTICS_DATA_ERRORS_TOTAL: &str = "flowsentry_analytics_data_errors_total";

/// Analytics: 현재 버킷 수 (gauge)
pub const ANALYTICS_BUCKETS: &str = "flowsentry_analytics_buckets";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 등록된 모듈 수 (gauge)
pub const DAEMON_MODULES: &str = "flowsentry_daemon_modules";

// ─── Evaluation 메트릭 ─────────────────────────────────────────────

/// Eval: 완료된 단계 수 (counter, label: result)
pub const EVAL_PHASES_TOTAL: &str = "flowsentry_eval_phases_total";

/// Eval: Phase 3 배치 처리 시간 (histogram, 초)
pub const EVAL_BATCH_DURATION_SECONDS: &str = "flowsentry_eval_batch_duration_seconds";
