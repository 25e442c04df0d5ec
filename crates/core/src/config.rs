//! 설정 관리 — flowsentry.toml 파싱 및 런타임 설정
//!
//! [`FlowsentryConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`FLOWSENTRY_CACHE_CAPACITY=300` 형식)
//! 3. 설정 파일 (`flowsentry.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! 심각도 밴드, 캐시 용량/임계값, TTL 등 운영자가 조정하는 값은
//! 모두 여기에서 주입됩니다. 모듈 내부에 상수로 두지 않습니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), flowsentry_core::error::FlowsentryError> {
//! use flowsentry_core::config::FlowsentryConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = FlowsentryConfig::load("flowsentry.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = FlowsentryConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FlowsentryError};

/// Flowsentry 통합 설정
///
/// `flowsentry.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowsentryConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 분류기 설정
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// 예측 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 알림 빌더 설정
    #[serde(default)]
    pub alert: AlertConfig,
    /// 스트리밍 발행자 설정
    #[serde(default)]
    pub publisher: PublisherConfig,
    /// 개요 집계 설정
    #[serde(default)]
    pub overview: OverviewConfig,
    /// 분석 엔진 설정
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    /// 평가 하니스 설정
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Prometheus 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl FlowsentryConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FlowsentryError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowsentryError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FlowsentryError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                FlowsentryError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, FlowsentryError> {
        toml::from_str(toml_str).map_err(|e| {
            FlowsentryError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `FLOWSENTRY_{SECTION}_{FIELD}`
    /// 예: `FLOWSENTRY_CACHE_CAPACITY=500`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "FLOWSENTRY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "FLOWSENTRY_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "FLOWSENTRY_GENERAL_DATA_DIR");

        // Classifier
        override_string(&mut self.classifier.model_dir, "FLOWSENTRY_CLASSIFIER_MODEL_DIR");
        override_string(
            &mut self.classifier.holdout_path,
            "FLOWSENTRY_CLASSIFIER_HOLDOUT_PATH",
        );

        // Cache
        override_usize(&mut self.cache.capacity, "FLOWSENTRY_CACHE_CAPACITY");
        override_usize(
            &mut self.cache.refill_threshold,
            "FLOWSENTRY_CACHE_REFILL_THRESHOLD",
        );
        override_usize(
            &mut self.cache.replenish_batch,
            "FLOWSENTRY_CACHE_REPLENISH_BATCH",
        );
        override_u32(
            &mut self.cache.replenish_max_retries,
            "FLOWSENTRY_CACHE_REPLENISH_MAX_RETRIES",
        );
        override_u64(
            &mut self.cache.replenish_backoff_ms,
            "FLOWSENTRY_CACHE_REPLENISH_BACKOFF_MS",
        );

        // Alert
        override_bool(&mut self.alert.informational, "FLOWSENTRY_ALERT_INFORMATIONAL");
        override_usize(&mut self.alert.top_features, "FLOWSENTRY_ALERT_TOP_FEATURES");
        override_f64(
            &mut self.alert.log_confidence_threshold,
            "FLOWSENTRY_ALERT_LOG_CONFIDENCE_THRESHOLD",
        );

        // Publisher
        override_usize(
            &mut self.publisher.backlog_capacity,
            "FLOWSENTRY_PUBLISHER_BACKLOG_CAPACITY",
        );

        // Overview
        override_usize(&mut self.overview.retention, "FLOWSENTRY_OVERVIEW_RETENTION");
        override_u64(&mut self.overview.ttl_secs, "FLOWSENTRY_OVERVIEW_TTL_SECS");

        // Analytics
        override_u64(&mut self.analytics.window_secs, "FLOWSENTRY_ANALYTICS_WINDOW_SECS");
        override_u64(&mut self.analytics.bucket_secs, "FLOWSENTRY_ANALYTICS_BUCKET_SECS");
        override_usize(
            &mut self.analytics.top_sources,
            "FLOWSENTRY_ANALYTICS_TOP_SOURCES",
        );

        // Evaluation
        override_f64(
            &mut self.evaluation.fp_rate_ceiling,
            "FLOWSENTRY_EVALUATION_FP_RATE_CEILING",
        );
        override_f64(
            &mut self.evaluation.recall_target,
            "FLOWSENTRY_EVALUATION_RECALL_TARGET",
        );
        override_u64(&mut self.evaluation.shuffle_seed, "FLOWSENTRY_EVALUATION_SHUFFLE_SEED");

        // Metrics
        override_bool(&mut self.metrics.enabled, "FLOWSENTRY_METRICS_ENABLED");
        override_u16(&mut self.metrics.port, "FLOWSENTRY_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FlowsentryError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 캐시 용량/임계값 검증
        if self.cache.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.capacity".to_owned(),
                reason: "must be greater than zero".to_owned(),
            }
            .into());
        }
        if self.cache.refill_threshold >= self.cache.capacity {
            return Err(ConfigError::InvalidValue {
                field: "cache.refill_threshold".to_owned(),
                reason: "must be less than cache.capacity".to_owned(),
            }
            .into());
        }
        if self.cache.replenish_batch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.replenish_batch".to_owned(),
                reason: "must be greater than zero".to_owned(),
            }
            .into());
        }

        // 심각도 밴드 검증 (단조성: critical >= high >= medium)
        self.alert.severity_bands.validate("alert.severity_bands")?;
        for (attack, bands) in &self.alert.severity_overrides {
            bands.validate(&format!("alert.severity_overrides.{attack}"))?;
        }

        if self.alert.top_features == 0 {
            return Err(ConfigError::InvalidValue {
                field: "alert.top_features".to_owned(),
                reason: "must be greater than zero".to_owned(),
            }
            .into());
        }

        if self.publisher.backlog_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "publisher.backlog_capacity".to_owned(),
                reason: "must be greater than zero".to_owned(),
            }
            .into());
        }

        if self.overview.retention == 0 {
            return Err(ConfigError::InvalidValue {
                field: "overview.retention".to_owned(),
                reason: "must be greater than zero".to_owned(),
            }
            .into());
        }

        // 분석 윈도우/버킷 검증
        if self.analytics.bucket_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analytics.bucket_secs".to_owned(),
                reason: "must be greater than zero".to_owned(),
            }
            .into());
        }
        if self.analytics.window_secs < self.analytics.bucket_secs {
            return Err(ConfigError::InvalidValue {
                field: "analytics.window_secs".to_owned(),
                reason: "must be at least analytics.bucket_secs".to_owned(),
            }
            .into());
        }

        // 평가 설정 검증
        if !(0.0..=1.0).contains(&self.evaluation.fp_rate_ceiling) {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.fp_rate_ceiling".to_owned(),
                reason: "must be within [0, 1]".to_owned(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.evaluation.recall_target) {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.recall_target".to_owned(),
                reason: "must be within [0, 1]".to_owned(),
            }
            .into());
        }
        if self.evaluation.batch_sizes.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.batch_sizes".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }
        if !self.evaluation.batch_sizes.is_sorted() {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.batch_sizes".to_owned(),
                reason: "must be in ascending order".to_owned(),
            }
            .into());
        }
        if !(0.0..1.0).contains(&self.evaluation.mixed_attack_ratio)
            || self.evaluation.mixed_attack_ratio == 0.0
        {
            return Err(ConfigError::InvalidValue {
                field: "evaluation.mixed_attack_ratio".to_owned(),
                reason: "must be within (0, 1)".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/flowsentry".to_owned(),
        }
    }
}

/// 분류기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// 모델 스펙 JSON 디렉토리
    pub model_dir: String,
    /// 보류(held-out) 데이터셋 경로 (JSON lines)
    pub holdout_path: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_dir: "/etc/flowsentry/models".to_owned(),
            holdout_path: "/var/lib/flowsentry/holdout.jsonl".to_owned(),
        }
    }
}

/// 예측 캐시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 모델별 큐 최대 용량 (C)
    pub capacity: usize,
    /// 리필 스케줄 임계값 (R) — 큐 길이가 이 값 아래로 내려가면 리필
    pub refill_threshold: usize,
    /// 리필 1회당 생성하는 판정 수
    pub replenish_batch: usize,
    /// 리필 실패 시 최대 재시도 횟수
    pub replenish_max_retries: u32,
    /// 재시도 백오프 기본값 (밀리초, 지수 증가)
    pub replenish_backoff_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 300,
            refill_threshold: 100,
            replenish_batch: 100,
            replenish_max_retries: 5,
            replenish_backoff_ms: 200,
        }
    }
}

/// 심각도 밴드 — 신뢰도 임계값
///
/// `confidence >= critical` → Critical, `>= high` → High,
/// `>= medium` → Medium, 그 외 → Low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityBandsConfig {
    /// Critical 임계값
    pub critical: f64,
    /// High 임계값
    pub high: f64,
    /// Medium 임계값
    pub medium: f64,
}

impl Default for SeverityBandsConfig {
    fn default() -> Self {
        Self {
            critical: 0.9,
            high: 0.75,
            medium: 0.5,
        }
    }
}

impl SeverityBandsConfig {
    /// 밴드 단조성과 범위를 검증합니다.
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        for (name, value) in [
            ("critical", self.critical),
            ("high", self.high),
            ("medium", self.medium),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: format!("{field}.{name}"),
                    reason: "must be within [0, 1]".to_owned(),
                });
            }
        }
        if self.critical < self.high || self.high < self.medium {
            return Err(ConfigError::InvalidValue {
                field: field.to_owned(),
                reason: "thresholds must satisfy critical >= high >= medium".to_owned(),
            });
        }
        Ok(())
    }
}

/// 알림 빌더 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// BENIGN 판정도 Info 알림으로 발행할지 여부
    pub informational: bool,
    /// 알림에 포함할 상위 특징 수 (K)
    pub top_features: usize,
    /// 개별 로깅 최소 신뢰도 — 이 값 이상의 high/critical만 개별 로깅
    pub log_confidence_threshold: f64,
    /// 기본 심각도 밴드
    pub severity_bands: SeverityBandsConfig,
    /// 공격 유형별 심각도 밴드 오버라이드 (키: kebab-case 공격 유형)
    pub severity_overrides: HashMap<String, SeverityBandsConfig>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            informational: false,
            top_features: 5,
            log_confidence_threshold: 0.8,
            severity_bands: SeverityBandsConfig::default(),
            severity_overrides: HashMap::new(),
        }
    }
}

/// 스트리밍 발행자 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// 구독자별 백로그 최대 용량 (N)
    pub backlog_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            backlog_capacity: 256,
        }
    }
}

/// 개요 집계 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewConfig {
    /// 보존할 최근 알림 수 (M)
    pub retention: usize,
    /// 개요 캐시 TTL (초)
    pub ttl_secs: u64,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self {
            retention: 500,
            ttl_secs: 60,
        }
    }
}

/// 분석 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// 슬라이딩 윈도우 길이 (초, W)
    pub window_secs: u64,
    /// 버킷 폭 (초, B)
    pub bucket_secs: u64,
    /// top sources 랭킹 크기 (K)
    pub top_sources: usize,
    /// 데몬 분석 갱신 루프 주기 (초)
    pub refresh_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_secs: 3600,
            bucket_secs: 300,
            top_sources: 10,
            refresh_secs: 10,
        }
    }
}

/// 평가 하니스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// 결정 임계값 스윕 그리드 시작
    pub threshold_start: f64,
    /// 결정 임계값 스윕 그리드 끝 (포함)
    pub threshold_end: f64,
    /// 결정 임계값 스윕 간격
    pub threshold_step: f64,
    /// 임계값 선택 시 허용되는 최대 FP rate
    pub fp_rate_ceiling: f64,
    /// 시나리오 성공 기준 recall
    pub recall_target: f64,
    /// Phase 3 배치 크기 (오름차순)
    pub batch_sizes: Vec<usize>,
    /// Phase 3 reconcile 배치의 공격 비율
    pub mixed_attack_ratio: f64,
    /// Phase 1 대비 reconcile 허용 오차
    pub reconcile_tolerance: f64,
    /// stealth-slow 시나리오 공격 밀도 후보 (오름차순)
    pub stealth_densities: Vec<f64>,
    /// 시나리오 셔플 시드 (재현성)
    pub shuffle_seed: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            threshold_start: 0.2,
            threshold_end: 0.9,
            threshold_step: 0.1,
            fp_rate_ceiling: 0.05,
            recall_target: 0.8,
            batch_sizes: vec![100, 500, 1000, 2000],
            mixed_attack_ratio: 0.3,
            reconcile_tolerance: 0.1,
            stealth_densities: vec![0.01, 0.02, 0.05, 0.1],
            shuffle_seed: 42,
        }
    }
}

/// Prometheus 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// HTTP 리스너 바인드 주소
    pub listen_addr: String,
    /// HTTP 리스너 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9095,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

fn override_bool(target: &mut bool, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring invalid boolean override"),
        }
    }
}

fn override_usize(target: &mut usize, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring invalid integer override"),
        }
    }
}

fn override_u16(target: &mut u16, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring invalid integer override"),
        }
    }
}

fn override_u32(target: &mut u32, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring invalid integer override"),
        }
    }
}

fn override_u64(target: &mut u64, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring invalid integer override"),
        }
    }
}

fn override_f64(target: &mut f64, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<f64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring invalid float override"),
        }
    }
}
