//! 에러 타입 — 도메인별 에러 정의

/// Flowsentry 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum FlowsentryError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 분류기 에러
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// 예측 캐시 에러
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 분석 엔진 에러
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    /// 평가 하니스 에러
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 분류기 에러
///
/// 항상 로컬에서 처리되어 드롭 카운터로 변환되며,
/// 원시 형태로 상위에 전파되지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// 특징 벡터 스키마 불일치
    #[error("schema mismatch for model '{model_id}': expected {expected} features, got {actual}")]
    SchemaMismatch {
        model_id: String,
        expected: usize,
        actual: usize,
    },

    /// 유효하지 않은 특징 값 (NaN, Inf 등)
    #[error("invalid feature value at index {index}: {reason}")]
    InvalidFeature { index: usize, reason: String },

    /// 등록되지 않은 모델
    #[error("model not found: {model_id}")]
    ModelNotFound { model_id: String },

    /// 중복된 모델 ID 등록 시도
    #[error("duplicate model id: {model_id}")]
    DuplicateModel { model_id: String },

    /// 모델 스펙 로딩 실패
    #[error("model load error: {path}: {reason}")]
    ModelLoad { path: String, reason: String },
}

/// 예측 캐시 에러
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// 캐시 소진 + 동기 폴백 실패
    ///
    /// 치명적이지 않습니다. 호출자는 백오프 후 재시도합니다.
    #[error("prediction cache empty for model '{model_id}' and fallback failed")]
    Empty { model_id: String },

    /// 캐시에 등록되지 않은 모델
    #[error("unknown model in cache: {model_id}")]
    UnknownModel { model_id: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중인 파이프라인 재시작 시도
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아닌 파이프라인 정지 시도
    #[error("pipeline not running")]
    NotRunning,

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 분석 엔진 에러
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// 유효하지 않은 윈도우/버킷 파라미터
    #[error("invalid analytics params: {reason}")]
    InvalidParams { reason: String },
}

/// 평가 하니스 에러
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// 시나리오 구성에 필요한 레이블 행 부족
    ///
    /// 해당 단계는 skipped로 기록되고 실행은 계속됩니다.
    #[error(
        "insufficient data for '{scenario}': need {needed} {label} rows, have {available}"
    )]
    InsufficientData {
        scenario: String,
        label: String,
        needed: usize,
        available: usize,
    },

    /// Phase 3 라이브 대상 연결 실패
    ///
    /// 단계 수준 실패이며 다른 단계에는 영향을 주지 않습니다.
    #[error("live target unreachable: {target}: {reason}")]
    Connection { target: String, reason: String },

    /// 실행 중 취소됨
    #[error("evaluation cancelled")]
    Cancelled,

    /// 유효하지 않은 평가 파라미터
    #[error("invalid evaluation params: {reason}")]
    InvalidParams { reason: String },
}
