//! 에러 타입 -- 도메인별 에러 정의

/// logtrig 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogtrigError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 패턴 컴파일 에러
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// 정의 파일(트리거 레시피, 로그 소스) 로딩 에러
    #[error("definition error: {path}: {reason}")]
    Definition {
        /// 정의 파일 경로 또는 식별자
        path: String,
        /// 실패 사유
        reason: String,
    },

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

/// 패턴 컴파일 에러
///
/// 엔진은 이 에러를 스캔 중단 사유로 쓰지 않습니다.
/// 진단 문자열로 기록되고 해당 패턴은 "절대 매칭되지 않음"으로 취급됩니다.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    /// 정규식 컴파일 실패
    #[error("invalid pattern '{pattern}': {reason}")]
    Invalid { pattern: String, reason: String },
}
