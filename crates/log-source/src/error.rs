//! 로그 소스 에러 타입
//!
//! [`SourceError`]는 소스 정의 로딩과 검증에서만 발생합니다.
//! 변환 함수들은 에러 대신 리포트의 `diagnostics`를 사용합니다.

use logtrig_core::error::LogtrigError;

/// 로그 소스 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// 소스 정의 파일 로딩 실패
    #[error("source load error: {path}: {reason}")]
    Load {
        /// 정의 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 소스 정의 유효성 검증 실패
    #[error("source validation error: source '{source_id}': {reason}")]
    Validation {
        /// 문제가 된 소스 ID
        source_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SourceError> for LogtrigError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Load { path, reason } => LogtrigError::Definition { path, reason },
            SourceError::Validation { source_id, reason } => LogtrigError::Definition {
                path: source_id,
                reason,
            },
            SourceError::Io(e) => LogtrigError::Io(e),
        }
    }
}
