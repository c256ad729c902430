//! 트리거 엔진 에러 타입
//!
//! [`TriggerError`]는 레시피 로딩과 검증에서만 발생합니다.
//! 평가 경로는 에러 대신 [`TriggerReport`](crate::engine::TriggerReport)의 진단을 사용합니다.

use logtrig_core::error::LogtrigError;

/// 트리거 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// 레시피 파일 로딩 실패
    #[error("recipe load error: {path}: {reason}")]
    Load {
        /// 레시피 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 레시피 유효성 검증 실패
    #[error("recipe validation error: recipe '{recipe_id}': {reason}")]
    Validation {
        /// 문제가 된 레시피 ID
        recipe_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TriggerError> for LogtrigError {
    fn from(err: TriggerError) -> Self {
        match err {
            TriggerError::Load { path, reason } => LogtrigError::Definition { path, reason },
            TriggerError::Validation { recipe_id, reason } => LogtrigError::Definition {
                path: recipe_id,
                reason,
            },
            TriggerError::Io(e) => LogtrigError::Io(e),
        }
    }
}
