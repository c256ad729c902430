#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`types`]: 로그 소스 정의 (YAML 스키마)
//! - [`loader`]: 디렉토리/파일에서 소스 정의 로드
//! - [`path`]: 경로 매처
//! - [`multiline`]: 멀티라인 블록 조립기
//! - [`extract`]: 추출-추가 포매터
//! - [`watermark`]: 타임스탬프 워터마크 필터
//! - [`group`]: 라인 그룹퍼
//! - [`error`]: 도메인 에러 타입

pub mod error;
pub mod extract;
pub mod group;
pub mod loader;
pub mod multiline;
pub mod path;
pub mod types;
pub mod watermark;

pub use error::SourceError;
pub use loader::SourceLoader;
pub use types::{
    ExtractConfig, GroupingConfig, LogSourceConfig, MultilineConfig, MultilinePriority,
    SourceLine, TimestampConfig,
};

/// 텍스트를 라인 번호(1부터)가 붙은 라인으로 분리합니다.
///
/// 마지막 개행 뒤의 빈 문자열은 라인으로 세지 않습니다.
pub(crate) fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().map(|(idx, line)| (idx + 1, line))
}
