//! 로그 소스 정의 데이터 타입
//!
//! YAML 소스 정의 파일에서 역직렬화되는 구조체들을 정의합니다.

use logtrig_core::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// 로그 소스 정의 -- 하나의 YAML 파일에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// id: auth
/// directory: /var/log/app
/// date_directory: yyyyMMdd
/// prefix: "auth-{yyyy-MM-dd}"
/// suffix: ".log"
/// exclude_suffixes: [".gz"]
/// timestamp:
///   pattern: "^(\\d{4}-\\d{2}-\\d{2} \\d{2}:\\d{2}:\\d{2})"
///   format: "yyyy-MM-dd HH:mm:ss"
/// multiline: { start_pattern: "\\d{4}-.*", end_pattern: "END", max_lines: 50, priority: start }
/// extract: { path_pattern: "/var/log/(\\w+)/(\\w+)\\.log", format: "[@1/@2] ", offset: 0 }
/// grouping: { count: 3, must_match: "ERROR.*" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSourceConfig {
    /// 소스 고유 ID (레시피의 `source`가 참조)
    pub id: String,
    /// 표시용 이름
    #[serde(default)]
    pub title: String,
    /// 로그 파일 디렉토리
    #[serde(default)]
    pub directory: String,
    /// 날짜 하위 디렉토리 형식 (예: `yyyyMMdd`)
    #[serde(default)]
    pub date_directory: Option<String>,
    /// 파일명 접두어 (`{형식}` 날짜 토큰 허용)
    #[serde(default)]
    pub prefix: String,
    /// 파일명 접미어 (`{형식}` 날짜 토큰 허용)
    #[serde(default)]
    pub suffix: String,
    /// 파일명에 포함되어야 하는 문자열 (`{형식}` 날짜 토큰 허용)
    #[serde(default)]
    pub wildcard: String,
    /// 제외할 파일명 접미어 목록
    #[serde(default)]
    pub exclude_suffixes: Vec<String>,
    /// 라인 타임스탬프 설정
    #[serde(default)]
    pub timestamp: Option<TimestampConfig>,
    /// 멀티라인 블록 설정
    #[serde(default)]
    pub multiline: Option<MultilineConfig>,
    /// 추출-추가 설정
    #[serde(default)]
    pub extract: Option<ExtractConfig>,
    /// 라인 그룹핑 설정
    #[serde(default)]
    pub grouping: Option<GroupingConfig>,
}

impl LogSourceConfig {
    /// 소스 정의의 유효성을 검증합니다.
    ///
    /// 패턴과 타임스탬프 형식은 검증하지 않습니다.
    /// 이들은 실행 시점에 진단으로 보고됩니다.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.id.trim().is_empty() {
            return Err(SourceError::Validation {
                source_id: "(empty)".to_owned(),
                reason: "source id must not be empty".to_owned(),
            });
        }

        if self.id.len() > 256 {
            return Err(SourceError::Validation {
                source_id: self.id.clone(),
                reason: "source id must not exceed 256 characters".to_owned(),
            });
        }

        if let Some(ref multiline) = self.multiline
            && multiline.start_pattern.is_empty()
        {
            return Err(SourceError::Validation {
                source_id: self.id.clone(),
                reason: "multiline start_pattern must not be empty".to_owned(),
            });
        }

        if let Some(ref grouping) = self.grouping
            && grouping.count == 0
        {
            return Err(SourceError::Validation {
                source_id: self.id.clone(),
                reason: "grouping count must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }

    /// 라인 타임스탬프 형식을 컴파일합니다. 설정이 없거나 토큰이 없으면 `None`입니다.
    pub fn timestamp_format(&self) -> Option<TimestampFormat> {
        self.timestamp
            .as_ref()
            .and_then(|ts| TimestampFormat::new(&ts.format))
    }
}

/// 라인 타임스탬프 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimestampConfig {
    /// 타임스탬프 부분 문자열을 찾는 정규식 (첫 번째 캡처 그룹 우선)
    ///
    /// 비어 있으면 `format`에서 만든 추출 정규식을 사용합니다.
    #[serde(default)]
    pub pattern: String,
    /// 토큰 기반 타임스탬프 형식
    pub format: String,
}

/// 멀티라인 블록 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultilineConfig {
    /// 블록 시작 패턴 (라인 전체 매칭)
    pub start_pattern: String,
    /// 블록 종료 패턴 (라인 전체 매칭)
    #[serde(default)]
    pub end_pattern: Option<String>,
    /// 블록 최대 라인 수 (`0`은 미설정)
    #[serde(default)]
    pub max_lines: Option<usize>,
    /// 수집 중 시작 패턴을 만났을 때의 우선순위
    #[serde(default)]
    pub priority: MultilinePriority,
}

impl MultilineConfig {
    /// 유효한 최대 라인 수 (`None` 또는 `0`은 제한 없음)
    pub fn line_limit(&self) -> Option<usize> {
        self.max_lines.filter(|n| *n > 0)
    }
}

/// 멀티라인 우선순위
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultilinePriority {
    /// 시작 패턴이 현재 블록을 닫고 새 블록을 엽니다 (기본값)
    #[default]
    Start,
    /// 라인 수 제한이 있으면 시작 패턴도 일반 내용으로 취급합니다
    Count,
}

/// 추출-추가 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// 파일 경로에 전체 매칭할 정규식 (캡처 그룹 최대 5개)
    pub path_pattern: String,
    /// `@1`..`@5` 자리표시자를 포함하는 출력 형식
    pub format: String,
    /// 삽입 위치 (문자 단위, `0` 이하는 앞에 추가)
    #[serde(default)]
    pub offset: i64,
}

/// 라인 그룹핑 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// 그룹당 라인 수
    pub count: usize,
    /// 그룹에 포함할 라인의 패턴 (라인 전체 매칭, 없으면 모든 라인)
    #[serde(default)]
    pub must_match: Option<String>,
}

/// 라인 번호(1부터)가 붙은 라인
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLine {
    pub line_number: usize,
    pub text: String,
}

impl SourceLine {
    pub fn new(line_number: usize, text: impl Into<String>) -> Self {
        Self {
            line_number,
            text: text.into(),
        }
    }
}
