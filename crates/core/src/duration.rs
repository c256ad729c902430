//! 기간 파서 -- `"10 seconds"`, `"1 minutes"` 형식의 사람이 읽는 기간 문자열
//!
//! 파싱할 수 없는 입력은 에러가 아니라 "미설정"으로 취급됩니다.
//! [`DurationSpec`]은 원본 문자열과 파싱 결과를 함께 보관하여 두 가지 용도를 모두 지원합니다.
//! - 수치 계산 경로(윈도우 계산)는 [`DurationSpec::window_millis`]를 사용하며,
//!   파싱 실패나 0은 "윈도우 없음(무제한)"으로 봅니다.
//! - 표시 경로는 [`Display`](std::fmt::Display)로 원본 문자열을 그대로 보여줍니다.

use std::fmt;

use serde::{Deserialize, Serialize};

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;

/// `"<정수> <단위>"` 문자열을 밀리초로 변환합니다.
///
/// 단위는 `second`, `minute`, `hour` (대소문자 무시, 끝의 `s` 선택)입니다.
/// 형식이 맞지 않으면 `None`을 반환합니다.
pub fn parse_duration(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if digits_end == 0 {
        return None;
    }

    let amount: u64 = trimmed[..digits_end].parse().ok()?;
    let unit = trimmed[digits_end..].trim().to_ascii_lowercase();
    let unit = unit.strip_suffix('s').unwrap_or(&unit);

    let factor = match unit {
        "second" => MILLIS_PER_SECOND,
        "minute" => MILLIS_PER_MINUTE,
        "hour" => MILLIS_PER_HOUR,
        _ => return None,
    };
    amount.checked_mul(factor)
}

/// 원본 문자열을 보존하는 기간 값
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DurationSpec {
    raw: String,
    millis: Option<u64>,
}

impl DurationSpec {
    /// 문자열에서 기간을 생성합니다. 파싱 실패도 값으로 보존됩니다.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let millis = parse_duration(&raw);
        Self { raw, millis }
    }

    /// 원본 문자열
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// 파싱된 밀리초 (파싱 실패 시 `None`, `"0 seconds"`는 `Some(0)`)
    pub fn millis(&self) -> Option<u64> {
        self.millis
    }

    /// 윈도우 계산용 밀리초. 파싱 실패와 0은 모두 "윈도우 없음"입니다.
    pub fn window_millis(&self) -> Option<u64> {
        self.millis.filter(|ms| *ms > 0)
    }

    /// 윈도우 계산용 [`chrono::TimeDelta`]
    pub fn window(&self) -> Option<chrono::TimeDelta> {
        self.window_millis()
            .and_then(|ms| i64::try_from(ms).ok())
            .map(chrono::TimeDelta::milliseconds)
    }
}

impl From<String> for DurationSpec {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for DurationSpec {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<DurationSpec> for String {
    fn from(spec: DurationSpec) -> Self {
        spec.raw
    }
}

impl fmt::Display for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
