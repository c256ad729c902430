//! 패턴 컴파일러 -- 선언형 플레이스홀더 문법을 정규식으로 변환합니다.
//!
//! # 지원 문법
//! - `<<name>>`: 공백이 아닌 문자열을 `name`으로 캡처 (`(?P<name>\S+)`)
//! - `(<<name>>inner)`: 명시적인 하위 패턴 `inner`를 `name`으로 캡처 (`(?P<name>inner)`)
//! - `@<<name>>@`: 이전에 캡처된 `name` 값으로 치환 (정규식 메타문자는 이스케이프)
//!
//! 컴파일된 정규식은 항상 라인 전체 매칭입니다. 양 끝에 `^`/`$`가 없으면 추가합니다.
//! 부분 매칭은 트리거 이벤트로 인정되지 않습니다.
//!
//! # 사용 예시
//! ```
//! use logtrig_core::pattern::CompiledPattern;
//!
//! let pattern = CompiledPattern::compile("code: (<<code>>[A-Z0-9]+)").unwrap();
//! let caps = pattern.captures("code: ABC1").unwrap();
//! assert_eq!(caps.get("code"), Some("ABC1"));
//! ```

use metrics::counter;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::PatternError;
use crate::metrics::PATTERN_COMPILE_ERRORS_TOTAL;

/// 이름이 붙은 캡처 값 목록
///
/// 패턴 내 그룹 순서를 보존합니다. MULTI 인스턴스 키는
/// 이 순서상 첫 번째 값으로 결정됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures(Vec<(String, String)>);

impl Captures {
    /// 빈 캡처 목록을 생성합니다.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// 캡처 값을 추가합니다. 같은 이름이 이미 있으면 값을 교체합니다.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// 이름으로 캡처 값을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// 패턴 순서상 첫 번째 캡처를 반환합니다.
    pub fn first(&self) -> Option<(&str, &str)> {
        self.0.first().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Captures {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// 컴파일된 패턴
///
/// 원본 패턴 문자열, 확장된 정규식 소스, 컴파일된 [`Regex`]를 함께 보관합니다.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    expanded: String,
    regex: Regex,
}

impl CompiledPattern {
    /// 역참조 바인딩 없이 패턴을 컴파일합니다.
    ///
    /// 해석되지 않은 `@<<name>>@`은 리터럴 텍스트로 남습니다.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        Self::compile_with(pattern, None)
    }

    /// 역참조 바인딩을 적용하여 패턴을 컴파일합니다.
    pub fn compile_with(pattern: &str, bindings: Option<&Captures>) -> Result<Self, PatternError> {
        let expanded = anchor(&expand(pattern, bindings));
        let regex = Regex::new(&expanded).map_err(|e| PatternError::Invalid {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            expanded,
            regex,
        })
    }

    /// 원본 패턴 문자열
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 플레이스홀더 확장과 앵커링이 적용된 정규식 소스
    pub fn expanded(&self) -> &str {
        &self.expanded
    }

    /// 라인 전체가 패턴과 매칭되는지 확인합니다.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// 매칭에 성공하면 이름 있는 캡처를 패턴 순서대로 반환합니다.
    ///
    /// 매칭에 참여하지 않은 그룹은 결과에서 제외됩니다.
    pub fn captures(&self, line: &str) -> Option<Captures> {
        let caps = self.regex.captures(line)?;
        let mut out = Captures::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                out.insert(name, m.as_str());
            }
        }
        Some(out)
    }

    /// 번호 캡처 그룹 값을 반환합니다 (1부터 시작, 없는 그룹은 빈 문자열).
    pub fn numbered_captures(&self, text: &str, max: usize) -> Option<Vec<String>> {
        let caps = self.regex.captures(text)?;
        Some(
            (1..=max)
                .map(|i| {
                    caps.get(i)
                        .map(|m| m.as_str().to_owned())
                        .unwrap_or_default()
                })
                .collect(),
        )
    }
}

/// 패턴을 컴파일하고, 실패하면 진단 문자열을 기록한 뒤 `None`을 반환합니다.
///
/// 엔진의 공통 진입점입니다. 실패한 패턴은 "절대 매칭되지 않음"으로 취급됩니다.
pub fn compile_or_diagnose(
    pattern: &str,
    bindings: Option<&Captures>,
    diagnostics: &mut Vec<String>,
) -> Option<CompiledPattern> {
    match CompiledPattern::compile_with(pattern, bindings) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "pattern compile failed, treating as never-match");
            counter!(PATTERN_COMPILE_ERRORS_TOTAL).increment(1);
            diagnostics.push(e.to_string());
            None
        }
    }
}

/// 플레이스홀더를 정규식 문법으로 확장합니다.
///
/// 식별자가 아닌 이름(`<<1bad>>`, `<< x >>`)은 플레이스홀더로 보지 않고 리터럴로 남깁니다.
fn expand(pattern: &str, bindings: Option<&Captures>) -> String {
    let mut out = String::with_capacity(pattern.len() + 16);
    let mut rest = pattern;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("@<<")
            && let Some(end) = after.find(">>@")
            && is_valid_name(&after[..end])
        {
            let name = &after[..end];
            match bindings.and_then(|b| b.get(name)) {
                Some(value) => out.push_str(&regex::escape(value)),
                None => out.push_str(&regex::escape(&format!("@<<{name}>>@"))),
            }
            rest = &after[end + 3..];
            continue;
        }

        if let Some(after) = rest.strip_prefix("(<<")
            && let Some(end) = after.find(">>")
            && is_valid_name(&after[..end])
        {
            let name = &after[..end];
            out.push_str("(?P<");
            out.push_str(name);
            out.push('>');
            rest = &after[end + 2..];
            continue;
        }

        if let Some(after) = rest.strip_prefix("<<")
            && let Some(end) = after.find(">>")
            && is_valid_name(&after[..end])
        {
            let name = &after[..end];
            out.push_str("(?P<");
            out.push_str(name);
            out.push_str(r">\S+)");
            rest = &after[end + 2..];
            continue;
        }

        // 이스케이프 시퀀스는 다음 문자까지 그대로 복사
        let mut chars = rest.chars();
        let Some(c) = chars.next() else { break };
        out.push(c);
        if c == '\\'
            && let Some(next) = chars.next()
        {
            out.push(next);
        }
        rest = chars.as_str();
    }

    out
}

/// 전체 매칭 앵커를 추가합니다. 최상위 alternation도 통째로 감쌉니다.
fn anchor(expanded: &str) -> String {
    format!("^(?:{expanded})$")
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
