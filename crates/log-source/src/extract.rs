//! 추출-추가 포매터
//!
//! 파일 경로에서 캡처한 값(최대 5개)으로 형식 문자열의 `@1`..`@5`를 치환하고,
//! 그 결과를 모든 입력 라인의 지정 오프셋에 삽입합니다.
//!
//! 오프셋은 문자 단위입니다.
//! - `offset <= 0`: 라인 앞에 추가
//! - `offset >= 라인 길이`: 라인 뒤에 추가
//! - 그 외: 해당 위치에 삽입

use logtrig_core::metrics::{LABEL_TRANSFORM, SOURCE_LINES_PROCESSED_TOTAL};
use logtrig_core::pattern::compile_or_diagnose;
use metrics::counter;
use serde::Serialize;

use crate::types::ExtractConfig;

/// 경로 패턴에서 사용하는 최대 캡처 그룹 수
pub const MAX_PATH_GROUPS: usize = 5;

/// 추출-추가 리포트
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractReport {
    /// 경로 패턴이 파일 경로와 매칭되었는지 여부
    pub matched: bool,
    /// `@1`..`@5`에 대응하는 캡처 값 (없는 그룹은 빈 문자열)
    pub captures: Vec<String>,
    /// 치환된 삽입 문자열
    pub inserted: String,
    /// 변환된 라인
    pub lines: Vec<String>,
    pub diagnostics: Vec<String>,
}

/// 파일 경로와 텍스트에 추출-추가를 적용합니다.
///
/// 경로 패턴이 매칭되지 않으면 라인을 변경하지 않고 `matched = false`를 반환합니다.
pub fn extract_append(config: &ExtractConfig, path: &str, text: &str) -> ExtractReport {
    let mut report = ExtractReport::default();

    let captures = compile_or_diagnose(&config.path_pattern, None, &mut report.diagnostics)
        .and_then(|p| p.numbered_captures(path, MAX_PATH_GROUPS));

    let Some(captures) = captures else {
        tracing::debug!(path, pattern = %config.path_pattern, "path pattern did not match");
        report.lines = text.lines().map(str::to_owned).collect();
        return report;
    };

    let inserted = substitute(&config.format, &captures);
    report.lines = text
        .lines()
        .map(|line| insert_at(line, &inserted, config.offset))
        .collect();
    report.matched = true;
    report.captures = captures;
    report.inserted = inserted;

    counter!(SOURCE_LINES_PROCESSED_TOTAL, LABEL_TRANSFORM => "extract")
        .increment(report.lines.len() as u64);

    report
}

/// 형식 문자열의 `@1`..`@5`를 캡처 값으로 치환합니다.
///
/// 한 번의 스캔으로 치환하므로 캡처 값 안의 `@n`은 다시 치환되지 않습니다.
pub fn substitute(format: &str, captures: &[String]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '@'
            && let Some(&d) = chars.peek()
            && let Some(n) = d.to_digit(10)
            && (1..=MAX_PATH_GROUPS as u32).contains(&n)
        {
            chars.next();
            if let Some(value) = captures.get(n as usize - 1) {
                out.push_str(value);
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// 라인의 문자 오프셋 위치에 문자열을 삽입합니다.
pub fn insert_at(line: &str, insert: &str, offset: i64) -> String {
    let mut out = String::with_capacity(line.len() + insert.len());
    if offset <= 0 {
        out.push_str(insert);
        out.push_str(line);
        return out;
    }

    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    match line.char_indices().nth(offset) {
        Some((byte_idx, _)) => {
            out.push_str(&line[..byte_idx]);
            out.push_str(insert);
            out.push_str(&line[byte_idx..]);
        }
        None => {
            out.push_str(line);
            out.push_str(insert);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(format: &str, offset: i64) -> ExtractConfig {
        ExtractConfig {
            path_pattern: r"/var/log/(\w+)/(\w+)\.log".to_owned(),
            format: format.to_owned(),
            offset,
        }
    }

    #[test]
    fn captures_are_substituted_and_prepended() {
        let report = extract_append(&config("[@1/@2] ", 0), "/var/log/app/auth.log", "a\nb");
        assert!(report.matched);
        assert_eq!(report.inserted, "[app/auth] ");
        assert_eq!(report.lines, vec!["[app/auth] a", "[app/auth] b"]);
    }

    #[test]
    fn absent_groups_become_empty() {
        let report = extract_append(&config("<@3@5>", 0), "/var/log/app/auth.log", "x");
        assert_eq!(report.lines, vec!["<>x"]);
    }

    #[test]
    fn unmatched_path_leaves_lines_unchanged() {
        let report = extract_append(&config("@1", 0), "/tmp/other.txt", "a\nb");
        assert!(!report.matched);
        assert_eq!(report.lines, vec!["a", "b"]);
    }

    #[test]
    fn offset_splices_inside_line() {
        assert_eq!(insert_at("abcdef", "|", 3), "abc|def");
    }

    #[test]
    fn offset_past_end_appends() {
        assert_eq!(insert_at("abc", "|", 3), "abc|");
        assert_eq!(insert_at("abc", "|", 99), "abc|");
    }

    #[test]
    fn negative_offset_prepends() {
        assert_eq!(insert_at("abc", "|", -4), "|abc");
    }

    #[test]
    fn offset_counts_characters_not_bytes() {
        assert_eq!(insert_at("가나다", "|", 1), "가|나다");
    }

    #[test]
    fn substitution_does_not_recurse_into_values() {
        let captures = vec!["@2".to_owned(), "two".to_owned()];
        assert_eq!(substitute("@1-@2", &captures), "@2-two");
    }

    #[test]
    fn non_group_markers_are_kept() {
        let captures = vec!["one".to_owned()];
        assert_eq!(substitute("a@b @9 @0 @1", &captures), "a@b @9 @0 one");
    }

    #[test]
    fn invalid_path_pattern_is_diagnosed() {
        let mut cfg = config("@1", 0);
        cfg.path_pattern = "(".to_owned();
        let report = extract_append(&cfg, "/var/log/app/auth.log", "a");
        assert!(!report.matched);
        assert_eq!(report.diagnostics.len(), 1);
    }
}
