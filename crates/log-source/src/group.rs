//! 라인 그룹퍼 -- 연속 라인을 고정 크기 그룹으로 묶습니다.
//!
//! `must_match`가 있으면 매칭되는 라인만 버퍼에 들어가고, 나머지는 버퍼를
//! 거치지 않고 `bypassed`로 보고됩니다. 입력이 끝났을 때 남은 버퍼는 그룹으로
//! 내보내지 않고 미완성 그룹으로 보고합니다.

use logtrig_core::metrics::{LABEL_TRANSFORM, SOURCE_LINES_PROCESSED_TOTAL};
use logtrig_core::pattern::compile_or_diagnose;
use metrics::counter;
use serde::Serialize;

use crate::numbered_lines;
use crate::types::{GroupingConfig, SourceLine};

/// 그룹 내 라인 구분자
pub const GROUP_SEPARATOR: &str = "{{SEP}}";

/// 완성된 그룹
#[derive(Debug, Clone, Serialize)]
pub struct LineGroup {
    pub lines: Vec<SourceLine>,
    /// 라인을 [`GROUP_SEPARATOR`]로 연결한 텍스트
    pub text: String,
}

/// 그룹핑 리포트
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupReport {
    pub groups: Vec<LineGroup>,
    /// `must_match`와 매칭되지 않아 버퍼를 거치지 않은 라인
    pub bypassed: Vec<SourceLine>,
    /// 입력 종료 시 버퍼가 비어 있지 않았는지 여부
    pub incomplete_group: bool,
    /// 미완성 그룹에 남은 라인
    pub buffered: Vec<SourceLine>,
    pub diagnostics: Vec<String>,
}

/// 텍스트를 그룹으로 묶습니다.
///
/// `count`가 0이면 1로 취급합니다.
pub fn group_lines(config: &GroupingConfig, text: &str) -> GroupReport {
    let mut report = GroupReport::default();
    let size = config.count.max(1);

    let filter = config
        .must_match
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| compile_or_diagnose(p, None, &mut report.diagnostics));

    let mut buffer: Vec<SourceLine> = Vec::with_capacity(size);
    let mut processed = 0u64;
    for (line_number, line) in numbered_lines(text) {
        processed += 1;
        let accepted = match filter {
            None => true,
            Some(Some(ref p)) => p.is_match(line),
            // 컴파일 실패한 필터는 아무 라인도 받지 않음
            Some(None) => false,
        };
        if !accepted {
            report.bypassed.push(SourceLine::new(line_number, line));
            continue;
        }

        buffer.push(SourceLine::new(line_number, line));
        if buffer.len() == size {
            let lines = std::mem::replace(&mut buffer, Vec::with_capacity(size));
            report.groups.push(make_group(lines));
        }
    }

    report.incomplete_group = !buffer.is_empty();
    report.buffered = buffer;

    counter!(SOURCE_LINES_PROCESSED_TOTAL, LABEL_TRANSFORM => "group").increment(processed);

    report
}

fn make_group(lines: Vec<SourceLine>) -> LineGroup {
    let text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join(GROUP_SEPARATOR);
    LineGroup { lines, text }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(count: usize, must_match: Option<&str>) -> GroupingConfig {
        GroupingConfig {
            count,
            must_match: must_match.map(str::to_owned),
        }
    }

    #[test]
    fn seven_lines_in_threes_leave_one_buffered() {
        let text = "1\n2\n3\n4\n5\n6\n7";
        let report = group_lines(&config(3, None), text);
        assert_eq!(report.groups.len(), 2);
        assert!(report.incomplete_group);
        assert_eq!(report.buffered, vec![SourceLine::new(7, "7")]);
        assert_eq!(report.groups[0].text, "1{{SEP}}2{{SEP}}3");
    }

    #[test]
    fn exact_multiple_is_complete() {
        let report = group_lines(&config(2, None), "a\nb\nc\nd\n");
        assert_eq!(report.groups.len(), 2);
        assert!(!report.incomplete_group);
        assert!(report.buffered.is_empty());
    }

    #[test]
    fn non_matching_lines_bypass_the_buffer() {
        let text = "ERROR a\ninfo\nERROR b\nERROR c";
        let report = group_lines(&config(2, Some("ERROR.*")), text);
        assert_eq!(report.bypassed, vec![SourceLine::new(2, "info")]);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].text, "ERROR a{{SEP}}ERROR b");
        assert_eq!(report.buffered, vec![SourceLine::new(4, "ERROR c")]);
    }

    #[test]
    fn invalid_filter_bypasses_everything() {
        let report = group_lines(&config(2, Some("(")), "a\nb");
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.bypassed.len(), 2);
        assert!(report.groups.is_empty());
    }

    #[test]
    fn zero_count_groups_single_lines() {
        let report = group_lines(&config(0, None), "a\nb");
        assert_eq!(report.groups.len(), 2);
    }
}
