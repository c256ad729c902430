//! 경로 매처 -- 후보 파일 경로가 오늘 생성될 로그 경로와 일치하는지 검사합니다.
//!
//! 검사 순서는 고정입니다.
//!
//! ```text
//! 디렉토리 -> 날짜 디렉토리 -> 파일명 필터 -> 접두어 -> 접미어 -> 와일드카드 -> 제외 접미어
//! ```
//!
//! 첫 실패에서 중단하며, 수행한 검사를 순서대로 [`PathMatchReport::steps`]에 남깁니다.
//! 날짜 디렉토리는 달력 범위가 아니라 "오늘" 렌더링 값과의 일치 여부만 봅니다.

use chrono::NaiveDateTime;
use logtrig_core::metrics::{LABEL_TRANSFORM, SOURCE_LINES_PROCESSED_TOTAL};
use logtrig_core::timestamp::{TimestampFormat, resolve_date_tokens};
use metrics::counter;
use serde::Serialize;

use crate::types::LogSourceConfig;

/// 경로 검사 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathCheckKind {
    Directory,
    DateDirectory,
    FilenameFilter,
    Prefix,
    Suffix,
    Wildcard,
    ExcludeSuffix,
}

impl PathCheckKind {
    /// 사람이 읽는 레이블
    pub fn label(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::DateDirectory => "date directory",
            Self::FilenameFilter => "filename filter",
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
            Self::Wildcard => "wildcard",
            Self::ExcludeSuffix => "exclude suffix",
        }
    }
}

/// 단일 검사 결과
#[derive(Debug, Clone, Serialize)]
pub struct PathCheck {
    pub kind: PathCheckKind,
    pub passed: bool,
    pub detail: String,
}

/// 경로 매칭 리포트
#[derive(Debug, Clone, Serialize)]
pub struct PathMatchReport {
    /// 검사한 경로
    pub path: String,
    /// 모든 검사를 통과했는지 여부
    pub matched: bool,
    /// 수행한 검사 (실패한 검사에서 끝남)
    pub steps: Vec<PathCheck>,
}

/// 후보 경로를 소스 정의에 대해 검사합니다.
///
/// `today`는 날짜 디렉토리와 `{형식}` 날짜 토큰을 렌더링하는 기준 시각입니다.
pub fn match_path(config: &LogSourceConfig, path: &str, today: &NaiveDateTime) -> PathMatchReport {
    counter!(SOURCE_LINES_PROCESSED_TOTAL, LABEL_TRANSFORM => "path").increment(1);

    let (parent, filename) = match path.rsplit_once('/') {
        Some((parent, filename)) => (parent, filename),
        None => ("", path),
    };
    let directory = trim_dir(&config.directory);
    let parent = trim_dir(parent);

    let mut checker = Checker::default();

    let dir_ok = if directory.is_empty() {
        true
    } else if config.date_directory.is_some() {
        parent == directory || parent.starts_with(&format!("{directory}/"))
    } else {
        parent == directory
    };
    let detail = if directory.is_empty() {
        "no directory configured, any directory accepted".to_owned()
    } else {
        format!("expected '{directory}', found '{parent}'")
    };
    if !checker.check(PathCheckKind::Directory, dir_ok, detail) {
        return checker.finish(path);
    }

    if let Some(ref date_format) = config.date_directory {
        let rendered = TimestampFormat::new(date_format)
            .map(|fmt| fmt.render(today))
            .unwrap_or_else(|| date_format.clone());
        let (expected, ok) = if directory.is_empty() {
            let ok = parent == rendered || parent.ends_with(&format!("/{rendered}"));
            (rendered, ok)
        } else {
            let expected = format!("{directory}/{rendered}");
            let ok = parent == expected;
            (expected, ok)
        };
        let detail = format!("expected '{expected}' for today, found '{parent}'");
        if !checker.check(PathCheckKind::DateDirectory, ok, detail) {
            return checker.finish(path);
        }
    }

    let has_filter =
        !config.prefix.is_empty() || !config.suffix.is_empty() || !config.wildcard.is_empty();
    let detail = if has_filter {
        "filename discriminator configured".to_owned()
    } else {
        "no prefix, suffix or wildcard configured".to_owned()
    };
    if !checker.check(PathCheckKind::FilenameFilter, has_filter, detail) {
        return checker.finish(path);
    }

    if !config.prefix.is_empty() {
        let prefix = resolve_date_tokens(&config.prefix, today);
        let ok = filename.starts_with(&prefix);
        let detail = format!("'{filename}' starts with '{prefix}'");
        if !checker.check(PathCheckKind::Prefix, ok, detail) {
            return checker.finish(path);
        }
    }

    if !config.suffix.is_empty() {
        let suffix = resolve_date_tokens(&config.suffix, today);
        let ok = filename.ends_with(&suffix);
        let detail = format!("'{filename}' ends with '{suffix}'");
        if !checker.check(PathCheckKind::Suffix, ok, detail) {
            return checker.finish(path);
        }
    }

    if !config.wildcard.is_empty() {
        let wildcard = resolve_date_tokens(&config.wildcard, today);
        let ok = filename.contains(&wildcard);
        let detail = format!("'{filename}' contains '{wildcard}'");
        if !checker.check(PathCheckKind::Wildcard, ok, detail) {
            return checker.finish(path);
        }
    }

    if !config.exclude_suffixes.is_empty() {
        let hit = config
            .exclude_suffixes
            .iter()
            .find(|s| !s.is_empty() && filename.ends_with(s.as_str()));
        let detail = match hit {
            Some(s) => format!("'{filename}' ends with excluded '{s}'"),
            None => format!("'{filename}' matches no excluded suffix"),
        };
        checker.check(PathCheckKind::ExcludeSuffix, hit.is_none(), detail);
    }

    checker.finish(path)
}

fn trim_dir(dir: &str) -> &str {
    if dir.len() > 1 {
        dir.trim_end_matches('/')
    } else {
        dir
    }
}

#[derive(Default)]
struct Checker {
    steps: Vec<PathCheck>,
}

impl Checker {
    fn check(&mut self, kind: PathCheckKind, passed: bool, detail: String) -> bool {
        tracing::trace!(check = kind.label(), passed, %detail, "path check");
        self.steps.push(PathCheck {
            kind,
            passed,
            detail,
        });
        passed
    }

    fn finish(self, path: &str) -> PathMatchReport {
        let matched = self.steps.iter().all(|s| s.passed);
        PathMatchReport {
            path: path.to_owned(),
            matched,
            steps: self.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn today() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn source() -> LogSourceConfig {
        LogSourceConfig {
            id: "auth".to_owned(),
            directory: "/var/log/app".to_owned(),
            prefix: "auth".to_owned(),
            suffix: ".log".to_owned(),
            ..Default::default()
        }
    }

    fn kinds(report: &PathMatchReport) -> Vec<PathCheckKind> {
        report.steps.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn matching_path_passes_every_configured_check() {
        let report = match_path(&source(), "/var/log/app/auth.log", &today());
        assert!(report.matched);
        assert_eq!(
            kinds(&report),
            vec![
                PathCheckKind::Directory,
                PathCheckKind::FilenameFilter,
                PathCheckKind::Prefix,
                PathCheckKind::Suffix,
            ]
        );
    }

    #[test]
    fn wrong_directory_short_circuits() {
        let report = match_path(&source(), "/tmp/auth.log", &today());
        assert!(!report.matched);
        assert_eq!(kinds(&report), vec![PathCheckKind::Directory]);
    }

    #[test]
    fn trailing_slash_in_directory_is_ignored() {
        let mut config = source();
        config.directory = "/var/log/app/".to_owned();
        assert!(match_path(&config, "/var/log/app/auth.log", &today()).matched);
    }

    #[test]
    fn date_directory_compares_against_today() {
        let mut config = source();
        config.date_directory = Some("yyyyMMdd".to_owned());

        let hit = match_path(&config, "/var/log/app/20240309/auth.log", &today());
        assert!(hit.matched);

        let miss = match_path(&config, "/var/log/app/20240308/auth.log", &today());
        assert!(!miss.matched);
        let last = miss.steps.last().unwrap();
        assert_eq!(last.kind, PathCheckKind::DateDirectory);
        assert!(last.detail.contains("20240309"));
    }

    #[test]
    fn prefix_date_tokens_are_resolved() {
        let mut config = source();
        config.prefix = "auth-{yyyy-MM-dd}".to_owned();
        assert!(match_path(&config, "/var/log/app/auth-2024-03-09.log", &today()).matched);
        assert!(!match_path(&config, "/var/log/app/auth-2024-03-08.log", &today()).matched);
    }

    #[test]
    fn wildcard_is_a_substring_check() {
        let mut config = source();
        config.prefix.clear();
        config.suffix.clear();
        config.wildcard = "{yyyyMMdd}".to_owned();
        assert!(match_path(&config, "/var/log/app/x-20240309-y.txt", &today()).matched);
    }

    #[test]
    fn excluded_suffix_fails_last() {
        let mut config = source();
        config.suffix = ".log".to_owned();
        config.exclude_suffixes = vec![".gz".to_owned()];
        let ok = match_path(&config, "/var/log/app/auth.log", &today());
        assert!(ok.matched);
        assert_eq!(ok.steps.last().unwrap().kind, PathCheckKind::ExcludeSuffix);

        config.suffix = ".gz".to_owned();
        let excluded = match_path(&config, "/var/log/app/auth.log.gz", &today());
        assert!(!excluded.matched);
    }

    #[test]
    fn directory_without_filename_discriminator_never_matches() {
        let config = LogSourceConfig {
            id: "logs".to_owned(),
            directory: "/logs".to_owned(),
            ..Default::default()
        };
        let report = match_path(&config, "/logs/anything.log", &today());
        assert!(!report.matched);
        let last = report.steps.last().unwrap();
        assert_eq!(last.kind, PathCheckKind::FilenameFilter);
        assert!(!last.passed);
    }
}
