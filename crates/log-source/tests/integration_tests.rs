//! 통합 테스트 -- 소스 정의 로딩부터 변환 리포트까지의 흐름 검증

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use logtrig_source::extract::{extract_append, insert_at};
use logtrig_source::group::group_lines;
use logtrig_source::multiline::{BlockEnd, assemble};
use logtrig_source::path::{PathCheckKind, match_path};
use logtrig_source::watermark::{WatermarkVerdict, filter_lines};
use logtrig_source::{LogSourceConfig, SourceLoader};

const AUTH_SOURCE: &str = r#"
id: auth
title: Auth service
directory: /var/log/app
date_directory: yyyyMMdd
prefix: "auth-{yyyy-MM-dd}"
suffix: ".log"
exclude_suffixes: [".gz"]
timestamp:
  pattern: "^(\\d{4}-\\d{2}-\\d{2} \\d{2}:\\d{2}:\\d{2})"
  format: "yyyy-MM-dd HH:mm:ss"
multiline: { start_pattern: "\\d{4}-.*", end_pattern: "END", max_lines: 50, priority: start }
extract: { path_pattern: "/var/log/(\\w+)/(\\d+)/.*", format: "[@1 @2] ", offset: 0 }
grouping: { count: 3, must_match: ".*ERROR.*" }
"#;

fn today() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .expect("valid date")
}

fn auth_source() -> LogSourceConfig {
    SourceLoader::parse_yaml(AUTH_SOURCE, "auth.yml").expect("auth source should parse")
}

// =============================================================================
// 로더
// =============================================================================

#[tokio::test]
async fn load_directory_skips_bad_files_and_duplicates() {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let dir = temp_dir.path();

    std::fs::write(dir.join("a_auth.yml"), AUTH_SOURCE).expect("write");
    std::fs::write(dir.join("b_dup.yaml"), "id: auth\ndirectory: /other").expect("write");
    std::fs::write(dir.join("c_broken.yml"), "id: [unclosed").expect("write");
    std::fs::write(dir.join("d_web.yml"), "id: web\nsuffix: .log").expect("write");
    std::fs::write(dir.join("notes.txt"), "id: ignored").expect("write");

    let sources = SourceLoader::load_directory(dir).await.expect("load");
    let ids: Vec<&str> = sources.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["auth", "web"]);
    assert_eq!(sources[0].directory, "/var/log/app");
}

#[tokio::test]
async fn load_file_rejects_oversized_definition() {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = temp_dir.path().join("huge.yml");
    let mut content = String::from("id: huge\ntitle: \"");
    content.push_str(&"x".repeat(1024 * 1024 + 1));
    content.push('"');
    std::fs::write(&path, content).expect("write");

    let err = SourceLoader::load_file(&path).await.unwrap_err();
    assert!(err.to_string().contains("too large"));
}

// =============================================================================
// 변환 흐름
// =============================================================================

#[test]
fn todays_path_matches_full_definition() {
    let source = auth_source();
    let report = match_path(&source, "/var/log/app/20240309/auth-2024-03-09.log", &today());
    assert!(report.matched, "{:?}", report.steps);

    let stale = match_path(&source, "/var/log/app/20240309/auth-2024-03-08.log", &today());
    assert!(!stale.matched);
    assert_eq!(stale.steps.last().map(|s| s.kind), Some(PathCheckKind::Prefix));
}

#[test]
fn directory_without_filename_filter_fails() {
    let source = LogSourceConfig {
        id: "logs".to_owned(),
        directory: "/logs".to_owned(),
        ..Default::default()
    };
    let report = match_path(&source, "/logs/app.log", &today());
    assert!(!report.matched);
    assert!(
        report
            .steps
            .iter()
            .any(|s| s.kind == PathCheckKind::FilenameFilter && !s.passed)
    );
}

#[test]
fn multiline_begin_mid_end_is_one_block() {
    let mut source = auth_source();
    let multiline = source.multiline.as_mut().expect("multiline configured");
    multiline.start_pattern = "BEGIN".to_owned();

    let report = assemble(multiline, "BEGIN\nmid\nEND\n");
    assert_eq!(report.blocks.len(), 1);
    assert_eq!(report.blocks[0].ended_by, BlockEnd::EndPattern);
    assert_eq!(report.blocks[0].lines.len(), 3);
    assert!(report.skipped.is_empty());
}

#[test]
fn multiline_blocks_follow_timestamps() {
    let source = auth_source();
    let multiline = source.multiline.as_ref().expect("multiline configured");
    let text = "2024-03-09 08:00:00 ERROR boom\n  at foo\n  at bar\n2024-03-09 08:00:05 INFO ok";
    let report = assemble(multiline, text);
    assert_eq!(report.blocks.len(), 2);
    assert_eq!(report.blocks[0].ended_by, BlockEnd::StartPattern);
    assert_eq!(report.blocks[0].lines.len(), 3);
    assert_eq!(report.blocks[1].ended_by, BlockEnd::Eof);
}

#[test]
fn grouping_seven_lines_by_three() {
    let source = auth_source();
    let mut grouping = source.grouping.clone().expect("grouping configured");
    grouping.must_match = None;

    let report = group_lines(&grouping, "1\n2\n3\n4\n5\n6\n7\n");
    assert_eq!(report.groups.len(), 2);
    assert!(report.incomplete_group);
    assert_eq!(report.buffered.len(), 1);
}

#[test]
fn extract_uses_path_captures() {
    let source = auth_source();
    let extract = source.extract.as_ref().expect("extract configured");
    let report = extract_append(
        extract,
        "/var/log/app/20240309/auth.log",
        "line one\n\nline three",
    );
    assert!(report.matched);
    assert_eq!(
        report.lines,
        vec!["[app 20240309] line one", "[app 20240309] ", "[app 20240309] line three"]
    );
}

#[test]
fn watermark_serializes_verdicts() {
    let source = auth_source();
    let ts = source.timestamp.as_ref().expect("timestamp configured");
    let text = "2024-03-09 08:00:05 b\n2024-03-09 08:00:01 a\ncontinued";
    let report = filter_lines(ts, text, None);
    let verdicts: Vec<WatermarkVerdict> = report.lines.iter().map(|l| l.verdict).collect();
    assert_eq!(
        verdicts,
        vec![
            WatermarkVerdict::Pass,
            WatermarkVerdict::Skip,
            WatermarkVerdict::NoMatch
        ]
    );

    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["lines"][2]["verdict"], "no-match");
    assert_eq!(json["skipped"], 1);
}

proptest! {
    #[test]
    fn offset_zero_always_prepends(line in ".{0,40}", insert in "[a-z\\[\\] ]{0,8}") {
        let out = insert_at(&line, &insert, 0);
        prop_assert!(out.starts_with(&insert));
        prop_assert_eq!(&out[insert.len()..], line.as_str());
    }
}
