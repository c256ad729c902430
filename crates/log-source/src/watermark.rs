//! 타임스탬프 워터마크 필터
//!
//! 라인마다 타임스탬프 부분 문자열을 찾아 파싱하고, 마지막으로 수락한 시각
//! (워터마크)과 비교합니다.
//!
//! | 조건 | 판정 | 워터마크 |
//! |------|------|----------|
//! | 워터마크보다 이름 | `skip` | 유지 |
//! | 같거나 늦음 | `pass` | 해당 시각으로 전진 |
//! | 추출/파싱 실패 | `no-match` | 유지 (라인은 통과) |
//!
//! 워터마크는 [`WatermarkFilter`] 인스턴스 필드이며 호출 간에 공유되지 않습니다.

use chrono::NaiveDateTime;
use logtrig_core::metrics::{
    LABEL_TRANSFORM, PATTERN_COMPILE_ERRORS_TOTAL, SOURCE_LINES_PROCESSED_TOTAL,
    SOURCE_WATERMARK_SKIPPED_TOTAL,
};
use logtrig_core::timestamp::TimestampFormat;
use metrics::counter;
use regex::Regex;
use serde::Serialize;

use crate::numbered_lines;
use crate::types::TimestampConfig;

/// 라인 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkVerdict {
    Pass,
    Skip,
    NoMatch,
}

/// 라인별 판정 결과
#[derive(Debug, Clone, Serialize)]
pub struct WatermarkLine {
    pub line_number: usize,
    pub text: String,
    pub verdict: WatermarkVerdict,
    /// 파싱된 타임스탬프
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<NaiveDateTime>,
}

/// 워터마크 필터 리포트
#[derive(Debug, Clone, Default, Serialize)]
pub struct WatermarkReport {
    pub lines: Vec<WatermarkLine>,
    pub passed: usize,
    pub skipped: usize,
    pub no_match: usize,
    /// 처리 후 워터마크
    pub watermark: Option<NaiveDateTime>,
    pub diagnostics: Vec<String>,
}

/// 호출 단위 워터마크 필터
#[derive(Debug, Clone)]
pub struct WatermarkFilter {
    pattern: Option<Regex>,
    format: Option<TimestampFormat>,
    last: Option<NaiveDateTime>,
}

impl WatermarkFilter {
    /// 타임스탬프 설정에서 필터를 생성합니다.
    ///
    /// 형식에 토큰이 없거나 패턴 컴파일에 실패하면 필터링이 비활성화되어
    /// 모든 라인이 `no-match`로 통과합니다. 사유는 `diagnostics`에 기록됩니다.
    pub fn new(config: &TimestampConfig, diagnostics: &mut Vec<String>) -> Self {
        let format = TimestampFormat::new(&config.format);
        if format.is_none() {
            diagnostics.push(format!(
                "timestamp format '{}' has no tokens, watermark filtering disabled",
                config.format
            ));
        }

        let pattern = if config.pattern.is_empty() {
            None
        } else {
            match Regex::new(&config.pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(
                        pattern = %config.pattern,
                        error = %e,
                        "timestamp pattern compile failed"
                    );
                    counter!(PATTERN_COMPILE_ERRORS_TOTAL).increment(1);
                    diagnostics.push(format!("invalid pattern '{}': {e}", config.pattern));
                    return Self {
                        pattern: None,
                        format: None,
                        last: None,
                    };
                }
            }
        };

        Self {
            pattern,
            format,
            last: None,
        }
    }

    /// 시작 워터마크를 지정합니다.
    pub fn with_watermark(mut self, last: Option<NaiveDateTime>) -> Self {
        self.last = last;
        self
    }

    /// 현재 워터마크
    pub fn watermark(&self) -> Option<NaiveDateTime> {
        self.last
    }

    /// 한 라인을 판정하고 필요하면 워터마크를 전진시킵니다.
    pub fn check(&mut self, line: &str) -> (WatermarkVerdict, Option<NaiveDateTime>) {
        let Some(ts) = self.timestamp_of(line) else {
            return (WatermarkVerdict::NoMatch, None);
        };
        match self.last {
            Some(last) if ts < last => (WatermarkVerdict::Skip, Some(ts)),
            _ => {
                self.last = Some(ts);
                (WatermarkVerdict::Pass, Some(ts))
            }
        }
    }

    fn timestamp_of(&self, line: &str) -> Option<NaiveDateTime> {
        let format = self.format.as_ref()?;
        match self.pattern {
            Some(ref re) => {
                let caps = re.captures(line)?;
                let raw = caps.get(1).or_else(|| caps.get(0))?.as_str();
                format.parse(raw)
            }
            None => format.extract(line),
        }
    }
}

/// 텍스트 전체에 워터마크 필터를 적용합니다.
pub fn filter_lines(
    config: &TimestampConfig,
    text: &str,
    initial: Option<NaiveDateTime>,
) -> WatermarkReport {
    let mut report = WatermarkReport::default();
    let mut filter = WatermarkFilter::new(config, &mut report.diagnostics).with_watermark(initial);

    for (line_number, line) in numbered_lines(text) {
        let (verdict, timestamp) = filter.check(line);
        match verdict {
            WatermarkVerdict::Pass => report.passed += 1,
            WatermarkVerdict::Skip => report.skipped += 1,
            WatermarkVerdict::NoMatch => report.no_match += 1,
        }
        tracing::trace!(line_number, ?verdict, "watermark verdict");
        report.lines.push(WatermarkLine {
            line_number,
            text: line.to_owned(),
            verdict,
            timestamp,
        });
    }
    report.watermark = filter.watermark();

    counter!(SOURCE_LINES_PROCESSED_TOTAL, LABEL_TRANSFORM => "watermark")
        .increment(report.lines.len() as u64);
    counter!(SOURCE_WATERMARK_SKIPPED_TOTAL).increment(report.skipped as u64);

    report
}
