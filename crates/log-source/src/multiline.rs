//! 멀티라인 블록 조립기
//!
//! 두 상태(`Scanning`, `Collecting`)를 가진 상태 머신입니다.
//!
//! ```text
//!            start 매칭
//! Scanning ─────────────▶ Collecting ──┐ start 매칭: 현재 블록 flush 후 새 블록
//!    ▲                        │        │ (priority=count + 라인 제한이면 일반 내용)
//!    │  end 매칭 / 빈 라인 /    │◀───────┘
//!    └──── 라인 수 도달 ───────┘
//! ```
//!
//! `Collecting`에서의 우선순위는 start > end > 기본(내용 추가)입니다.
//! 입력이 끝나면 열린 블록은 `eof`로 강제 종료됩니다.
//! 패턴은 라인 전체 매칭이며, 컴파일에 실패한 패턴은 절대 매칭되지 않습니다.

use logtrig_core::metrics::{
    LABEL_TRANSFORM, SOURCE_BLOCKS_TOTAL, SOURCE_LINES_PROCESSED_TOTAL,
};
use logtrig_core::pattern::{CompiledPattern, compile_or_diagnose};
use metrics::counter;
use serde::Serialize;

use crate::numbered_lines;
use crate::types::{MultilineConfig, MultilinePriority, SourceLine};

/// 블록 종료 원인
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockEnd {
    /// 다음 블록의 시작 패턴을 만남
    StartPattern,
    /// 종료 패턴을 만남 (해당 라인 포함)
    EndPattern,
    /// 최대 라인 수 도달
    Count,
    /// 빈 라인
    EmptyLine,
    /// 입력 종료
    Eof,
}

/// 조립된 블록
#[derive(Debug, Clone, Serialize)]
pub struct Block {
    /// 첫 라인 번호 (1부터)
    pub start_line: usize,
    /// 마지막 라인 번호
    pub end_line: usize,
    pub lines: Vec<String>,
    pub ended_by: BlockEnd,
}

impl Block {
    /// 블록 텍스트 (라인을 개행으로 연결)
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// 멀티라인 조립 리포트
#[derive(Debug, Clone, Default, Serialize)]
pub struct MultilineReport {
    pub blocks: Vec<Block>,
    /// `Scanning` 상태에서 시작 패턴과 매칭되지 않은 라인
    pub skipped: Vec<SourceLine>,
    pub diagnostics: Vec<String>,
}

/// 수집 중인 블록
struct OpenBlock {
    start_line: usize,
    lines: Vec<String>,
}

impl OpenBlock {
    fn new(line_number: usize, line: &str) -> Self {
        Self {
            start_line: line_number,
            lines: vec![line.to_owned()],
        }
    }

    fn close(self, ended_by: BlockEnd) -> Block {
        Block {
            end_line: self.start_line + self.lines.len().saturating_sub(1),
            start_line: self.start_line,
            lines: self.lines,
            ended_by,
        }
    }
}

enum AssemblerState {
    Scanning,
    Collecting(OpenBlock),
}

/// 한 라인에 대한 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineClass {
    Start,
    End,
    Content,
}

struct Assembler<'a> {
    start: Option<CompiledPattern>,
    end: Option<CompiledPattern>,
    limit: Option<usize>,
    start_is_content: bool,
    report: &'a mut MultilineReport,
}

impl Assembler<'_> {
    fn classify(&self, line: &str) -> LineClass {
        if self.start.as_ref().is_some_and(|p| p.is_match(line)) && !self.start_is_content {
            LineClass::Start
        } else if self.end.as_ref().is_some_and(|p| p.is_match(line)) {
            LineClass::End
        } else {
            LineClass::Content
        }
    }

    fn step(&mut self, state: AssemblerState, line_number: usize, line: &str) -> AssemblerState {
        match state {
            AssemblerState::Scanning => {
                if self.start.as_ref().is_some_and(|p| p.is_match(line)) {
                    self.open(line_number, line)
                } else {
                    tracing::trace!(line_number, "skipped while scanning");
                    self.report.skipped.push(SourceLine::new(line_number, line));
                    AssemblerState::Scanning
                }
            }
            AssemblerState::Collecting(mut block) => match self.classify(line) {
                LineClass::Start => {
                    self.emit(block.close(BlockEnd::StartPattern));
                    self.open(line_number, line)
                }
                LineClass::End => {
                    block.lines.push(line.to_owned());
                    self.emit(block.close(BlockEnd::EndPattern));
                    AssemblerState::Scanning
                }
                LineClass::Content => {
                    block.lines.push(line.to_owned());
                    if line.trim().is_empty() {
                        self.emit(block.close(BlockEnd::EmptyLine));
                        AssemblerState::Scanning
                    } else if self.limit.is_some_and(|max| block.lines.len() >= max) {
                        self.emit(block.close(BlockEnd::Count));
                        AssemblerState::Scanning
                    } else {
                        AssemblerState::Collecting(block)
                    }
                }
            },
        }
    }

    fn open(&mut self, line_number: usize, line: &str) -> AssemblerState {
        let block = OpenBlock::new(line_number, line);
        if self.limit.is_some_and(|max| block.lines.len() >= max) {
            self.emit(block.close(BlockEnd::Count));
            AssemblerState::Scanning
        } else {
            AssemblerState::Collecting(block)
        }
    }

    fn emit(&mut self, block: Block) {
        tracing::trace!(
            start_line = block.start_line,
            end_line = block.end_line,
            ended_by = ?block.ended_by,
            "block closed"
        );
        self.report.blocks.push(block);
    }
}

/// 텍스트를 멀티라인 블록으로 조립합니다.
pub fn assemble(config: &MultilineConfig, text: &str) -> MultilineReport {
    let mut report = MultilineReport::default();

    let start = compile_or_diagnose(&config.start_pattern, None, &mut report.diagnostics);
    let end = config
        .end_pattern
        .as_deref()
        .filter(|p| !p.is_empty())
        .and_then(|p| compile_or_diagnose(p, None, &mut report.diagnostics));
    let limit = config.line_limit();
    let start_is_content = config.priority == MultilinePriority::Count && limit.is_some();

    let mut assembler = Assembler {
        start,
        end,
        limit,
        start_is_content,
        report: &mut report,
    };

    let mut state = AssemblerState::Scanning;
    let mut processed = 0u64;
    for (line_number, line) in numbered_lines(text) {
        state = assembler.step(state, line_number, line);
        processed += 1;
    }
    if let AssemblerState::Collecting(block) = state {
        assembler.emit(block.close(BlockEnd::Eof));
    }

    counter!(SOURCE_LINES_PROCESSED_TOTAL, LABEL_TRANSFORM => "multiline").increment(processed);
    counter!(SOURCE_BLOCKS_TOTAL).increment(report.blocks.len() as u64);

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(start: &str, end: Option<&str>) -> MultilineConfig {
        MultilineConfig {
            start_pattern: start.to_owned(),
            end_pattern: end.map(str::to_owned),
            max_lines: None,
            priority: MultilinePriority::Start,
        }
    }

    fn ends(report: &MultilineReport) -> Vec<BlockEnd> {
        report.blocks.iter().map(|b| b.ended_by).collect()
    }

    #[test]
    fn start_and_end_pattern_make_one_block() {
        let report = assemble(&config("BEGIN", Some("END")), "BEGIN\nmid\nEND\n");
        assert_eq!(report.blocks.len(), 1);
        let block = &report.blocks[0];
        assert_eq!(block.ended_by, BlockEnd::EndPattern);
        assert_eq!((block.start_line, block.end_line), (1, 3));
        assert_eq!(block.lines, vec!["BEGIN", "mid", "END"]);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn lines_before_first_start_are_skipped() {
        let report = assemble(&config("BEGIN", None), "noise\nBEGIN\nbody");
        assert_eq!(report.skipped, vec![SourceLine::new(1, "noise")]);
        assert_eq!(ends(&report), vec![BlockEnd::Eof]);
    }

    #[test]
    fn new_start_flushes_current_block() {
        let report = assemble(&config(r"\d{4}-.*", None), "2024-a\nx\n2024-b\ny");
        assert_eq!(ends(&report), vec![BlockEnd::StartPattern, BlockEnd::Eof]);
        assert_eq!(report.blocks[0].lines, vec!["2024-a", "x"]);
        assert_eq!(report.blocks[1].start_line, 3);
    }

    #[test]
    fn empty_line_closes_block() {
        let report = assemble(&config("BEGIN", None), "BEGIN\nbody\n   \nafter");
        assert_eq!(ends(&report), vec![BlockEnd::EmptyLine]);
        assert_eq!(report.blocks[0].lines.len(), 3);
        assert_eq!(report.skipped, vec![SourceLine::new(4, "after")]);
    }

    #[test]
    fn max_lines_closes_block() {
        let mut cfg = config("BEGIN", None);
        cfg.max_lines = Some(2);
        let report = assemble(&cfg, "BEGIN\na\nb");
        assert_eq!(ends(&report), vec![BlockEnd::Count]);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn count_priority_treats_start_as_content() {
        let mut cfg = config("S.*", None);
        cfg.max_lines = Some(3);
        cfg.priority = MultilinePriority::Count;
        let report = assemble(&cfg, "S1\nS2\nS3\nS4");
        assert_eq!(ends(&report), vec![BlockEnd::Count, BlockEnd::Eof]);
        assert_eq!(report.blocks[0].lines, vec!["S1", "S2", "S3"]);
    }

    #[test]
    fn count_priority_without_limit_behaves_like_start() {
        let mut cfg = config("S.*", None);
        cfg.priority = MultilinePriority::Count;
        let report = assemble(&cfg, "S1\nS2");
        assert_eq!(ends(&report), vec![BlockEnd::StartPattern, BlockEnd::Eof]);
    }

    #[test]
    fn end_pattern_wins_regardless_of_priority() {
        let mut cfg = config("S.*", Some("END"));
        cfg.max_lines = Some(10);
        cfg.priority = MultilinePriority::Count;
        let report = assemble(&cfg, "S1\nEND");
        assert_eq!(ends(&report), vec![BlockEnd::EndPattern]);
    }

    #[test]
    fn invalid_start_pattern_is_diagnosed() {
        let report = assemble(&config("(", None), "a\nb");
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.blocks.is_empty());
        assert_eq!(report.skipped.len(), 2);
    }
}
