//! 스텝 상태 머신 -- 하나의 스텝이 라인을 한 줄씩 소비하며 내리는 판정
//!
//! [`StepCursor`]는 체인 실행기와 MULTI 상관기가 공유하는 단위입니다.
//! 라인을 하나 받을 때마다 [`StepEvent`]를 돌려줍니다.
//!
//! | 스텝 | 라인 판정 | 이벤트 |
//! |------|-----------|--------|
//! | regex | 누적 매칭 수가 `times`에 도달 | `Fired` |
//! | delay | 매칭 전에 윈도우가 지남 (라인 미소비) | `TimedOut` |
//! | delay | 윈도우 안에서 매칭 | `Cancelled` |
//! | 공통 | 그 외 | `Pending` |
//!
//! regex 스텝의 윈도우는 "이전 스텝 완료 시각"과 "누적 윈도우의 첫 매칭 시각" 중
//! 늦은 쪽부터 잽니다. 윈도우를 벗어난 오래된 매칭은 앞에서부터 버리며,
//! 가장 최근 매칭은 버리지 않습니다.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{NaiveDateTime, TimeDelta};
use logtrig_core::pattern::{Captures, CompiledPattern, compile_or_diagnose};
use logtrig_core::timestamp::TimestampFormat;
use serde::Serialize;

use crate::recipe::{PostConditions, Step, StepType};

/// 스캔 대상 라인
#[derive(Debug, Clone)]
pub struct ScanLine<'a> {
    /// 라인 번호 (1부터)
    pub number: usize,
    pub text: &'a str,
    /// 라인에서 추출한 타임스탬프
    pub timestamp: Option<NaiveDateTime>,
}

/// 타임스탬프가 미리 추출된 라인 버퍼
///
/// 텍스트는 `str::lines` 규칙으로 분리하므로 마지막 개행 뒤의 빈 라인은 없습니다.
#[derive(Debug, Clone)]
pub struct LineBuffer<'a> {
    lines: Vec<ScanLine<'a>>,
}

impl<'a> LineBuffer<'a> {
    pub fn new(text: &'a str, format: Option<&TimestampFormat>) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(idx, line)| ScanLine {
                number: idx + 1,
                text: line,
                timestamp: format.and_then(|f| f.extract(line)),
            })
            .collect();
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, offset: usize) -> Option<&ScanLine<'a>> {
        self.lines.get(offset)
    }

    /// 타임스탬프가 추출된 라인 수
    pub fn timestamped(&self) -> usize {
        self.lines.iter().filter(|l| l.timestamp.is_some()).count()
    }
}

/// 스캔 제어 -- 거부된 매칭 기록 여부와 협조적 취소 플래그
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanControl<'a> {
    pub include_rejected: bool,
    pub cancel: Option<&'a AtomicBool>,
}

impl ScanControl<'_> {
    /// 취소가 요청되었는지 확인합니다.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// 매칭 기록
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub line_number: usize,
    pub text: String,
    /// 매칭된 패턴의 `trigger` 인덱스
    pub pattern_index: usize,
    pub timestamp: Option<NaiveDateTime>,
    pub captures: Captures,
}

struct CompiledItem {
    pattern: Option<CompiledPattern>,
    post_conditions: Option<PostConditions>,
}

/// 한 스텝의 컴파일된 패턴 목록
///
/// 컴파일에 실패한 패턴은 `None`으로 남아 절대 매칭되지 않습니다.
pub struct CompiledStep {
    items: Vec<CompiledItem>,
}

/// 한 라인에 대한 패턴 검사 결과
#[derive(Debug, Default)]
pub struct LineTest {
    /// 사후 조건까지 통과한 첫 매칭
    pub accepted: Option<MatchRecord>,
    /// 정규식은 매칭됐지만 사후 조건에서 걸러진 매칭
    pub rejected: Vec<MatchRecord>,
}

impl CompiledStep {
    /// 스텝 패턴을 컴파일합니다. `bindings`가 있으면 역참조를 치환합니다.
    pub fn compile(
        step: &Step,
        bindings: Option<&Captures>,
        diagnostics: &mut Vec<String>,
    ) -> Self {
        let items = step
            .trigger
            .iter()
            .map(|item| {
                let mut errors = Vec::new();
                let pattern = compile_or_diagnose(&item.text, bindings, &mut errors);
                diagnostics.extend(
                    errors
                        .into_iter()
                        .map(|e| format!("step '{}': {e}", step.name)),
                );
                CompiledItem {
                    pattern,
                    post_conditions: item.post_conditions.clone(),
                }
            })
            .collect();
        Self { items }
    }

    /// 라인을 패턴 순서대로 검사합니다. 처음으로 수락된 패턴에서 멈춥니다.
    pub fn test(&self, line: &ScanLine<'_>) -> LineTest {
        self.scan_patterns(line, |_| true)
    }

    /// named capture가 있는 첫 수락 매칭을 찾습니다. 캡처 없는 수락은 건너뜁니다.
    pub fn test_capturing(&self, line: &ScanLine<'_>) -> LineTest {
        self.scan_patterns(line, |record| !record.captures.is_empty())
    }

    fn scan_patterns(
        &self,
        line: &ScanLine<'_>,
        wanted: impl Fn(&MatchRecord) -> bool,
    ) -> LineTest {
        let mut result = LineTest::default();
        for (pattern_index, item) in self.items.iter().enumerate() {
            let Some(ref pattern) = item.pattern else {
                continue;
            };
            let Some(captures) = pattern.captures(line.text) else {
                continue;
            };
            let record = MatchRecord {
                line_number: line.number,
                text: line.text.to_owned(),
                pattern_index,
                timestamp: line.timestamp,
                captures,
            };
            let passes = item
                .post_conditions
                .as_ref()
                .is_none_or(|conds| conds.evaluate(&record.captures));
            if passes {
                if !wanted(&record) {
                    continue;
                }
                result.accepted = Some(record);
                break;
            }
            tracing::trace!(
                line = line.number,
                pattern_index,
                "match rejected by post-condition"
            );
            result.rejected.push(record);
        }
        result
    }
}

/// 스텝 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// regex 스텝이 `times`만큼 매칭됨
    Fired,
    /// delay 스텝이 취소 없이 윈도우를 통과함
    TimedOut,
    /// delay 스텝의 취소 패턴이 윈도우 안에서 매칭됨
    Cancelled,
    /// 스트림이 먼저 끝남
    Incomplete,
}

impl StepOutcome {
    /// 스텝이 성공했는지 (다음 스텝으로 진행 가능한지) 여부
    pub fn succeeded(self) -> bool {
        matches!(self, Self::Fired | Self::TimedOut)
    }
}

/// 스텝 트레이스
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepTrace {
    pub step_index: usize,
    pub name: String,
    pub step_type: StepType,
    pub outcome: StepOutcome,
    /// 수락된 매칭 (윈도우에서 밀려난 매칭은 제외)
    pub matches: Vec<MatchRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<MatchRecord>,
    /// 설정된 윈도우 원문
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    pub previous_timestamp: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    /// delay 취소로 인한 체인 리셋 횟수 (이 시도 시작 시점)
    pub attempt: u32,
    /// 이 스텝이 검사한 첫 라인과 마지막 라인
    pub first_line: Option<usize>,
    pub last_line: Option<usize>,
}

/// 라인 하나에 대한 스텝 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    Pending,
    Fired,
    /// 라인을 소비하지 않음. 같은 라인이 다음 스텝으로 넘어갑니다.
    TimedOut,
    Cancelled,
}

/// 진행 중인 스텝
#[derive(Debug, Clone)]
pub struct StepCursor {
    step_index: usize,
    name: String,
    step_type: StepType,
    times: usize,
    window: Option<TimeDelta>,
    window_raw: Option<String>,
    previous_timestamp: Option<NaiveDateTime>,
    attempt: u32,
    include_rejected: bool,
    matches: VecDeque<MatchRecord>,
    rejected: Vec<MatchRecord>,
    first_line: Option<usize>,
    last_line: Option<usize>,
}

impl StepCursor {
    pub fn new(
        step_index: usize,
        step: &Step,
        previous_timestamp: Option<NaiveDateTime>,
        attempt: u32,
        include_rejected: bool,
    ) -> Self {
        Self {
            step_index,
            name: step.name.clone(),
            step_type: step.step_type,
            times: usize::try_from(step.times.max(1)).unwrap_or(usize::MAX),
            window: step.window(),
            window_raw: step.duration.as_ref().map(|d| d.raw().to_owned()),
            previous_timestamp,
            attempt,
            include_rejected,
            matches: VecDeque::new(),
            rejected: Vec::new(),
            first_line: None,
            last_line: None,
        }
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn step_type(&self) -> StepType {
        self.step_type
    }

    /// 이 스텝이 라인을 하나라도 검사했는지 여부
    pub fn scanned_any(&self) -> bool {
        self.first_line.is_some()
    }

    /// delay 스텝의 타임아웃 시각 (이전 스텝 완료 시각 + 윈도우)
    pub fn timeout_instant(&self) -> Option<NaiveDateTime> {
        let prev = self.previous_timestamp?;
        prev.checked_add_signed(self.window?)
    }

    /// 라인 하나를 검사합니다.
    pub fn feed(&mut self, compiled: &CompiledStep, line: &ScanLine<'_>) -> StepEvent {
        match self.step_type {
            StepType::Delay => self.feed_delay(compiled, line),
            StepType::Regex => self.feed_regex(compiled, line),
        }
    }

    fn feed_delay(&mut self, compiled: &CompiledStep, line: &ScanLine<'_>) -> StepEvent {
        if let (Some(window), Some(prev), Some(ts)) =
            (self.window, self.previous_timestamp, line.timestamp)
            && ts - prev > window
        {
            tracing::trace!(step = %self.name, line = line.number, "delay window elapsed");
            return StepEvent::TimedOut;
        }

        let accepted = self.scan(compiled, line);
        match accepted {
            Some(record) => {
                tracing::debug!(step = %self.name, line = line.number, "delay cancelled by match");
                self.matches.push_back(record);
                StepEvent::Cancelled
            }
            None => StepEvent::Pending,
        }
    }

    fn feed_regex(&mut self, compiled: &CompiledStep, line: &ScanLine<'_>) -> StepEvent {
        let Some(record) = self.scan(compiled, line) else {
            return StepEvent::Pending;
        };
        tracing::trace!(step = %self.name, line = line.number, "step match");
        self.matches.push_back(record);
        self.trim_window();

        if self.matches.len() >= self.times {
            StepEvent::Fired
        } else {
            StepEvent::Pending
        }
    }

    fn scan(&mut self, compiled: &CompiledStep, line: &ScanLine<'_>) -> Option<MatchRecord> {
        self.first_line.get_or_insert(line.number);
        self.last_line = Some(line.number);

        let test = compiled.test(line);
        if self.include_rejected {
            self.rejected.extend(test.rejected);
        }
        test.accepted
    }

    fn trim_window(&mut self) {
        let Some(window) = self.window else { return };
        let Some(newest) = self.matches.back().and_then(|m| m.timestamp) else {
            return;
        };

        while self.matches.len() > 1 {
            let front = self.matches.front().and_then(|m| m.timestamp);
            let anchor = match (self.previous_timestamp, front) {
                (Some(prev), Some(first)) => prev.max(first),
                (Some(prev), None) => prev,
                (None, Some(first)) => first,
                (None, None) => break,
            };
            if newest - anchor > window {
                self.matches.pop_front();
            } else {
                break;
            }
        }
    }

    /// 스텝을 마무리하고 트레이스를 만듭니다.
    pub fn finish(self, outcome: StepOutcome) -> StepTrace {
        let completed_at = match outcome {
            StepOutcome::Fired | StepOutcome::Cancelled => {
                self.matches.back().and_then(|m| m.timestamp)
            }
            StepOutcome::TimedOut => self.timeout_instant(),
            StepOutcome::Incomplete => None,
        };
        StepTrace {
            step_index: self.step_index,
            name: self.name,
            step_type: self.step_type,
            outcome,
            matches: self.matches.into(),
            rejected: self.rejected,
            window: self.window_raw,
            previous_timestamp: self.previous_timestamp,
            completed_at,
            attempt: self.attempt,
            first_line: self.first_line,
            last_line: self.last_line,
        }
    }
}
