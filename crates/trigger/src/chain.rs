//! 체인 실행기 -- 레시피의 스텝을 순서대로 진행하는 단일 패스
//!
//! 한 패스는 시작 스텝과 시작 오프셋에서 출발하여 다음 중 하나로 끝납니다.
//! - 완료: 성공한 스텝의 `next`가 종료 액션, 빈 값, 해석되지 않은 이름일 때
//! - 미완료: 스트림이 먼저 끝날 때
//! - 중단: 리셋 상한 도달, 진행 없는 전이 반복, 취소 요청
//!
//! delay 스텝이 취소되면 체인은 다음 라인에서 첫 스텝부터 다시 시작합니다.

use chrono::NaiveDateTime;
use logtrig_core::metrics::{
    LABEL_RECIPE, TRIGGER_CANCELLATIONS_TOTAL, TRIGGER_CAP_REACHED_TOTAL,
    TRIGGER_CHAIN_PASSES_TOTAL,
};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::recipe::{NextTarget, StepType, TriggerRecipe};
use crate::step::{
    CompiledStep, LineBuffer, ScanControl, StepCursor, StepEvent, StepOutcome, StepTrace,
};

/// delay 취소로 인한 체인 리셋 상한 (한 패스 기준)
pub const DELAY_RESET_CEILING: u32 = 100;

/// 패턴이 미리 컴파일된 레시피
pub struct PreparedRecipe<'r> {
    recipe: &'r TriggerRecipe,
    steps: Vec<CompiledStep>,
    diagnostics: Vec<String>,
}

impl<'r> PreparedRecipe<'r> {
    /// 모든 스텝 패턴을 바인딩 없이 컴파일합니다.
    pub fn new(recipe: &'r TriggerRecipe) -> Self {
        let mut diagnostics = Vec::new();
        let steps = recipe
            .steps
            .iter()
            .map(|step| CompiledStep::compile(step, None, &mut diagnostics))
            .collect();
        Self {
            recipe,
            steps,
            diagnostics,
        }
    }

    pub fn recipe(&self) -> &'r TriggerRecipe {
        self.recipe
    }

    /// 패턴 컴파일 진단
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn step(&self, index: usize) -> Option<&CompiledStep> {
        self.steps.get(index)
    }
}

/// 체인 패스 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainPass {
    pub start_step: usize,
    /// 패스를 시작한 라인 오프셋 (0부터)
    pub start_offset: usize,
    /// 시도한 스텝 트레이스 (리셋 전 시도 포함)
    pub steps: Vec<StepTrace>,
    pub fired: bool,
    pub firing_timestamp: Option<NaiveDateTime>,
    /// 체인을 완료시킨 `next` 해석 결과
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<NextTarget>,
    /// 다음 패스를 시작할 라인 오프셋
    pub resume_offset: usize,
    /// delay 취소로 인한 리셋 횟수
    pub resets: u32,
    pub cap_reached: bool,
    /// 라인 진행 없이 스텝 전이가 반복되어 중단됨
    pub stalled: bool,
    pub cancelled: bool,
}

impl ChainPass {
    fn new(start_step: usize, start_offset: usize) -> Self {
        Self {
            start_step,
            start_offset,
            steps: Vec::new(),
            fired: false,
            firing_timestamp: None,
            terminal: None,
            resume_offset: start_offset,
            resets: 0,
            cap_reached: false,
            stalled: false,
            cancelled: false,
        }
    }
}

/// 주어진 스텝과 오프셋에서 체인을 한 번 실행합니다.
pub fn run_chain(
    prepared: &PreparedRecipe<'_>,
    lines: &LineBuffer<'_>,
    start_step: usize,
    offset: usize,
    control: &ScanControl<'_>,
) -> ChainPass {
    let recipe = prepared.recipe();
    let mut pass = ChainPass::new(start_step, offset);
    if start_step >= recipe.steps.len() {
        pass.resume_offset = lines.len().max(offset);
        return pass;
    }

    counter!(TRIGGER_CHAIN_PASSES_TOTAL, LABEL_RECIPE => recipe.id.clone()).increment(1);
    debug!(recipe_id = %recipe.id, start_step, offset, "chain pass started");

    let mut step_idx = start_step;
    let mut pos = offset;
    let mut previous_timestamp: Option<NaiveDateTime> = None;
    let mut idle_transitions = 0usize;

    loop {
        let step = &recipe.steps[step_idx];
        let Some(compiled) = prepared.step(step_idx) else {
            pass.resume_offset = lines.len();
            return pass;
        };
        let mut cursor = StepCursor::new(
            step_idx,
            step,
            previous_timestamp,
            pass.resets,
            control.include_rejected,
        );
        let step_start = pos;
        let mut event = StepEvent::Pending;

        while let Some(line) = lines.get(pos) {
            if control.is_cancelled() {
                debug!(recipe_id = %recipe.id, line = line.number, "chain pass cancelled");
                pass.cancelled = true;
                pass.steps.push(cursor.finish(StepOutcome::Incomplete));
                pass.resume_offset = pos;
                return pass;
            }
            event = cursor.feed(compiled, line);
            match event {
                StepEvent::Pending => pos += 1,
                StepEvent::TimedOut => break,
                StepEvent::Fired | StepEvent::Cancelled => {
                    pos += 1;
                    break;
                }
            }
        }

        let outcome = match event {
            StepEvent::Fired => StepOutcome::Fired,
            StepEvent::TimedOut => StepOutcome::TimedOut,
            StepEvent::Cancelled => StepOutcome::Cancelled,
            // 스트림 끝: delay는 한 줄이라도 검사했다면 통과로 봅니다
            StepEvent::Pending if step.step_type == StepType::Delay && cursor.scanned_any() => {
                StepOutcome::TimedOut
            }
            StepEvent::Pending => StepOutcome::Incomplete,
        };

        let trace = cursor.finish(outcome);
        let completed_at = trace.completed_at;
        trace!(
            recipe_id = %recipe.id,
            step = %trace.name,
            outcome = ?outcome,
            line = pos,
            "step finished"
        );
        pass.steps.push(trace);

        match outcome {
            StepOutcome::Incomplete => {
                pass.resume_offset = lines.len().max(pos);
                return pass;
            }
            StepOutcome::Cancelled => {
                pass.resets += 1;
                counter!(TRIGGER_CANCELLATIONS_TOTAL, LABEL_RECIPE => recipe.id.clone())
                    .increment(1);
                debug!(
                    recipe_id = %recipe.id,
                    step = %step.name,
                    resets = pass.resets,
                    "delay cancelled, chain reset"
                );
                if pass.resets > DELAY_RESET_CEILING {
                    warn!(
                        recipe_id = %recipe.id,
                        ceiling = DELAY_RESET_CEILING,
                        "delay reset ceiling reached, pass aborted"
                    );
                    counter!(TRIGGER_CAP_REACHED_TOTAL, LABEL_RECIPE => recipe.id.clone())
                        .increment(1);
                    pass.cap_reached = true;
                    pass.resume_offset = pos;
                    return pass;
                }
                step_idx = 0;
                previous_timestamp = None;
                idle_transitions = 0;
            }
            StepOutcome::Fired | StepOutcome::TimedOut => match recipe.resolve_next(step) {
                NextTarget::Step(next) => {
                    if pos == step_start {
                        idle_transitions += 1;
                        if idle_transitions > recipe.steps.len() {
                            warn!(
                                recipe_id = %recipe.id,
                                line = pos + 1,
                                "step transitions made no progress, pass stopped"
                            );
                            pass.stalled = true;
                            pass.resume_offset = pos;
                            return pass;
                        }
                    } else {
                        idle_transitions = 0;
                    }
                    step_idx = next;
                    previous_timestamp = completed_at;
                }
                target => {
                    debug!(recipe_id = %recipe.id, next = ?target, "chain completed");
                    pass.fired = true;
                    pass.firing_timestamp = completed_at;
                    pass.terminal = Some(target);
                    pass.resume_offset = pos;
                    return pass;
                }
            },
        }
    }
}
