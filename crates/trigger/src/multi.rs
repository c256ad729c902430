//! MULTI 상관기 -- 캡처 키별로 독립된 체인 인스턴스를 추적합니다.
//!
//! 라인마다 다음 순서로 처리합니다.
//! 1. 활성 인스턴스를 생성 순서대로 진행시킵니다. delay 타임아웃은 같은 라인을
//!    다음 스텝에 다시 넘깁니다.
//! 2. 첫 스텝 패턴으로 새 인스턴스 생성을 시도합니다. 키는 매칭의 첫 번째 이름 있는
//!    캡처 값이며, 같은 키의 활성 인스턴스가 있거나 활성 인스턴스가 상한에 도달하면
//!    생성하지 않습니다.
//!
//! 두 번째 스텝부터의 패턴은 인스턴스의 캡처 값으로 역참조를 치환해 인스턴스별로 컴파일합니다.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use logtrig_core::metrics::{
    LABEL_RECIPE, MULTI_INSTANCES_REFUSED_TOTAL, MULTI_INSTANCES_SPAWNED_TOTAL,
    TRIGGER_FIRINGS_TOTAL, TRIGGER_SUPPRESSED_TOTAL,
};
use logtrig_core::pattern::Captures;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::chain::PreparedRecipe;
use crate::limiter::RateLimiter;
use crate::recipe::{NextTarget, StepType, TriggerRecipe};
use crate::step::{
    CompiledStep, LineBuffer, MatchRecord, ScanControl, ScanLine, StepCursor, StepEvent,
    StepOutcome, StepTrace,
};

/// 동시에 활성화될 수 있는 최대 인스턴스 수
pub const MAX_ACTIVE_INSTANCES: usize = 20;

/// 인스턴스 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    Fired,
    Cancelled,
    Incomplete,
}

/// 캡처 키 하나에 대한 체인 인스턴스
#[derive(Debug, Clone, Serialize)]
pub struct MultiInstance {
    /// 생성 순번 (1부터)
    pub id: usize,
    pub captured_key: String,
    pub captured_groups: Captures,
    /// 인스턴스를 만든 라인 번호
    pub created_line: usize,
    pub current_step: usize,
    pub status: InstanceStatus,
    pub steps: Vec<StepTrace>,
    pub firing_timestamp: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<NextTarget>,
    pub suppressed: bool,
}

/// 상관기 실행 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct MultiOutcome {
    pub instances: Vec<MultiInstance>,
    pub spawned: usize,
    /// 활성 인스턴스 상한으로 거부된 생성 시도
    pub refused: usize,
    /// 같은 키의 활성 인스턴스가 있어 건너뛴 생성 시도
    pub duplicates: usize,
    pub diagnostics: Vec<String>,
    pub cancelled: bool,
}

impl MultiOutcome {
    /// 발사한 인스턴스 (발사 순서가 아닌 생성 순서)
    pub fn fired(&self) -> impl Iterator<Item = &MultiInstance> {
        self.instances
            .iter()
            .filter(|i| i.status == InstanceStatus::Fired)
    }
}

/// 인스턴스별 실행 상태
struct InstanceRun {
    instance: MultiInstance,
    cursor: Option<StepCursor>,
    compiled: HashMap<usize, CompiledStep>,
}

/// 인스턴스 밖에서 공유하는 가변 상태
struct Shared<'a> {
    recipe: &'a TriggerRecipe,
    limiter: RateLimiter,
    include_rejected: bool,
    diagnostics: Vec<String>,
}

impl Shared<'_> {
    fn diagnose(&mut self, messages: Vec<String>) {
        for message in messages {
            if !self.diagnostics.contains(&message) {
                self.diagnostics.push(message);
            }
        }
    }
}

impl InstanceRun {
    fn spawn(id: usize, record: MatchRecord, key: String, shared: &mut Shared<'_>) -> Self {
        let recipe = shared.recipe;
        let first = &recipe.steps[0];
        let completed_at = record.timestamp;
        let created_line = record.line_number;
        let captured_groups = record.captures.clone();

        let trace = StepTrace {
            step_index: 0,
            name: first.name.clone(),
            step_type: first.step_type,
            outcome: StepOutcome::Fired,
            matches: vec![record],
            rejected: Vec::new(),
            window: None,
            previous_timestamp: None,
            completed_at,
            attempt: 0,
            first_line: Some(created_line),
            last_line: Some(created_line),
        };

        let mut run = Self {
            instance: MultiInstance {
                id,
                captured_key: key,
                captured_groups,
                created_line,
                current_step: 0,
                status: InstanceStatus::Active,
                steps: vec![trace],
                firing_timestamp: None,
                terminal: None,
                suppressed: false,
            },
            cursor: None,
            compiled: HashMap::new(),
        };
        run.follow_next(completed_at, shared);
        run
    }

    fn is_active(&self) -> bool {
        self.instance.status == InstanceStatus::Active
    }

    /// 성공한 현재 스텝의 `next`를 따라갑니다.
    fn follow_next(&mut self, completed_at: Option<NaiveDateTime>, shared: &mut Shared<'_>) {
        let recipe = shared.recipe;
        let step = &recipe.steps[self.instance.current_step];
        match recipe.resolve_next(step) {
            NextTarget::Step(next) => {
                self.instance.current_step = next;
                self.cursor = Some(StepCursor::new(
                    next,
                    &recipe.steps[next],
                    completed_at,
                    0,
                    shared.include_rejected,
                ));
            }
            target => {
                let suppressed = !shared.limiter.admit(completed_at);
                counter!(TRIGGER_FIRINGS_TOTAL, LABEL_RECIPE => recipe.id.clone()).increment(1);
                if suppressed {
                    counter!(TRIGGER_SUPPRESSED_TOTAL, LABEL_RECIPE => recipe.id.clone())
                        .increment(1);
                }
                info!(
                    recipe_id = %recipe.id,
                    key = %self.instance.captured_key,
                    suppressed,
                    "multi instance fired"
                );
                self.instance.status = InstanceStatus::Fired;
                self.instance.firing_timestamp = completed_at;
                self.instance.terminal = Some(target);
                self.instance.suppressed = suppressed;
                self.cursor = None;
            }
        }
    }

    fn compiled_step(&mut self, index: usize, shared: &mut Shared<'_>) -> &CompiledStep {
        let recipe = shared.recipe;
        let bindings = &self.instance.captured_groups;
        self.compiled.entry(index).or_insert_with(|| {
            let mut diagnostics = Vec::new();
            let compiled =
                CompiledStep::compile(&recipe.steps[index], Some(bindings), &mut diagnostics);
            shared.diagnose(diagnostics);
            compiled
        })
    }

    /// 라인 하나로 인스턴스를 진행시킵니다.
    fn advance(&mut self, line: &ScanLine<'_>, shared: &mut Shared<'_>) {
        let mut hops = 0usize;
        while let Some(mut cursor) = self.cursor.take() {
            let index = cursor.step_index();
            let event = {
                let compiled = self.compiled_step(index, shared);
                cursor.feed(compiled, line)
            };
            match event {
                StepEvent::Pending => {
                    self.cursor = Some(cursor);
                    return;
                }
                StepEvent::Cancelled => {
                    debug!(
                        recipe_id = %shared.recipe.id,
                        key = %self.instance.captured_key,
                        line = line.number,
                        "multi instance cancelled"
                    );
                    self.instance.steps.push(cursor.finish(StepOutcome::Cancelled));
                    self.instance.status = InstanceStatus::Cancelled;
                    return;
                }
                StepEvent::Fired => {
                    let trace = cursor.finish(StepOutcome::Fired);
                    let completed_at = trace.completed_at;
                    self.instance.steps.push(trace);
                    self.follow_next(completed_at, shared);
                    return;
                }
                StepEvent::TimedOut => {
                    let trace = cursor.finish(StepOutcome::TimedOut);
                    let completed_at = trace.completed_at;
                    self.instance.steps.push(trace);
                    self.follow_next(completed_at, shared);
                    hops += 1;
                    if hops > shared.recipe.steps.len() {
                        warn!(
                            recipe_id = %shared.recipe.id,
                            key = %self.instance.captured_key,
                            "step transitions made no progress, instance stopped"
                        );
                        if let Some(stalled) = self.cursor.take() {
                            self.instance.steps.push(stalled.finish(StepOutcome::Incomplete));
                        }
                        self.instance.status = InstanceStatus::Incomplete;
                        return;
                    }
                }
            }
        }
    }

    /// 스트림 끝 처리
    fn finish_stream(&mut self, last_line: usize, shared: &mut Shared<'_>) {
        let mut hops = 0usize;
        while let Some(cursor) = self.cursor.take() {
            let is_delay = cursor.step_type() == StepType::Delay;
            if !is_delay {
                self.instance.steps.push(cursor.finish(StepOutcome::Incomplete));
                self.instance.status = InstanceStatus::Incomplete;
                return;
            }
            if self.instance.created_line == last_line || hops > shared.recipe.steps.len() {
                // 활성 상태로 남습니다
                self.instance.steps.push(cursor.finish(StepOutcome::Incomplete));
                return;
            }
            let trace = cursor.finish(StepOutcome::TimedOut);
            let completed_at = trace.completed_at;
            self.instance.steps.push(trace);
            self.follow_next(completed_at, shared);
            hops += 1;
        }
    }
}

/// MULTI 레시피를 평가합니다.
pub fn correlate(
    prepared: &PreparedRecipe<'_>,
    lines: &LineBuffer<'_>,
    control: &ScanControl<'_>,
) -> MultiOutcome {
    let recipe = prepared.recipe();
    let mut outcome = MultiOutcome::default();
    let Some(spawner) = prepared.step(0) else {
        return outcome;
    };

    let mut shared = Shared {
        recipe,
        limiter: RateLimiter::new(recipe.limitation.as_ref()),
        include_rejected: control.include_rejected,
        diagnostics: Vec::new(),
    };
    let mut runs: Vec<InstanceRun> = Vec::new();
    let mut refusal_logged = false;

    for offset in 0..lines.len() {
        let Some(line) = lines.get(offset) else { break };
        if control.is_cancelled() {
            debug!(recipe_id = %recipe.id, line = line.number, "multi correlation cancelled");
            outcome.cancelled = true;
            break;
        }

        for run in runs.iter_mut().filter(|r| r.is_active()) {
            run.advance(line, &mut shared);
        }

        let Some(record) = spawner.test_capturing(line).accepted else {
            continue;
        };
        let Some(key) = record.captures.first().map(|(_, value)| value.to_owned()) else {
            trace!(line = line.number, "spawning match without capture, ignored");
            continue;
        };

        if runs
            .iter()
            .any(|r| r.is_active() && r.instance.captured_key == key)
        {
            trace!(line = line.number, key = %key, "instance already active for key");
            outcome.duplicates += 1;
            continue;
        }

        let active = runs.iter().filter(|r| r.is_active()).count();
        if active >= MAX_ACTIVE_INSTANCES {
            outcome.refused += 1;
            counter!(MULTI_INSTANCES_REFUSED_TOTAL, LABEL_RECIPE => recipe.id.clone()).increment(1);
            if !refusal_logged {
                warn!(
                    recipe_id = %recipe.id,
                    max = MAX_ACTIVE_INSTANCES,
                    line = line.number,
                    "active instance cap reached, refusing new keys"
                );
                refusal_logged = true;
            }
            continue;
        }

        let id = runs.len() + 1;
        counter!(MULTI_INSTANCES_SPAWNED_TOTAL, LABEL_RECIPE => recipe.id.clone()).increment(1);
        debug!(
            recipe_id = %recipe.id,
            key = %key,
            id,
            line = line.number,
            "multi instance spawned"
        );
        runs.push(InstanceRun::spawn(id, record, key, &mut shared));
        outcome.spawned += 1;
    }

    if outcome.cancelled {
        for run in runs.iter_mut().filter(|r| r.is_active()) {
            if let Some(cursor) = run.cursor.take() {
                run.instance.steps.push(cursor.finish(StepOutcome::Incomplete));
            }
        }
    } else {
        let last_line = lines.len();
        for run in runs.iter_mut().filter(|r| r.is_active()) {
            run.finish_stream(last_line, &mut shared);
        }
    }

    outcome.diagnostics = shared.diagnostics;
    outcome.instances = runs.into_iter().map(|r| r.instance).collect();
    outcome
}
