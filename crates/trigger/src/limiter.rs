//! 재발사 드라이버와 속도 제한기
//!
//! 드라이버는 체인이 완료될 때마다 직전 패스가 멈춘 라인부터 다시 패스를 시작합니다.
//! 모든 완료는 [`Firing`]으로 기록되며, 속도 제한에 걸린 완료는 `suppressed`로 표시됩니다.
//! 억제된 발사도 발사 상한(`MAX_FIRINGS`)에는 포함됩니다.

use std::collections::VecDeque;

use chrono::{NaiveDateTime, TimeDelta};
use logtrig_core::metrics::{
    LABEL_RECIPE, TRIGGER_CAP_REACHED_TOTAL, TRIGGER_FIRINGS_TOTAL, TRIGGER_SUPPRESSED_TOTAL,
};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chain::{ChainPass, PreparedRecipe, run_chain};
use crate::recipe::Limitation;
use crate::step::{LineBuffer, ScanControl};

/// 한 번의 평가에서 기록할 최대 발사 수
pub const MAX_FIRINGS: usize = 100;

/// 롤링 윈도우 속도 제한기
///
/// 새 발사 시각에서 윈도우 안에 있는 (허용된) 이전 발사가 `times`개 이상이면 억제합니다.
/// 제한이 없거나, 윈도우가 비활성화되었거나, 발사 시각을 모르면 항상 허용합니다.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    times: usize,
    window: Option<TimeDelta>,
    admitted: VecDeque<NaiveDateTime>,
}

impl RateLimiter {
    pub fn new(limitation: Option<&Limitation>) -> Self {
        match limitation {
            Some(l) => Self {
                times: usize::try_from(l.times).unwrap_or(usize::MAX),
                window: l.duration.window(),
                admitted: VecDeque::new(),
            },
            None => Self::default(),
        }
    }

    /// 제한이 활성화되어 있는지 여부
    pub fn is_active(&self) -> bool {
        self.times > 0 && self.window.is_some()
    }

    /// 발사를 허용하면 `true`, 억제하면 `false`를 반환합니다.
    pub fn admit(&mut self, at: Option<NaiveDateTime>) -> bool {
        let (Some(window), Some(at)) = (self.window, at) else {
            return true;
        };
        if self.times == 0 {
            return true;
        }

        let recent = self
            .admitted
            .iter()
            .filter(|prior| at - **prior <= window && **prior <= at)
            .count();
        if recent >= self.times {
            return false;
        }

        self.admitted.push_back(at);
        while let Some(front) = self.admitted.front()
            && at - *front > window
        {
            self.admitted.pop_front();
        }
        true
    }
}

/// 기록된 체인 완료
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Firing {
    /// 0부터 시작하는 발사 순번
    pub index: usize,
    pub suppressed: bool,
    #[serde(flatten)]
    pub pass: ChainPass,
}

/// 드라이버 실행 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriveOutcome {
    pub firings: Vec<Firing>,
    /// 발사하지 못한 마지막 패스
    pub trailing: Option<ChainPass>,
    /// 발사 상한 또는 리셋 상한에 도달함
    pub cap_reached: bool,
    pub cancelled: bool,
}

impl DriveOutcome {
    /// 억제되지 않은 발사 수
    pub fn effective_firings(&self) -> usize {
        self.firings.iter().filter(|f| !f.suppressed).count()
    }
}

/// SINGLE 레시피를 스트림 끝까지 반복 실행합니다.
pub fn drive(
    prepared: &PreparedRecipe<'_>,
    lines: &LineBuffer<'_>,
    control: &ScanControl<'_>,
) -> DriveOutcome {
    let recipe = prepared.recipe();
    let mut limiter = RateLimiter::new(recipe.limitation.as_ref());
    let mut outcome = DriveOutcome::default();
    let mut offset = 0usize;

    loop {
        let pass = run_chain(prepared, lines, 0, offset, control);

        if pass.cancelled {
            outcome.cancelled = true;
            outcome.trailing = Some(pass);
            break;
        }
        if !pass.fired {
            outcome.cap_reached |= pass.cap_reached;
            outcome.trailing = Some(pass);
            break;
        }

        let suppressed = !limiter.admit(pass.firing_timestamp);
        counter!(TRIGGER_FIRINGS_TOTAL, LABEL_RECIPE => recipe.id.clone()).increment(1);
        if suppressed {
            counter!(TRIGGER_SUPPRESSED_TOTAL, LABEL_RECIPE => recipe.id.clone()).increment(1);
            debug!(
                recipe_id = %recipe.id,
                at = ?pass.firing_timestamp,
                "firing suppressed by limitation"
            );
        } else {
            info!(recipe_id = %recipe.id, at = ?pass.firing_timestamp, "trigger fired");
        }

        let next_offset = pass.resume_offset;
        outcome.firings.push(Firing {
            index: outcome.firings.len(),
            suppressed,
            pass,
        });

        if next_offset <= offset || next_offset >= lines.len() {
            break;
        }
        if outcome.firings.len() >= MAX_FIRINGS {
            warn!(
                recipe_id = %recipe.id,
                max = MAX_FIRINGS,
                "firing cap reached, remaining lines ignored"
            );
            counter!(TRIGGER_CAP_REACHED_TOTAL, LABEL_RECIPE => recipe.id.clone()).increment(1);
            outcome.cap_reached = true;
            break;
        }
        offset = next_offset;
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{Step, TriggerRecipe};
    use logtrig_core::duration::DurationSpec;
    use logtrig_core::timestamp::TimestampFormat;

    fn at(text: &str) -> Option<NaiveDateTime> {
        TimestampFormat::new("HH:mm:ss").and_then(|f| f.parse(text))
    }

    fn limitation(times: u32, duration: &str) -> Limitation {
        Limitation {
            times,
            duration: DurationSpec::new(duration),
        }
    }

    #[test]
    fn limiter_suppresses_within_window() {
        let l = limitation(1, "1 minutes");
        let mut limiter = RateLimiter::new(Some(&l));
        assert!(limiter.admit(at("10:00:00")));
        assert!(!limiter.admit(at("10:00:10")));
        assert!(limiter.admit(at("10:01:10")));
    }

    #[test]
    fn limiter_counts_only_admitted_firings() {
        let l = limitation(2, "1 minutes");
        let mut limiter = RateLimiter::new(Some(&l));
        assert!(limiter.admit(at("10:00:00")));
        assert!(limiter.admit(at("10:00:10")));
        assert!(!limiter.admit(at("10:00:20")));
        assert!(!limiter.admit(at("10:00:50")));
        assert!(limiter.admit(at("10:01:05")));
    }

    #[test]
    fn limiter_without_window_or_timestamp_always_admits() {
        let mut none = RateLimiter::new(None);
        assert!(!none.is_active());
        assert!(none.admit(at("10:00:00")));
        assert!(none.admit(at("10:00:00")));

        let l = limitation(1, "whenever");
        let mut broken = RateLimiter::new(Some(&l));
        assert!(!broken.is_active());
        assert!(broken.admit(at("10:00:00")));
        assert!(broken.admit(at("10:00:01")));

        let l = limitation(1, "1 minutes");
        let mut untimed = RateLimiter::new(Some(&l));
        assert!(untimed.admit(None));
        assert!(untimed.admit(None));
    }

    fn fail_recipe(limitation: Option<Limitation>) -> TriggerRecipe {
        TriggerRecipe {
            id: "fail".to_owned(),
            limitation,
            steps: vec![Step::regex("a", &[r"\S+ FAIL"]).with_next("@notify")],
            ..Default::default()
        }
    }

    fn drive_text(recipe: &TriggerRecipe, text: &str) -> DriveOutcome {
        let fmt = TimestampFormat::new("HH:mm:ss").unwrap();
        let lines = LineBuffer::new(text, Some(&fmt));
        let prepared = PreparedRecipe::new(recipe);
        drive(&prepared, &lines, &ScanControl::default())
    }

    #[test]
    fn driver_refires_from_resume_offset() {
        let recipe = fail_recipe(None);
        let outcome = drive_text(&recipe, "10:00:00 FAIL\n10:00:01 ok\n10:00:02 FAIL\n10:00:03 ok");
        assert_eq!(outcome.firings.len(), 2);
        assert_eq!(outcome.firings[1].pass.start_offset, 1);
        let trailing = outcome.trailing.expect("trailing pass");
        assert!(!trailing.fired);
        assert_eq!(trailing.start_offset, 3);
    }

    #[test]
    fn driver_stops_when_last_line_fires() {
        let recipe = fail_recipe(None);
        let outcome = drive_text(&recipe, "10:00:00 FAIL");
        assert_eq!(outcome.firings.len(), 1);
        assert!(outcome.trailing.is_none());
    }

    #[test]
    fn driver_marks_suppressed_firings() {
        let recipe = fail_recipe(Some(limitation(1, "1 minutes")));
        let outcome = drive_text(&recipe, "10:00:00 FAIL\n10:00:10 FAIL\n10:01:10 FAIL");
        let suppressed: Vec<bool> = outcome.firings.iter().map(|f| f.suppressed).collect();
        assert_eq!(suppressed, vec![false, true, false]);
        assert_eq!(outcome.effective_firings(), 2);
    }

    #[test]
    fn driver_caps_firings() {
        let recipe = fail_recipe(None);
        let text = "10:00:00 FAIL\n".repeat(MAX_FIRINGS + 10);
        let outcome = drive_text(&recipe, &text);
        assert_eq!(outcome.firings.len(), MAX_FIRINGS);
        assert!(outcome.cap_reached);
    }

    #[test]
    fn firing_serializes_flat() {
        let recipe = fail_recipe(None);
        let outcome = drive_text(&recipe, "10:00:00 FAIL");
        let json = serde_json::to_value(&outcome.firings[0]).unwrap();
        assert_eq!(json["index"], 0);
        assert_eq!(json["fired"], true);
        assert_eq!(json["terminal"]["kind"], "terminal");
        assert_eq!(json["terminal"]["target"], "notify");
    }
}
