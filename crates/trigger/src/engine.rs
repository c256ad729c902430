//! 트리거 엔진 -- 레시피와 로그 텍스트를 받아 평가 리포트를 만듭니다.
//!
//! 레시피 클래스에 따라 실행 경로가 나뉩니다.
//! - SINGLE: [`limiter::drive`](crate::limiter::drive)로 체인을 반복 실행
//! - MULTI: [`multi::correlate`](crate::multi::correlate)로 키별 인스턴스 추적
//!
//! # 사용 예시
//! ```
//! use logtrig_trigger::{EvalOptions, RecipeLoader, TriggerEngine};
//!
//! let recipe = RecipeLoader::parse_yaml(
//!     "id: disk\nsteps:\n  - name: full\n    trigger: ['\\S+ disk full']\n",
//!     "disk.yml",
//! ).unwrap();
//! let options = EvalOptions::default().with_timestamp_format("HH:mm:ss");
//! let report = TriggerEngine::evaluate(&recipe, "10:00:00 disk full", &options);
//! assert!(report.triggered);
//! ```

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use logtrig_core::timestamp::TimestampFormat;
use serde::Serialize;
use tracing::{debug, info};

use crate::chain::{ChainPass, PreparedRecipe};
use crate::limiter::{Firing, drive};
use crate::multi::{InstanceStatus, MultiInstance, correlate};
use crate::recipe::{RecipeClass, TriggerRecipe};
use crate::step::{LineBuffer, ScanControl};

/// 평가 옵션
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// 라인 타임스탬프 형식 (없으면 모든 시간 윈도우가 비활성화됨)
    pub timestamp_format: Option<TimestampFormat>,
    /// 사후 조건에서 걸러진 매칭을 트레이스에 포함할지 여부
    pub include_rejected: bool,
    /// 협조적 취소 플래그
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            timestamp_format: None,
            include_rejected: true,
            cancel: None,
        }
    }
}

impl EvalOptions {
    /// 타임스탬프 형식을 설정합니다. 토큰이 없는 형식은 무시됩니다.
    pub fn with_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = TimestampFormat::new(format);
        self
    }

    pub fn with_include_rejected(mut self, include: bool) -> Self {
        self.include_rejected = include;
        self
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// 리포트 요약
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    /// 기록된 발사 수 (억제 포함)
    pub firings: usize,
    pub suppressed: usize,
    pub cap_reached: bool,
    pub instances_spawned: usize,
    pub instances_refused: usize,
}

/// 평가 리포트
#[derive(Debug, Clone, Serialize)]
pub struct TriggerReport {
    pub recipe_id: String,
    pub class: RecipeClass,
    /// 억제되지 않은 발사가 하나 이상 있는지 여부
    pub triggered: bool,
    pub lines_scanned: usize,
    /// 타임스탬프가 추출된 라인 수
    pub lines_timestamped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_format: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub firings: Vec<Firing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing: Option<ChainPass>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<MultiInstance>,
    pub diagnostics: Vec<String>,
    pub summary: ReportSummary,
    pub cancelled: bool,
}

/// 트리거 엔진
pub struct TriggerEngine;

impl TriggerEngine {
    /// 레시피를 로그 텍스트에 대해 평가합니다.
    ///
    /// 잘못된 패턴이나 기간은 평가를 중단시키지 않고 `diagnostics`에 기록됩니다.
    pub fn evaluate(recipe: &TriggerRecipe, text: &str, options: &EvalOptions) -> TriggerReport {
        let lines = LineBuffer::new(text, options.timestamp_format.as_ref());
        let prepared = PreparedRecipe::new(recipe);
        let control = ScanControl {
            include_rejected: options.include_rejected,
            cancel: options.cancel.as_deref(),
        };

        let mut report = TriggerReport {
            recipe_id: recipe.id.clone(),
            class: recipe.class,
            triggered: false,
            lines_scanned: lines.len(),
            lines_timestamped: lines.timestamped(),
            timestamp_format: options
                .timestamp_format
                .as_ref()
                .map(|f| f.as_str().to_owned()),
            firings: Vec::new(),
            trailing: None,
            instances: Vec::new(),
            diagnostics: prepared.diagnostics().to_vec(),
            summary: ReportSummary::default(),
            cancelled: false,
        };

        let uses_windows = recipe.steps.iter().any(|s| s.window().is_some())
            || recipe
                .limitation
                .as_ref()
                .is_some_and(|l| l.duration.window().is_some());
        if uses_windows && options.timestamp_format.is_none() {
            report
                .diagnostics
                .push("no timestamp format configured, duration windows are disabled".to_owned());
        }

        debug!(
            recipe_id = %recipe.id,
            class = ?recipe.class,
            lines = lines.len(),
            "evaluating recipe"
        );

        match recipe.class {
            RecipeClass::Single => {
                let outcome = drive(&prepared, &lines, &control);
                report.summary.firings = outcome.firings.len();
                report.summary.suppressed = outcome.firings.iter().filter(|f| f.suppressed).count();
                report.summary.cap_reached = outcome.cap_reached;
                report.triggered = outcome.effective_firings() > 0;
                report.cancelled = outcome.cancelled;
                report.firings = outcome.firings;
                report.trailing = outcome.trailing;
            }
            RecipeClass::Multi => {
                let outcome = correlate(&prepared, &lines, &control);
                let fired: Vec<&MultiInstance> = outcome.fired().collect();
                report.summary.firings = fired.len();
                report.summary.suppressed = fired.iter().filter(|i| i.suppressed).count();
                report.summary.cap_reached = outcome.refused > 0;
                report.summary.instances_spawned = outcome.spawned;
                report.summary.instances_refused = outcome.refused;
                report.triggered = fired.iter().any(|i| !i.suppressed);
                report.cancelled = outcome.cancelled;
                for message in outcome.diagnostics {
                    if !report.diagnostics.contains(&message) {
                        report.diagnostics.push(message);
                    }
                }
                report.instances = outcome.instances;
            }
        }

        info!(
            recipe_id = %recipe.id,
            triggered = report.triggered,
            firings = report.summary.firings,
            suppressed = report.summary.suppressed,
            "recipe evaluated"
        );

        report
    }
}

impl TriggerReport {
    /// 아직 활성 상태인 MULTI 인스턴스 수
    pub fn active_instances(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| i.status == InstanceStatus::Active)
            .count()
    }
}
