//! 트리거 레시피 데이터 타입
//!
//! YAML 레시피 파일에서 역직렬화되는 구조체들을 정의합니다.
//! 문자열/객체 두 형태를 갖는 필드(`source`, `trigger` 항목)는 역직렬화 경계에서
//! 한 번만 정규화됩니다.

use std::collections::HashSet;
use std::fmt;

use logtrig_core::duration::DurationSpec;
use serde::{Deserialize, Serialize};

use super::condition::PostConditions;

/// 트리거 레시피 -- 하나의 YAML 파일에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// id: login-burst
/// title: Repeated login failures
/// class: multi
/// source: "auth, web"
/// limitation: { times: 1, duration: "1 minutes" }
/// steps:
///   - name: start
///     type: regex
///     trigger:
///       - "(<<ts>>\\S+ \\S+) login failed user=<<user>>"
///       - syntax: "(<<ts>>\\S+ \\S+) latency=(<<ms>>\\d+)"
///         params: "1,500,>,ms"
///     times: 3
///     duration: "10 seconds"
///     next: "@script"
///     script: restart.sh
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerRecipe {
    /// 레시피 고유 ID
    pub id: String,
    /// 표시용 제목
    #[serde(default)]
    pub title: String,
    /// 실행 클래스
    #[serde(default)]
    pub class: RecipeClass,
    /// 대상 로그 소스 ID 목록
    #[serde(default)]
    pub source: SourceList,
    /// 재발사 속도 제한
    #[serde(default)]
    pub limitation: Option<Limitation>,
    /// 순서가 있는 스텝 목록
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl TriggerRecipe {
    /// 이름으로 스텝 인덱스를 찾습니다.
    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// 스텝의 `next`를 해석합니다.
    pub fn resolve_next(&self, step: &Step) -> NextTarget {
        let next = step.next.trim();
        if next.is_empty() {
            return NextTarget::End;
        }
        if let Some(action) = TerminalAction::parse(next) {
            return NextTarget::Terminal(action);
        }
        match self.step_index(next) {
            Some(idx) => NextTarget::Step(idx),
            None => NextTarget::Unresolved(next.to_owned()),
        }
    }

    /// 실행을 막지는 않지만 의도와 다를 수 있는 설정을 보고합니다.
    pub fn lint(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for step in &self.steps {
            if let NextTarget::Unresolved(target) = self.resolve_next(step) {
                warnings.push(format!(
                    "step '{}': next '{target}' does not resolve, chain ends here",
                    step.name
                ));
            }

            for (idx, item) in step.trigger.iter().enumerate() {
                if let Some(PostConditions::Malformed { raw, reason }) = &item.post_conditions {
                    warnings.push(format!(
                        "step '{}': trigger[{idx}] params '{raw}' is malformed ({reason}), \
                         pattern never fires",
                        step.name
                    ));
                }
            }

            if let Some(ref duration) = step.duration
                && !duration.raw().trim().is_empty()
                && duration.millis().is_none()
            {
                warnings.push(format!(
                    "step '{}': duration '{duration}' is not parseable, window disabled",
                    step.name
                ));
            }

            if step.trigger.is_empty() {
                warnings.push(format!("step '{}': no trigger patterns", step.name));
            }

            if step.step_type == StepType::Delay && step.times > 1 {
                warnings.push(format!(
                    "step '{}': times is ignored for delay steps",
                    step.name
                ));
            }
        }

        if let Some(ref limitation) = self.limitation
            && !limitation.duration.raw().trim().is_empty()
            && limitation.duration.millis().is_none()
        {
            warnings.push(format!(
                "limitation duration '{}' is not parseable, rate limiting disabled",
                limitation.duration
            ));
        }

        if self.class == RecipeClass::Multi
            && let Some(first) = self.steps.first()
        {
            if first.times > 1 {
                warnings.push(format!(
                    "step '{}': times is ignored for the spawning step of a multi recipe",
                    first.name
                ));
            }
            if !first.trigger.iter().any(|t| t.text.contains("<<")) {
                warnings.push(format!(
                    "step '{}': multi recipe spawning step has no named capture",
                    first.name
                ));
            }
        }

        warnings
    }

    /// 중복된 스텝 이름을 반환합니다.
    pub(crate) fn duplicate_step_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .filter(|s| !seen.insert(s.name.as_str()))
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// 실행 클래스
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeClass {
    /// 단일 체인 (재발사 드라이버)
    #[default]
    #[serde(alias = "")]
    Single,
    /// 캡처 키별 인스턴스 추적
    #[serde(alias = "MULTI", alias = "Multi")]
    Multi,
}

/// 쉼표로 구분된 문자열 또는 목록으로 표현되는 로그 소스 ID 집합
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSourceList", into = "Vec<String>")]
pub struct SourceList(Vec<String>);

impl SourceList {
    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSourceList {
    Joined(String),
    List(Vec<String>),
}

impl From<RawSourceList> for SourceList {
    fn from(raw: RawSourceList) -> Self {
        let parts: Vec<String> = match raw {
            RawSourceList::Joined(s) => s.split(',').map(str::to_owned).collect(),
            RawSourceList::List(v) => v,
        };
        Self(
            parts
                .into_iter()
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

impl From<SourceList> for Vec<String> {
    fn from(list: SourceList) -> Self {
        list.0
    }
}

/// 재발사 속도 제한
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limitation {
    /// 윈도우 내 허용 발사 수
    pub times: u32,
    /// 롤링 윈도우
    pub duration: DurationSpec,
}

/// 스텝 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    /// 패턴이 매칭되면 성공
    #[default]
    Regex,
    /// 윈도우 동안 패턴이 매칭되지 않으면 성공 (매칭은 취소)
    Delay,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex => f.write_str("regex"),
            Self::Delay => f.write_str("delay"),
        }
    }
}

fn default_times() -> u32 {
    1
}

/// 레시피 스텝
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// 레시피 내 고유 이름 (`next`가 참조)
    pub name: String,
    #[serde(rename = "type", default)]
    pub step_type: StepType,
    /// 패턴 목록 (하나라도 매칭되면 이벤트)
    #[serde(default)]
    pub trigger: Vec<PatternItem>,
    /// 필요한 매칭 수
    #[serde(default = "default_times")]
    pub times: u32,
    /// 시간 윈도우
    #[serde(default)]
    pub duration: Option<DurationSpec>,
    /// 다음 스텝 이름, 종료 액션 태그, 또는 빈 값
    #[serde(default)]
    pub next: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<String>,
}

impl Step {
    /// 정규식 스텝을 생성합니다.
    pub fn regex(name: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            name: name.into(),
            step_type: StepType::Regex,
            trigger: patterns.iter().map(|p| PatternItem::plain(*p)).collect(),
            times: 1,
            duration: None,
            next: String::new(),
            script: None,
            detail: None,
            suspend: None,
            resume: None,
        }
    }

    /// delay 스텝을 생성합니다.
    pub fn delay(name: impl Into<String>, patterns: &[&str], duration: &str) -> Self {
        Self {
            step_type: StepType::Delay,
            duration: Some(DurationSpec::new(duration)),
            ..Self::regex(name, patterns)
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = next.into();
        self
    }

    pub fn with_times(mut self, times: u32) -> Self {
        self.times = times;
        self
    }

    pub fn with_duration(mut self, duration: &str) -> Self {
        self.duration = Some(DurationSpec::new(duration));
        self
    }

    /// 윈도우 계산용 기간 (없거나 파싱 실패 또는 0이면 `None`)
    pub fn window(&self) -> Option<chrono::TimeDelta> {
        self.duration.as_ref().and_then(DurationSpec::window)
    }
}

/// 패턴 항목 -- 패턴 문자열과 선택적인 사후 조건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPatternItem")]
pub struct PatternItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_conditions: Option<PostConditions>,
}

impl PatternItem {
    /// 사후 조건 없는 패턴
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            post_conditions: None,
        }
    }

    /// `params` 식을 가진 패턴
    pub fn with_params(text: impl Into<String>, params: &str) -> Self {
        Self {
            text: text.into(),
            post_conditions: PostConditions::parse(params),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPatternItem {
    Plain(String),
    Detailed {
        syntax: String,
        #[serde(default)]
        params: Option<String>,
    },
}

impl From<RawPatternItem> for PatternItem {
    fn from(raw: RawPatternItem) -> Self {
        match raw {
            RawPatternItem::Plain(text) => Self::plain(text),
            RawPatternItem::Detailed { syntax, params } => Self {
                text: syntax,
                post_conditions: params.as_deref().and_then(PostConditions::parse),
            },
        }
    }
}

/// 종료 액션
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalAction {
    Script,
    Recovery,
    Notify,
    Popup,
    Suspend,
    Resume,
}

impl TerminalAction {
    /// `@script` 형태의 태그를 해석합니다. 알 수 없는 태그는 `None`입니다.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().strip_prefix('@')?.to_ascii_lowercase().as_str() {
            "script" => Some(Self::Script),
            "recovery" => Some(Self::Recovery),
            "notify" => Some(Self::Notify),
            "popup" => Some(Self::Popup),
            "suspend" => Some(Self::Suspend),
            "resume" => Some(Self::Resume),
            _ => None,
        }
    }
}

impl fmt::Display for TerminalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Script => "@script",
            Self::Recovery => "@recovery",
            Self::Notify => "@notify",
            Self::Popup => "@popup",
            Self::Suspend => "@suspend",
            Self::Resume => "@resume",
        };
        f.write_str(tag)
    }
}

/// `next` 해석 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum NextTarget {
    /// 같은 레시피의 스텝 인덱스
    Step(usize),
    /// 종료 액션
    Terminal(TerminalAction),
    /// 빈 `next` (체인 종료)
    End,
    /// 해석되지 않은 이름 (빈 `next`처럼 체인 종료)
    Unresolved(String),
}
