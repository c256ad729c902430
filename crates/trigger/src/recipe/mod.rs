//! 트리거 레시피 -- 데이터 모델, 사후 조건, YAML 로더
//!
//! - [`types`]: 레시피, 스텝, 패턴 항목, `next` 해석
//! - [`condition`]: `params` 사후 조건 파서와 평가기
//! - [`loader`]: 디렉토리/파일 로딩과 구조 검증

pub mod condition;
pub mod loader;
pub mod types;

pub use condition::{CompareOp, Condition, PostConditions};
pub use loader::{LoadFailure, LoadOutcome, RecipeLoader};
pub use types::{
    Limitation, NextTarget, PatternItem, RecipeClass, SourceList, Step, StepType, TerminalAction,
    TriggerRecipe,
};
