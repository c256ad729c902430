#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`recipe`]: 레시피 모델, 사후 조건, YAML 로더
//! - [`step`]: 스텝 상태 머신
//! - [`chain`]: 체인 실행기
//! - [`limiter`]: 재발사 드라이버와 속도 제한기
//! - [`multi`]: MULTI 상관기
//! - [`engine`]: 평가 파사드
//! - [`error`]: 도메인 에러 타입

pub mod chain;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod multi;
pub mod recipe;
pub mod step;

pub use chain::{ChainPass, DELAY_RESET_CEILING, PreparedRecipe, run_chain};
pub use engine::{EvalOptions, ReportSummary, TriggerEngine, TriggerReport};
pub use error::TriggerError;
pub use limiter::{DriveOutcome, Firing, MAX_FIRINGS, RateLimiter};
pub use multi::{InstanceStatus, MAX_ACTIVE_INSTANCES, MultiInstance};
pub use recipe::{RecipeLoader, TriggerRecipe};
pub use step::{LineBuffer, MatchRecord, ScanControl, StepOutcome, StepTrace};
