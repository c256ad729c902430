#![doc = include_str!("../README.md")]

pub mod config;
pub mod duration;
pub mod error;
pub mod metrics;
pub mod pattern;
pub mod timestamp;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogtrigError, PatternError};

// 설정
pub use config::LogtrigConfig;

// 프리미티브
pub use duration::DurationSpec;
pub use pattern::{Captures, CompiledPattern};
pub use timestamp::TimestampFormat;
