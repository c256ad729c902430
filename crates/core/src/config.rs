//! 설정 관리 -- logtrig.toml 파싱 및 런타임 설정
//!
//! [`LogtrigConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGTRIG_TRIGGER_RECIPE_DIR=/opt/triggers` 형식)
//! 3. 설정 파일 (`logtrig.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! 발사 상한(100회), MULTI 인스턴스 상한(20개), delay 리셋 상한은
//! 엔진 상수이며 설정으로 노출하지 않습니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logtrig_core::error::LogtrigError> {
//! use logtrig_core::config::LogtrigConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogtrigConfig::load("logtrig.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogtrigConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogtrigError};
use crate::timestamp::TimestampFormat;

/// logtrig 통합 설정
///
/// `logtrig.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogtrigConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 트리거 엔진 설정
    #[serde(default)]
    pub trigger: TriggerConfig,
    /// 로그 소스 설정
    #[serde(default)]
    pub source: SourceConfig,
}

impl LogtrigConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogtrigError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogtrigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogtrigError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogtrigError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogtrigError> {
        toml::from_str(toml_str).map_err(|e| {
            LogtrigError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGTRIG_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGTRIG_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGTRIG_GENERAL_LOG_FORMAT");

        // Trigger
        override_string(&mut self.trigger.recipe_dir, "LOGTRIG_TRIGGER_RECIPE_DIR");
        override_string(
            &mut self.trigger.default_timestamp_format,
            "LOGTRIG_TRIGGER_DEFAULT_TIMESTAMP_FORMAT",
        );
        override_bool(
            &mut self.trigger.include_rejected,
            "LOGTRIG_TRIGGER_INCLUDE_REJECTED",
        );

        // Source
        override_string(&mut self.source.source_dir, "LOGTRIG_SOURCE_SOURCE_DIR");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogtrigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 기본 타임스탬프 형식은 비어 있어도 되지만, 있으면 토큰이 하나 이상이어야 함
        let fmt = &self.trigger.default_timestamp_format;
        if !fmt.is_empty() && TimestampFormat::new(fmt).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "trigger.default_timestamp_format".to_owned(),
                reason: "must contain at least one of yyyy, MM, dd, HH, mm, ss, SSS".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 트리거 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// 트리거 레시피 디렉토리
    pub recipe_dir: String,
    /// 로그 소스 정의가 없을 때 사용할 타임스탬프 형식
    pub default_timestamp_format: String,
    /// 리포트에 사후 조건 실패 매칭(rejected)을 포함할지 여부
    pub include_rejected: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            recipe_dir: "/etc/logtrig/triggers".to_owned(),
            default_timestamp_format: "yyyy-MM-dd HH:mm:ss".to_owned(),
            include_rejected: true,
        }
    }
}

/// 로그 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// 로그 소스 정의 디렉토리
    pub source_dir: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source_dir: "/etc/logtrig/sources".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}
