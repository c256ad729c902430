//! 레시피 로더 -- YAML 트리거 레시피를 디스크에서 로드합니다.
//!
//! 레시피 디렉토리 내의 `.yml`/`.yaml` 파일을 스캔하고 파싱합니다.
//! 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::TriggerError;

use super::types::TriggerRecipe;

const MAX_RECIPE_FILE_SIZE: u64 = 1024 * 1024; // 1MiB
const MAX_RECIPES_COUNT: usize = 10_000;

/// 디렉토리 로딩 결과
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// 로드에 성공한 레시피 (경로 순)
    pub recipes: Vec<(PathBuf, TriggerRecipe)>,
    /// 로드에 실패하거나 건너뛴 파일
    pub failures: Vec<LoadFailure>,
}

/// 건너뛴 레시피 파일
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub path: String,
    pub reason: String,
}

/// 레시피 로더
pub struct RecipeLoader;

impl RecipeLoader {
    /// 디렉토리에서 모든 YAML 레시피를 로드합니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 레시피 수가 `MAX_RECIPES_COUNT`를 초과하는 경우
    pub async fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<TriggerRecipe>, TriggerError> {
        let outcome = Self::load_directory_report(dir).await?;
        Ok(outcome.recipes.into_iter().map(|(_, r)| r).collect())
    }

    /// 디렉토리를 로드하고 건너뛴 파일과 사유를 함께 반환합니다.
    pub async fn load_directory_report(dir: impl AsRef<Path>) -> Result<LoadOutcome, TriggerError> {
        let dir = dir.as_ref();

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| TriggerError::Load {
                path: dir.display().to_string(),
                reason: format!("failed to read directory: {e}"),
            })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| TriggerError::Load {
            path: dir.display().to_string(),
            reason: format!("failed to read directory entry: {e}"),
        })? {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut outcome = LoadOutcome::default();
        let mut seen_ids = HashSet::new();

        for path in paths {
            match Self::load_file(&path).await {
                Ok(recipe) => {
                    if !seen_ids.insert(recipe.id.clone()) {
                        tracing::warn!(
                            recipe_id = %recipe.id,
                            path = %path.display(),
                            "duplicate recipe id, skipping"
                        );
                        outcome.failures.push(LoadFailure {
                            path: path.display().to_string(),
                            reason: format!("duplicate recipe id '{}'", recipe.id),
                        });
                        continue;
                    }
                    outcome.recipes.push((path, recipe));
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load recipe file, skipping"
                    );
                    outcome.failures.push(LoadFailure {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }

            if outcome.recipes.len() > MAX_RECIPES_COUNT {
                return Err(TriggerError::Load {
                    path: dir.display().to_string(),
                    reason: format!("too many recipes: max {MAX_RECIPES_COUNT}"),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            count = outcome.recipes.len(),
            skipped = outcome.failures.len(),
            "loaded trigger recipes"
        );

        Ok(outcome)
    }

    /// 단일 YAML 파일에서 레시피를 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<TriggerRecipe, TriggerError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| TriggerError::Load {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RECIPE_FILE_SIZE {
            return Err(TriggerError::Load {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RECIPE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriggerError::Load {
                path: path.display().to_string(),
                reason: format!("failed to read file: {e}"),
            })?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하여 레시피를 생성합니다.
    pub fn parse_yaml(yaml_str: &str, origin: &str) -> Result<TriggerRecipe, TriggerError> {
        let recipe: TriggerRecipe =
            serde_yaml::from_str(yaml_str).map_err(|e| TriggerError::Load {
                path: origin.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        Self::validate(&recipe)?;

        Ok(recipe)
    }

    /// 레시피의 구조적 유효성을 검증합니다.
    ///
    /// 패턴, 기간, `next`, `params`의 문제는 여기서 거부하지 않습니다.
    /// 그런 문제는 [`TriggerRecipe::lint`]가 경고로 보고하고 평가 시 진단으로 드러납니다.
    pub fn validate(recipe: &TriggerRecipe) -> Result<(), TriggerError> {
        if recipe.id.trim().is_empty() {
            return Err(TriggerError::Validation {
                recipe_id: "(empty)".to_owned(),
                reason: "recipe id must not be empty".to_owned(),
            });
        }

        if recipe.id.len() > 256 {
            return Err(TriggerError::Validation {
                recipe_id: recipe.id.clone(),
                reason: "recipe id must not exceed 256 characters".to_owned(),
            });
        }

        if recipe.steps.is_empty() {
            return Err(TriggerError::Validation {
                recipe_id: recipe.id.clone(),
                reason: "recipe must have at least one step".to_owned(),
            });
        }

        if let Some(idx) = recipe.steps.iter().position(|s| s.name.trim().is_empty()) {
            return Err(TriggerError::Validation {
                recipe_id: recipe.id.clone(),
                reason: format!("step #{} must have a name", idx + 1),
            });
        }

        if let Some(name) = recipe.duplicate_step_names().first() {
            return Err(TriggerError::Validation {
                recipe_id: recipe.id.clone(),
                reason: format!("duplicate step name '{name}'"),
            });
        }

        if let Some(step) = recipe.steps.iter().find(|s| s.times == 0) {
            return Err(TriggerError::Validation {
                recipe_id: recipe.id.clone(),
                reason: format!("step '{}': times must be greater than 0", step.name),
            });
        }

        if let Some(ref limitation) = recipe.limitation
            && limitation.times == 0
        {
            return Err(TriggerError::Validation {
                recipe_id: recipe.id.clone(),
                reason: "limitation times must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}
