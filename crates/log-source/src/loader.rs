//! 소스 정의 로더 -- YAML 로그 소스 정의를 디스크에서 로드합니다.
//!
//! 디렉토리 내의 `.yml`/`.yaml` 파일을 스캔하고 파싱합니다.
//! 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.

use std::collections::HashSet;
use std::path::Path;

use crate::error::SourceError;
use crate::types::LogSourceConfig;

const MAX_SOURCE_FILE_SIZE: u64 = 1024 * 1024; // 1MiB
const MAX_SOURCES_COUNT: usize = 10_000;

/// 로그 소스 정의 로더
pub struct SourceLoader;

impl SourceLoader {
    /// 디렉토리에서 모든 YAML 소스 정의를 로드합니다.
    ///
    /// 중복 ID는 먼저 로드된 정의만 유지합니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 정의 수가 `MAX_SOURCES_COUNT`를 초과하는 경우
    pub async fn load_directory(
        dir: impl AsRef<Path>,
    ) -> Result<Vec<LogSourceConfig>, SourceError> {
        let dir = dir.as_ref();

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| SourceError::Load {
                path: dir.display().to_string(),
                reason: format!("failed to read directory: {e}"),
            })?;

        // 디렉토리 순서는 플랫폼마다 다르므로 경로 순으로 정렬
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| SourceError::Load {
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

        let mut sources = Vec::new();
        let mut seen_ids = HashSet::new();

        for path in paths {
            match Self::load_file(&path).await {
                Ok(source) => {
                    if !seen_ids.insert(source.id.clone()) {
                        tracing::warn!(
                            source_id = %source.id,
                            path = %path.display(),
                            "duplicate source id, skipping"
                        );
                        continue;
                    }
                    sources.push(source);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load source definition, skipping"
                    );
                }
            }

            if sources.len() > MAX_SOURCES_COUNT {
                return Err(SourceError::Load {
                    path: dir.display().to_string(),
                    reason: format!("too many source definitions: max {MAX_SOURCES_COUNT}"),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            count = sources.len(),
            "loaded log source definitions"
        );

        Ok(sources)
    }

    /// 단일 YAML 파일에서 소스 정의를 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<LogSourceConfig, SourceError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| SourceError::Load {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_SOURCE_FILE_SIZE {
            return Err(SourceError::Load {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_SOURCE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::Load {
                path: path.display().to_string(),
                reason: format!("failed to read file: {e}"),
            })?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하여 소스 정의를 생성합니다.
    pub fn parse_yaml(yaml_str: &str, origin: &str) -> Result<LogSourceConfig, SourceError> {
        let source: LogSourceConfig =
            serde_yaml::from_str(yaml_str).map_err(|e| SourceError::Load {
                path: origin.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        source.validate()?;

        Ok(source)
    }
}
