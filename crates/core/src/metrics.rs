//! 메트릭 상수
//!
//! 모든 메트릭의 이름을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//! 익스포터는 설치하지 않으므로 호스트가 레코더를 설치하지 않는 한 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logtrig_`
//! - 모듈명: `trigger_`, `multi_`, `source_`, `pattern_`
//! - 접미어: `_total` (counter)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logtrig_core::metrics::TRIGGER_FIRINGS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 레시피 ID 레이블 키
pub const LABEL_RECIPE: &str = "recipe";

/// 변환 종류 레이블 키 (multiline, extract, watermark, group, path)
pub const LABEL_TRANSFORM: &str = "transform";

// ─── Pattern 메트릭 ────────────────────────────────────────────────

/// Pattern: 컴파일 실패 수 (counter)
pub const PATTERN_COMPILE_ERRORS_TOTAL: &str = "logtrig_pattern_compile_errors_total";

// ─── Trigger 메트릭 ────────────────────────────────────────────────

/// Trigger: 체인 패스 실행 수 (counter)
pub const TRIGGER_CHAIN_PASSES_TOTAL: &str = "logtrig_trigger_chain_passes_total";

/// Trigger: 발사 수 (counter, label: recipe)
pub const TRIGGER_FIRINGS_TOTAL: &str = "logtrig_trigger_firings_total";

/// Trigger: 속도 제한으로 억제된 발사 수 (counter, label: recipe)
pub const TRIGGER_SUPPRESSED_TOTAL: &str = "logtrig_trigger_suppressed_total";

/// Trigger: delay 스텝 취소 수 (counter)
pub const TRIGGER_CANCELLATIONS_TOTAL: &str = "logtrig_trigger_cancellations_total";

/// Trigger: 안전 상한(발사 100회, 리셋 상한) 도달 수 (counter)
pub const TRIGGER_CAP_REACHED_TOTAL: &str = "logtrig_trigger_cap_reached_total";

// ─── Multi 메트릭 ──────────────────────────────────────────────────

/// Multi: 생성된 인스턴스 수 (counter)
pub const MULTI_INSTANCES_SPAWNED_TOTAL: &str = "logtrig_multi_instances_spawned_total";

/// Multi: 동시성 상한으로 거부된 인스턴스 생성 수 (counter)
pub const MULTI_INSTANCES_REFUSED_TOTAL: &str = "logtrig_multi_instances_refused_total";

// ─── Log Source 메트릭 ─────────────────────────────────────────────

/// Source: 처리된 라인 수 (counter, label: transform)
pub const SOURCE_LINES_PROCESSED_TOTAL: &str = "logtrig_source_lines_processed_total";

/// Source: 조립된 멀티라인 블록 수 (counter)
pub const SOURCE_BLOCKS_TOTAL: &str = "logtrig_source_blocks_total";

/// Source: 워터마크보다 이른 타임스탬프로 건너뛴 라인 수 (counter)
pub const SOURCE_WATERMARK_SKIPPED_TOTAL: &str = "logtrig_source_watermark_skipped_total";
