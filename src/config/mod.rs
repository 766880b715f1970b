//! Configuration module.
//!
//! [`EngineConfig`] is the validated set of tunables the rendering engine
//! runs with. [`loader`] builds one from defaults, a TOML file, environment
//! variables and command-line flags.

pub mod loader;

pub use loader::{
    apply_cli_overrides, apply_env_overrides, default_config_path, default_log_path,
    load_config_file, load_config_with_precedence, merge_config, ConfigError, ConfigFile,
    ResolvedConfig,
};

use crate::model::DEFAULT_CHUNK_SIZE;
use crate::render::{DEFAULT_CONCURRENCY, DEFAULT_PLACEHOLDER_MAX_LINES, DEFAULT_PREFETCH_RADIUS};
use crate::view_state::cache::DEFAULT_MAX_CACHED_CHUNKS;
use crate::view_state::height_index::DEFAULT_ESTIMATED_LINE_HEIGHT;
use crate::view_state::priority::{DEFAULT_FAR_THRESHOLD, DEFAULT_NEAR_THRESHOLD};
use crate::view_state::viewport::DEFAULT_RENDER_BUFFER;

/// Default line distance the visible range must move before `on_scroll`
/// cancels and reschedules.
pub const DEFAULT_RERENDER_THRESHOLD: usize = 20;

/// Engine tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Lines per chunk.
    pub chunk_size: usize,
    /// Cache capacity in chunks.
    pub max_cached_chunks: usize,
    /// Worker threads rendering chunks.
    pub concurrency: usize,
    /// Extra lines kept on each side of the viewport.
    pub render_buffer: usize,
    /// Height distance under which off-screen chunks are High priority.
    pub near_threshold: f64,
    /// Height distance under which off-screen chunks are Normal priority.
    pub far_threshold: f64,
    /// Lines the range must move before a scroll triggers a reschedule.
    pub rerender_threshold: usize,
    /// Chunks prefetched on each side of the centre chunk.
    pub prefetch_radius: usize,
    /// Height assumed for a line until it is measured.
    pub estimated_line_height: f64,
    /// Maximum lines shown for a pending chunk's placeholder.
    pub placeholder_max_lines: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_cached_chunks: DEFAULT_MAX_CACHED_CHUNKS,
            concurrency: DEFAULT_CONCURRENCY,
            render_buffer: DEFAULT_RENDER_BUFFER,
            near_threshold: DEFAULT_NEAR_THRESHOLD,
            far_threshold: DEFAULT_FAR_THRESHOLD,
            rerender_threshold: DEFAULT_RERENDER_THRESHOLD,
            prefetch_radius: DEFAULT_PREFETCH_RADIUS,
            estimated_line_height: DEFAULT_ESTIMATED_LINE_HEIGHT,
            placeholder_max_lines: DEFAULT_PLACEHOLDER_MAX_LINES,
        }
    }
}

impl EngineConfig {
    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };
        if self.chunk_size == 0 {
            return invalid("chunk_size", "must be at least 1");
        }
        if self.max_cached_chunks == 0 {
            return invalid("max_cached_chunks", "must be at least 1");
        }
        if self.concurrency == 0 {
            return invalid("concurrency", "must be at least 1");
        }
        if !self.estimated_line_height.is_finite() || self.estimated_line_height <= 0.0 {
            return invalid("estimated_line_height", "must be a positive number");
        }
        if !self.near_threshold.is_finite() || self.near_threshold < 0.0 {
            return invalid("near_threshold", "must be a non-negative number");
        }
        if !self.far_threshold.is_finite() || self.far_threshold < self.near_threshold {
            return invalid("far_threshold", "must be at least near_threshold");
        }
        Ok(())
    }
}
