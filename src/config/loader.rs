//! Configuration file loading with precedence handling.

use super::EngineConfig;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CHUNKVIEW_CONFIG";
/// Environment variable overriding the worker count.
pub const CONCURRENCY_ENV: &str = "CHUNKVIEW_CONCURRENCY";
/// Environment variable overriding the chunk size.
pub const CHUNK_SIZE_ENV: &str = "CHUNKVIEW_CHUNK_SIZE";

/// Errors that can occur during config loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file path contains invalid UTF-8 or cannot be resolved.
    #[error("Invalid config path: {0}")]
    InvalidPath(String),

    /// Failed to read config file (file may not exist or have permission issues).
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError {
        /// Path that failed to read.
        path: PathBuf,
        /// Reason for failure.
        reason: String,
    },

    /// Config file contains invalid TOML syntax.
    #[error("Invalid TOML in {path}: {reason}")]
    ParseError {
        /// Path with invalid TOML.
        path: PathBuf,
        /// Parse error details.
        reason: String,
    },

    /// An environment override could not be parsed.
    #[error("Invalid value {value:?} for {name}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value found in the environment.
        value: String,
    },

    /// A resolved value is out of range for the engine.
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// TOML configuration file structure.
///
/// All fields are optional - if not specified, hardcoded defaults are used.
/// Corresponds to `~/.config/chunkview/config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Lines per chunk.
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Cache capacity in chunks.
    #[serde(default)]
    pub max_cached_chunks: Option<usize>,

    /// Render worker threads.
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Lines of buffer around the viewport.
    #[serde(default)]
    pub render_buffer: Option<usize>,

    /// High-priority distance threshold.
    #[serde(default)]
    pub near_threshold: Option<f64>,

    /// Normal-priority distance threshold.
    #[serde(default)]
    pub far_threshold: Option<f64>,

    /// Lines of scroll movement before rescheduling.
    #[serde(default)]
    pub rerender_threshold: Option<usize>,

    /// Chunks prefetched on each side of the viewport.
    #[serde(default)]
    pub prefetch_radius: Option<usize>,

    /// Height assumed for unmeasured lines.
    #[serde(default)]
    pub estimated_line_height: Option<f64>,

    /// Placeholder lines shown for a pending chunk.
    #[serde(default)]
    pub placeholder_max_lines: Option<usize>,

    /// Path to log file for tracing output.
    #[serde(default)]
    pub log_file_path: Option<PathBuf>,
}

/// Resolved configuration after applying precedence rules.
///
/// Created by merging defaults, config file, env vars, and CLI args.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Engine tunables, not yet validated.
    pub engine: EngineConfig,
    /// Path to log file for tracing output.
    pub log_file_path: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            log_file_path: default_log_path(),
        }
    }
}

impl ResolvedConfig {
    /// The engine configuration, validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if any tunable is out of range.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        self.engine.validate()?;
        Ok(self.engine.clone())
    }
}

/// Resolve default log file path.
///
/// Returns `~/.local/state/chunkview/chunkview.log` on Unix-like systems,
/// or appropriate platform path on other systems.
///
/// If state directory cannot be determined, falls back to current directory.
pub fn default_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        state_dir.join("chunkview").join("chunkview.log")
    } else {
        PathBuf::from("chunkview.log")
    }
}

/// Load configuration file from a specific path.
///
/// Returns `Ok(None)` if file doesn't exist (not an error - use defaults).
///
/// # Errors
///
/// Returns error if file exists but has read or parse errors.
pub fn load_config_file(path: impl Into<PathBuf>) -> Result<Option<ConfigFile>, ConfigError> {
    let path = path.into();

    // Missing file is not an error - use defaults
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let config: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    Ok(Some(config))
}

/// Resolve default config file path.
///
/// Returns `~/.config/chunkview/config.toml` on Unix, appropriate path on other platforms.
/// Returns `None` if home directory cannot be determined.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chunkview").join("config.toml"))
}

/// Load configuration with precedence handling.
///
/// Precedence (highest to lowest):
/// 1. Explicit `config_path` argument (like CLI `--config`)
/// 2. `CHUNKVIEW_CONFIG` environment variable, when non-empty
/// 3. Default path `~/.config/chunkview/config.toml`
///
/// Missing config files are NOT errors - defaults are used.
///
/// # Errors
///
/// Returns error only if a config file exists but cannot be read or parsed.
pub fn load_config_with_precedence(
    config_path: Option<PathBuf>,
) -> Result<Option<ConfigFile>, ConfigError> {
    if let Some(path) = config_path {
        return load_config_file(path);
    }

    match std::env::var(CONFIG_ENV) {
        Ok(env_path) if !env_path.is_empty() => return load_config_file(PathBuf::from(env_path)),
        Err(std::env::VarError::NotUnicode(raw)) => {
            return Err(ConfigError::InvalidPath(raw.to_string_lossy().into_owned()))
        }
        // Unset or empty: fall through to the default location.
        Ok(_) | Err(std::env::VarError::NotPresent) => {}
    }

    if let Some(default_path) = default_config_path() {
        return load_config_file(default_path);
    }

    Ok(None)
}

/// Apply environment variable overrides to resolved config.
///
/// Checks for:
/// - `CHUNKVIEW_CONCURRENCY`: worker thread count
/// - `CHUNKVIEW_CHUNK_SIZE`: lines per chunk
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] if a variable is set but is not a
/// non-negative integer.
pub fn apply_env_overrides(mut config: ResolvedConfig) -> Result<ResolvedConfig, ConfigError> {
    if let Some(concurrency) = env_usize(CONCURRENCY_ENV)? {
        config.engine.concurrency = concurrency;
    }
    if let Some(chunk_size) = env_usize(CHUNK_SIZE_ENV)? {
        config.engine.chunk_size = chunk_size;
    }
    Ok(config)
}

fn env_usize(name: &'static str) -> Result<Option<usize>, ConfigError> {
    let Ok(value) = std::env::var(name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

/// Merge config file into defaults to create resolved config.
///
/// For each field in `ConfigFile`, if `Some(value)`, use it; otherwise use default.
pub fn merge_config(config_file: Option<ConfigFile>) -> ResolvedConfig {
    let defaults = ResolvedConfig::default();

    let Some(config) = config_file else {
        return defaults;
    };
    let engine = defaults.engine;

    ResolvedConfig {
        engine: EngineConfig {
            chunk_size: config.chunk_size.unwrap_or(engine.chunk_size),
            max_cached_chunks: config.max_cached_chunks.unwrap_or(engine.max_cached_chunks),
            concurrency: config.concurrency.unwrap_or(engine.concurrency),
            render_buffer: config.render_buffer.unwrap_or(engine.render_buffer),
            near_threshold: config.near_threshold.unwrap_or(engine.near_threshold),
            far_threshold: config.far_threshold.unwrap_or(engine.far_threshold),
            rerender_threshold: config
                .rerender_threshold
                .unwrap_or(engine.rerender_threshold),
            prefetch_radius: config.prefetch_radius.unwrap_or(engine.prefetch_radius),
            estimated_line_height: config
                .estimated_line_height
                .unwrap_or(engine.estimated_line_height),
            placeholder_max_lines: config
                .placeholder_max_lines
                .unwrap_or(engine.placeholder_max_lines),
        },
        log_file_path: config.log_file_path.unwrap_or(defaults.log_file_path),
    }
}

/// Apply CLI argument overrides to resolved config.
///
/// CLI args have the highest precedence and override all other sources.
/// Only applies overrides for flags that were explicitly set by the user.
///
/// Precedence chain: Defaults → Config File → Env Vars → CLI Args (highest)
pub fn apply_cli_overrides(
    mut config: ResolvedConfig,
    chunk_size_override: Option<usize>,
    concurrency_override: Option<usize>,
) -> ResolvedConfig {
    if let Some(chunk_size) = chunk_size_override {
        config.engine.chunk_size = chunk_size;
    }
    if let Some(concurrency) = concurrency_override {
        config.engine.concurrency = concurrency;
    }
    config
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
