//! Error types for chunkview.
//!
//! Errors are defined with `thiserror` and compose via `?` and `From`
//! conversions.
//!
//! # Error Hierarchy
//!
//! - [`AppError`] - Top-level error for the command-line shell
//!   - [`ConfigError`](crate::config::ConfigError) - config file loading / validation
//!   - [`LoggingError`](crate::logging::LoggingError) - tracing subscriber setup
//!   - [`EngineError`] - engine construction failures
//!   - `std::io::Error` - reading the input document
//! - [`RenderError`] - produced by external chunk renderers
//!
//! # Recovery Strategy
//!
//! A [`RenderError`] is never fatal: the engine substitutes a fallback block
//! for the failing chunk, logs the failure and keeps assembling. Cancellation
//! is not an error at all and has no variant here. Only the shell-level
//! errors propagate to `main`.

use crate::config::ConfigError;
use crate::logging::LoggingError;
use thiserror::Error;

/// Top-level error for the `chunkview` binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or was invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging could not be initialized.
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    /// The rendering engine could not be started.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The input document could not be read.
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by an external chunk renderer for one chunk.
///
/// Recovered locally: the chunk is shown as a fallback block and the rest
/// of the assembly proceeds.
///
/// # Examples
///
/// ```
/// use chunkview::model::error::RenderError;
///
/// let err = RenderError::failed("unterminated code fence");
/// assert!(err.to_string().contains("unterminated code fence"));
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer rejected the chunk text.
    #[error("chunk render failed: {reason}")]
    Failed {
        /// Human-readable failure description.
        reason: String,
    },

    /// The renderer panicked while processing the chunk.
    #[error("chunk renderer panicked")]
    Panicked,
}

impl RenderError {
    /// Convenience constructor for [`RenderError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Errors raised while constructing or operating the engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A render worker thread could not be spawned.
    #[error("Failed to spawn render worker {index}: {source}")]
    WorkerSpawn {
        /// Index of the worker that failed to start.
        index: usize,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Engine configuration failed validation.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
