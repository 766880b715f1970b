//! Seams to the external styling and layout collaborators.

use crate::model::error::RenderError;

/// Turns one chunk of raw text into styled content.
///
/// Implementations must be pure with respect to the engine: the same text
/// always yields equivalent content. They run on worker threads, possibly
/// several at once.
pub trait ChunkRenderer<C>: Send + Sync {
    /// Render a chunk's text.
    fn render(&self, chunk_text: &str) -> Result<C, RenderError>;
}

impl<C, F> ChunkRenderer<C> for F
where
    F: Fn(&str) -> Result<C, RenderError> + Send + Sync,
{
    fn render(&self, chunk_text: &str) -> Result<C, RenderError> {
        self(chunk_text)
    }
}

/// Reports the real per-line heights of rendered content.
///
/// When configured on the engine, the measurement of every freshly rendered
/// chunk is written back into the line-height table.
pub trait LineMeasurer<C>: Send + Sync {
    /// Heights of each line of `content`, top to bottom.
    fn measure(&self, content: &C) -> Vec<f64>;
}

impl<C, F> LineMeasurer<C> for F
where
    F: Fn(&C) -> Vec<f64> + Send + Sync,
{
    fn measure(&self, content: &C) -> Vec<f64> {
        self(content)
    }
}
