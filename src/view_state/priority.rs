//! Render priority tiers and the distance-based classifier.

use super::height_index::LineHeightTable;
use super::visible_range::VisibleRange;
use crate::model::Chunk;

/// Default distance below which an off-screen chunk is [`RenderPriority::High`].
pub const DEFAULT_NEAR_THRESHOLD: f64 = 5_000.0;
/// Default distance below which an off-screen chunk is [`RenderPriority::Normal`].
pub const DEFAULT_FAR_THRESHOLD: f64 = 20_000.0;

/// Urgency tier for a chunk render.
///
/// Declaration order is the scheduling order: `Immediate < High < Normal < Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderPriority {
    /// Overlaps the visible range.
    Immediate,
    /// Close to the visible range.
    High,
    /// Moderately far from the visible range.
    Normal,
    /// Far away, or background prefetch.
    Low,
}

impl RenderPriority {
    /// Stable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderPriority::Immediate => "immediate",
            RenderPriority::High => "high",
            RenderPriority::Normal => "normal",
            RenderPriority::Low => "low",
        }
    }
}

/// Assigns a [`RenderPriority`] from a chunk's distance to the visible range.
///
/// Distance is measured between the top offset of the chunk and the top
/// offset of the visible range, in the same units as the
/// [`LineHeightTable`]. Thresholds are configurable because the right values
/// depend on line height and content density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityClassifier {
    near_threshold: f64,
    far_threshold: f64,
}

impl PriorityClassifier {
    /// Create a classifier. `far_threshold` is raised to `near_threshold`
    /// if given smaller.
    pub fn new(near_threshold: f64, far_threshold: f64) -> Self {
        Self {
            near_threshold,
            far_threshold: far_threshold.max(near_threshold),
        }
    }

    /// Distance below which off-screen chunks are `High`.
    pub fn near_threshold(&self) -> f64 {
        self.near_threshold
    }

    /// Distance below which off-screen chunks are `Normal`.
    pub fn far_threshold(&self) -> f64 {
        self.far_threshold
    }

    /// Classify one chunk against the current visible range.
    pub fn classify(
        &self,
        chunk: &Chunk,
        visible: &VisibleRange,
        heights: &LineHeightTable,
    ) -> RenderPriority {
        if chunk.overlaps(&visible.lines()) {
            return RenderPriority::Immediate;
        }
        let distance = (heights.offset_of(chunk.start) - heights.offset_of(visible.start_line)).abs();
        if distance < self.near_threshold {
            RenderPriority::High
        } else if distance < self.far_threshold {
            RenderPriority::Normal
        } else {
            RenderPriority::Low
        }
    }

    /// Classify a batch and sort it most-urgent first.
    ///
    /// Ties keep document order so that, within a tier, chunks nearer the top
    /// are dispatched first.
    pub fn prioritize(
        &self,
        chunks: impl IntoIterator<Item = Chunk>,
        visible: &VisibleRange,
        heights: &LineHeightTable,
    ) -> Vec<(Chunk, RenderPriority)> {
        let mut batch: Vec<(Chunk, RenderPriority)> = chunks
            .into_iter()
            .map(|chunk| {
                let priority = self.classify(&chunk, visible, heights);
                (chunk, priority)
            })
            .collect();
        batch.sort_by_key(|(chunk, priority)| (*priority, chunk.index));
        batch
    }
}

impl Default for PriorityClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_NEAR_THRESHOLD, DEFAULT_FAR_THRESHOLD)
    }
}
