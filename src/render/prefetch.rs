//! Speculative rendering of the chunks around the viewport.

use super::state::EngineState;
use crate::model::{Chunk, ChunkIndex, DocumentChunker};
use crate::view_state::RenderPriority;
use std::ops::RangeInclusive;

/// Default number of chunks prefetched on each side of the centre chunk.
pub const DEFAULT_PREFETCH_RADIUS: usize = 2;

/// Picks the chunks within `radius` of the viewport centre that still need
/// rendering. Everything it returns is scheduled at [`RenderPriority::Low`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefetcher {
    radius: usize,
}

impl Prefetcher {
    /// Prefetch `radius` chunks on each side of the centre chunk.
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }

    /// Chunks prefetched on each side.
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Chunk indices `center - radius ..= center + radius`, clamped to
    /// `0..chunk_count`. Empty when the document has no chunks.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunkview::model::ChunkIndex;
    /// # use chunkview::render::Prefetcher;
    /// let prefetcher = Prefetcher::new(2);
    /// assert_eq!(prefetcher.window(ChunkIndex::new(1), 10), 0..=3);
    /// assert_eq!(prefetcher.window(ChunkIndex::new(9), 10), 7..=9);
    /// ```
    pub fn window(&self, center: ChunkIndex, chunk_count: usize) -> RangeInclusive<usize> {
        if chunk_count == 0 {
            return RangeInclusive::new(1, 0);
        }
        let center = center.get().min(chunk_count - 1);
        let first = center.saturating_sub(self.radius);
        let last = center.saturating_add(self.radius).min(chunk_count - 1);
        first..=last
    }

    /// Requests for the window around the last visible range that are not
    /// cached, failed or already in flight for `generation`.
    pub(crate) fn requests<C>(
        &self,
        state: &EngineState<C>,
        chunker: &DocumentChunker,
        generation: u64,
    ) -> Vec<(Chunk, RenderPriority)> {
        let total_lines = state.document.total_lines();
        let center = state.viewport_center(chunker);
        self.window(center, chunker.chunk_count(total_lines))
            .filter_map(|index| chunker.chunk(ChunkIndex::new(index), total_lines))
            .filter(|chunk| {
                !state.is_settled(chunk.index) && !state.is_in_flight(chunk.index, generation)
            })
            .map(|chunk| (chunk, RenderPriority::Low))
            .collect()
    }
}

impl Default for Prefetcher {
    fn default() -> Self {
        Self::new(DEFAULT_PREFETCH_RADIUS)
    }
}
