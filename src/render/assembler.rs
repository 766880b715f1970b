//! Assembler - stitches cached chunks, placeholders and spacers into one stream
//!
//! The output always spans the whole document: lines outside the requested
//! range collapse into spacers whose height is the summed line-height
//! estimate of the lines they stand for. Total virtual height therefore
//! matches the full document no matter how little has been rendered, which
//! keeps scrollbar and viewport math stable.

use crate::model::{Chunk, ChunkIndex};
use crate::view_state::LineHeightTable;
use std::ops::Range;
use std::sync::Arc;

/// Default cap on the number of lines a placeholder displays.
pub const DEFAULT_PLACEHOLDER_MAX_LINES: usize = 3;

/// One piece of an [`Assembly`].
#[derive(Debug, PartialEq)]
pub enum Block<C> {
    /// Invisible filler for lines outside the requested range.
    Spacer {
        /// Lines the spacer stands in for.
        lines: Range<usize>,
        /// Summed height of those lines.
        height: f64,
    },
    /// Cached styled content for a chunk.
    Rendered {
        /// Chunk this content belongs to.
        chunk: ChunkIndex,
        /// Lines covered.
        lines: Range<usize>,
        /// Summed height of those lines.
        height: f64,
        /// Output of the external renderer.
        content: Arc<C>,
    },
    /// Stand-in for a chunk that has not been rendered yet.
    Placeholder {
        /// Chunk still loading.
        chunk: ChunkIndex,
        /// Lines covered.
        lines: Range<usize>,
        /// Summed height of those lines.
        height: f64,
        /// Number of "loading" lines to display, capped.
        placeholder_lines: usize,
    },
    /// Marker for a chunk whose renderer failed.
    Fallback {
        /// Chunk that failed.
        chunk: ChunkIndex,
        /// Lines covered.
        lines: Range<usize>,
        /// Summed height of those lines.
        height: f64,
        /// Failure description from the renderer.
        reason: String,
    },
}

// Manual impl: cloning shares the Arc, so `C` need not be Clone.
impl<C> Clone for Block<C> {
    fn clone(&self) -> Self {
        match self {
            Block::Spacer { lines, height } => Block::Spacer {
                lines: lines.clone(),
                height: *height,
            },
            Block::Rendered {
                chunk,
                lines,
                height,
                content,
            } => Block::Rendered {
                chunk: *chunk,
                lines: lines.clone(),
                height: *height,
                content: Arc::clone(content),
            },
            Block::Placeholder {
                chunk,
                lines,
                height,
                placeholder_lines,
            } => Block::Placeholder {
                chunk: *chunk,
                lines: lines.clone(),
                height: *height,
                placeholder_lines: *placeholder_lines,
            },
            Block::Fallback {
                chunk,
                lines,
                height,
                reason,
            } => Block::Fallback {
                chunk: *chunk,
                lines: lines.clone(),
                height: *height,
                reason: reason.clone(),
            },
        }
    }
}

impl<C> Block<C> {
    /// Virtual height this block occupies.
    pub fn height(&self) -> f64 {
        match self {
            Block::Spacer { height, .. }
            | Block::Rendered { height, .. }
            | Block::Placeholder { height, .. }
            | Block::Fallback { height, .. } => *height,
        }
    }

    /// Document lines this block stands for.
    pub fn lines(&self) -> Range<usize> {
        match self {
            Block::Spacer { lines, .. }
            | Block::Rendered { lines, .. }
            | Block::Placeholder { lines, .. }
            | Block::Fallback { lines, .. } => lines.clone(),
        }
    }

    /// Chunk index, for every block except spacers.
    pub fn chunk(&self) -> Option<ChunkIndex> {
        match self {
            Block::Spacer { .. } => None,
            Block::Rendered { chunk, .. }
            | Block::Placeholder { chunk, .. }
            | Block::Fallback { chunk, .. } => Some(*chunk),
        }
    }
}

/// What the assembler should emit for one chunk.
#[derive(Debug)]
pub enum Slot<C> {
    /// Content is available.
    Rendered(Arc<C>),
    /// The renderer failed with this reason.
    Failed(String),
    /// Not rendered yet.
    Pending,
}

impl<C> Clone for Slot<C> {
    fn clone(&self) -> Self {
        match self {
            Slot::Rendered(content) => Slot::Rendered(Arc::clone(content)),
            Slot::Failed(reason) => Slot::Failed(reason.clone()),
            Slot::Pending => Slot::Pending,
        }
    }
}

/// The composed output for a requested range.
#[derive(Debug, PartialEq)]
pub struct Assembly<C> {
    blocks: Vec<Block<C>>,
}

impl<C> Clone for Assembly<C> {
    fn clone(&self) -> Self {
        Self {
            blocks: self.blocks.clone(),
        }
    }
}

impl<C> Assembly<C> {
    /// Blocks in document order.
    pub fn blocks(&self) -> &[Block<C>] {
        &self.blocks
    }

    /// Consume the assembly, yielding its blocks.
    pub fn into_blocks(self) -> Vec<Block<C>> {
        self.blocks
    }

    /// Rendered + placeholder + fallback + spacer height.
    pub fn virtual_height(&self) -> f64 {
        self.blocks.iter().map(Block::height).sum()
    }

    /// Number of chunk blocks (everything except spacers).
    pub fn chunk_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.chunk().is_some()).count()
    }

    /// Number of chunks still showing a placeholder.
    pub fn pending_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::Placeholder { .. }))
            .count()
    }

    /// Number of chunks showing a fallback marker.
    pub fn failed_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::Fallback { .. }))
            .count()
    }

    /// True once no placeholder remains.
    pub fn is_complete(&self) -> bool {
        self.pending_count() == 0
    }

    /// Share of requested chunks that are settled (rendered or failed), `0.0..=1.0`.
    pub fn fraction_complete(&self) -> f64 {
        let chunks = self.chunk_count();
        if chunks == 0 {
            1.0
        } else {
            (chunks - self.pending_count()) as f64 / chunks as f64
        }
    }

    /// Rendered content in document order.
    pub fn rendered(&self) -> impl Iterator<Item = (ChunkIndex, &Arc<C>)> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Rendered { chunk, content, .. } => Some((*chunk, content)),
            _ => None,
        })
    }
}

/// Composes [`Assembly`] values from chunk slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assembler {
    placeholder_max_lines: usize,
}

impl Assembler {
    /// Create an assembler whose placeholders show at most
    /// `placeholder_max_lines` lines.
    pub fn new(placeholder_max_lines: usize) -> Self {
        Self {
            placeholder_max_lines,
        }
    }

    /// Cap on placeholder display lines.
    pub fn placeholder_max_lines(&self) -> usize {
        self.placeholder_max_lines
    }

    /// Assemble contiguous `chunks`, asking `resolve` what to show for each.
    ///
    /// Lines before the first chunk and after the last one become spacers.
    /// With no chunks at all, the whole document is one spacer.
    pub fn assemble_with<C>(
        &self,
        chunks: &[Chunk],
        heights: &LineHeightTable,
        mut resolve: impl FnMut(&Chunk) -> Slot<C>,
    ) -> Assembly<C> {
        let total_lines = heights.len();
        let (first_line, last_line) = match (chunks.first(), chunks.last()) {
            (Some(first), Some(last)) => (first.start, last.end),
            _ => (total_lines, total_lines),
        };

        let mut blocks = Vec::with_capacity(chunks.len() + 2);
        if first_line > 0 {
            blocks.push(Block::Spacer {
                lines: 0..first_line,
                height: heights.span_height(0, first_line),
            });
        }

        for chunk in chunks {
            let lines = chunk.lines();
            let height = heights.span_height(chunk.start, chunk.end);
            let block = match resolve(chunk) {
                Slot::Rendered(content) => Block::Rendered {
                    chunk: chunk.index,
                    lines,
                    height,
                    content,
                },
                Slot::Failed(reason) => Block::Fallback {
                    chunk: chunk.index,
                    lines,
                    height,
                    reason,
                },
                Slot::Pending => Block::Placeholder {
                    chunk: chunk.index,
                    lines,
                    height,
                    placeholder_lines: chunk.len().min(self.placeholder_max_lines),
                },
            };
            blocks.push(block);
        }

        if last_line < total_lines {
            blocks.push(Block::Spacer {
                lines: last_line..total_lines,
                height: heights.span_height(last_line, total_lines),
            });
        }

        tracing::trace!(
            target: "render.assembler",
            chunks = chunks.len(),
            blocks = blocks.len(),
            "assembled"
        );
        Assembly { blocks }
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_MAX_LINES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentChunker;

    fn setup(total_lines: usize) -> (DocumentChunker, LineHeightTable) {
        (
            DocumentChunker::new(100),
            LineHeightTable::new(total_lines, 10.0),
        )
    }

    #[test]
    fn middle_range_gets_spacers_on_both_sides() {
        let (chunker, heights) = setup(1_000);
        let chunks = chunker.chunks_overlapping(250..420, 1_000);
        let assembly: Assembly<String> =
            Assembler::default().assemble_with(&chunks, &heights, |_| Slot::Pending);

        let blocks = assembly.blocks();
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[0].lines(), 0..200);
        assert_eq!(blocks[0].height(), 2_000.0);
        assert!(matches!(blocks[0], Block::Spacer { .. }));
        assert_eq!(blocks[4].lines(), 500..1_000);
        assert!(matches!(blocks[4], Block::Spacer { .. }));
        assert_eq!(assembly.virtual_height(), 10_000.0);
    }

    #[test]
    fn placeholders_are_capped() {
        let (chunker, heights) = setup(1_000);
        let chunks = chunker.chunks_overlapping(0..10, 1_000);
        let assembly: Assembly<String> =
            Assembler::new(3).assemble_with(&chunks, &heights, |_| Slot::Pending);
        match &assembly.blocks()[0] {
            Block::Placeholder {
                placeholder_lines,
                height,
                ..
            } => {
                assert_eq!(*placeholder_lines, 3);
                assert_eq!(*height, 1_000.0);
            }
            other => panic!("expected placeholder, got {other:?}"),
        }
    }

    #[test]
    fn short_final_chunk_gets_proportional_placeholder() {
        let (chunker, heights) = setup(202);
        let chunks = chunker.chunks_overlapping(200..202, 202);
        let assembly: Assembly<String> =
            Assembler::new(3).assemble_with(&chunks, &heights, |_| Slot::Pending);
        assert!(matches!(
            assembly.blocks().last(),
            Some(Block::Placeholder {
                placeholder_lines: 2,
                ..
            })
        ));
    }

    #[test]
    fn slots_map_to_matching_blocks() {
        let (chunker, heights) = setup(300);
        let chunks = chunker.chunks(300);
        let assembly = Assembler::default().assemble_with(&chunks, &heights, |chunk| {
            match chunk.index.get() {
                0 => Slot::Rendered(Arc::new("zero".to_string())),
                1 => Slot::Failed("boom".to_string()),
                _ => Slot::Pending,
            }
        });

        assert!(matches!(assembly.blocks()[0], Block::Rendered { .. }));
        assert!(matches!(&assembly.blocks()[1], Block::Fallback { reason, .. } if reason == "boom"));
        assert!(matches!(assembly.blocks()[2], Block::Placeholder { .. }));
        assert_eq!(assembly.chunk_count(), 3);
        assert_eq!(assembly.pending_count(), 1);
        assert_eq!(assembly.failed_count(), 1);
        assert!(!assembly.is_complete());
        assert!((assembly.fraction_complete() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn no_chunks_is_one_spacer_and_complete() {
        let (_, heights) = setup(50);
        let assembly: Assembly<String> =
            Assembler::default().assemble_with(&[], &heights, |_| Slot::Pending);
        assert_eq!(assembly.blocks().len(), 1);
        assert_eq!(assembly.virtual_height(), 500.0);
        assert!(assembly.is_complete());
        assert_eq!(assembly.fraction_complete(), 1.0);
    }

    #[test]
    fn clone_shares_rendered_content() {
        let (chunker, heights) = setup(100);
        let chunks = chunker.chunks(100);
        let assembly = Assembler::default()
            .assemble_with(&chunks, &heights, |_| Slot::Rendered(Arc::new(vec![1u8, 2, 3])));
        let copy = assembly.clone();
        let (_, original) = assembly.rendered().next().expect("rendered block");
        let (_, cloned) = copy.rendered().next().expect("rendered block");
        assert!(Arc::ptr_eq(original, cloned));
    }
}
