//! Fixed-size line chunks and the chunker that produces them.

use super::types::ChunkIndex;
use std::ops::Range;

/// Default number of lines per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// A half-open line range `[start, end)`, the unit of rendering and caching.
///
/// Chunks carry no content: text is re-sliced from the
/// [`Document`](super::Document) whenever a chunk is rendered.
///
/// # Invariants
/// - `start <= end`
/// - `index == start / chunk_size` for the chunker that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// Position of this chunk in the document.
    pub index: ChunkIndex,
    /// First line (inclusive).
    pub start: usize,
    /// Last line (exclusive).
    pub end: usize,
}

impl Chunk {
    /// Number of lines in the chunk.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the chunk covers no lines.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Line range covered by this chunk.
    pub fn lines(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Whether this chunk shares at least one line with `lines`.
    pub fn overlaps(&self, lines: &Range<usize>) -> bool {
        self.start < lines.end && lines.start < self.end
    }
}

/// Splits a document's line space into fixed-size chunks on demand.
///
/// Stateless beyond its chunk size: every method takes the document's
/// line count so the same chunker serves successive documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentChunker {
    chunk_size: usize,
}

impl DocumentChunker {
    /// Create a chunker. A zero chunk size is raised to 1.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Nominal lines per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks needed to cover `total_lines`.
    pub fn chunk_count(&self, total_lines: usize) -> usize {
        total_lines.div_ceil(self.chunk_size)
    }

    /// Chunk containing `line` (not bounds-checked).
    pub fn chunk_index_for_line(&self, line: usize) -> ChunkIndex {
        ChunkIndex::new(line / self.chunk_size)
    }

    /// The chunk at `index`, or `None` past the end of the document.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunkview::model::{ChunkIndex, DocumentChunker};
    /// let chunker = DocumentChunker::new(100);
    /// let last = chunker.chunk(ChunkIndex::new(2), 250).unwrap();
    /// assert_eq!((last.start, last.end), (200, 250));
    /// assert!(chunker.chunk(ChunkIndex::new(3), 250).is_none());
    /// ```
    pub fn chunk(&self, index: ChunkIndex, total_lines: usize) -> Option<Chunk> {
        let start = index.get().checked_mul(self.chunk_size)?;
        if start >= total_lines {
            return None;
        }
        let end = (start + self.chunk_size).min(total_lines);
        Some(Chunk { index, start, end })
    }

    /// Every chunk of the document, in order.
    pub fn chunks(&self, total_lines: usize) -> Vec<Chunk> {
        (0..self.chunk_count(total_lines))
            .filter_map(|i| self.chunk(ChunkIndex::new(i), total_lines))
            .collect()
    }

    /// Chunks sharing at least one line with `lines`, clamped to the document.
    pub fn chunks_overlapping(&self, lines: Range<usize>, total_lines: usize) -> Vec<Chunk> {
        let start = lines.start.min(total_lines);
        let end = lines.end.min(total_lines);
        if start >= end {
            return Vec::new();
        }
        let first = start / self.chunk_size;
        let last = (end - 1) / self.chunk_size;
        (first..=last)
            .filter_map(|i| self.chunk(ChunkIndex::new(i), total_lines))
            .collect()
    }
}

impl Default for DocumentChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_thousand_lines_make_one_hundred_chunks() {
        let chunker = DocumentChunker::new(100);
        assert_eq!(chunker.chunk_count(10_000), 100);
        assert_eq!(chunker.chunks(10_000).len(), 100);
    }

    #[test]
    fn final_chunk_may_be_shorter() {
        let chunker = DocumentChunker::new(100);
        let chunks = chunker.chunks(250);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 50);
        assert_eq!(chunks[2].index, ChunkIndex::new(2));
    }

    #[test]
    fn zero_chunk_size_is_raised_to_one() {
        let chunker = DocumentChunker::new(0);
        assert_eq!(chunker.chunk_size(), 1);
        assert_eq!(chunker.chunk_count(5), 5);
    }

    #[test]
    fn chunk_index_is_start_over_size() {
        let chunker = DocumentChunker::new(100);
        for chunk in chunker.chunks(1_234) {
            assert_eq!(chunk.index.get(), chunk.start / 100);
        }
        assert_eq!(chunker.chunk_index_for_line(199), ChunkIndex::new(1));
    }

    #[test]
    fn chunks_overlapping_covers_partial_chunks() {
        let chunker = DocumentChunker::new(100);
        let chunks = chunker.chunks_overlapping(150..320, 1_000);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index.get()).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn chunks_overlapping_clamps_to_document() {
        let chunker = DocumentChunker::new(100);
        let chunks = chunker.chunks_overlapping(180..10_000, 250);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index.get()).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(chunker.chunks_overlapping(300..400, 250).is_empty());
        assert!(chunker.chunks_overlapping(10..10, 250).is_empty());
    }

    #[test]
    fn chunk_overlap_is_half_open() {
        let chunk = Chunk {
            index: ChunkIndex::new(1),
            start: 100,
            end: 200,
        };
        assert!(chunk.overlaps(&(199..250)));
        assert!(!chunk.overlaps(&(200..250)));
        assert!(!chunk.overlaps(&(50..100)));
        assert!(chunk.overlaps(&(50..101)));
    }
}
