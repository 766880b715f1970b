//! Core model newtypes

/// Index of a chunk within a document. 0-indexed.
///
/// `ChunkIndex(n)` covers lines `[n * chunk_size, (n + 1) * chunk_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ChunkIndex(usize);

impl ChunkIndex {
    /// Create a new ChunkIndex from a raw 0-based value.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw 0-based index value.
    pub fn get(&self) -> usize {
        self.0
    }

    /// Absolute distance to another chunk, in chunks.
    pub fn distance(&self, other: ChunkIndex) -> usize {
        self.0.abs_diff(other.0)
    }

    /// Get the next chunk index.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Get the previous chunk index, saturating at 0.
    pub fn prev(&self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl From<usize> for ChunkIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for ChunkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
