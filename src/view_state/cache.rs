//! Bounded chunk cache with distance-based eviction
//!
//! Generic LRU caches cannot express "evict whatever is farthest from the
//! viewport", so this is an explicit ordered map scanned linearly on
//! eviction. Capacity is small (tens of chunks), which keeps the scan cheap.

use crate::model::ChunkIndex;
use crate::render::metrics::RenderMetrics;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default maximum number of cached chunks.
pub const DEFAULT_MAX_CACHED_CHUNKS: usize = 20;

/// Mapping from chunk index to rendered content.
///
/// Holds at most one entry per chunk and never more than `capacity`
/// entries after a [`put`](Self::put). Lookups through [`get`](Self::get)
/// feed the hit/miss counters.
#[derive(Debug)]
pub struct ChunkCache<C> {
    entries: BTreeMap<ChunkIndex, Arc<C>>,
    capacity: usize,
    metrics: RenderMetrics,
}

impl<C> ChunkCache<C> {
    /// Create new cache with given capacity.
    ///
    /// If capacity is 0, uses [`DEFAULT_MAX_CACHED_CHUNKS`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_MAX_CACHED_CHUNKS
        } else {
            capacity
        };
        Self {
            entries: BTreeMap::new(),
            capacity,
            metrics: RenderMetrics::new(),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a chunk, recording a hit or a miss.
    pub fn get(&mut self, index: ChunkIndex) -> Option<Arc<C>> {
        match self.entries.get(&index) {
            Some(content) => {
                self.metrics.record_hit();
                Some(Arc::clone(content))
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Look up a chunk without touching the counters.
    pub fn peek(&self, index: ChunkIndex) -> Option<&Arc<C>> {
        self.entries.get(&index)
    }

    /// Whether a chunk is cached. Does not touch the counters.
    pub fn contains(&self, index: ChunkIndex) -> bool {
        self.entries.contains_key(&index)
    }

    /// Insert rendered content, replacing any previous entry for the chunk.
    ///
    /// While the cache is over capacity, evicts the entry farthest from
    /// `center`. Returns the evicted chunk indices in eviction order.
    pub fn put(&mut self, index: ChunkIndex, content: Arc<C>, center: ChunkIndex) -> Vec<ChunkIndex> {
        self.entries.insert(index, content);
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            match self.evict_one(center) {
                Some(victim) => evicted.push(victim),
                None => break,
            }
        }
        evicted
    }

    /// Remove the entry whose distance to `center` is strictly maximal.
    ///
    /// Ties are broken by evicting the lower chunk index. Returns the evicted
    /// index, or `None` if the cache is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunkview::model::ChunkIndex;
    /// # use chunkview::view_state::cache::ChunkCache;
    /// # use std::sync::Arc;
    /// let mut cache = ChunkCache::new(10);
    /// for i in [3, 5, 7] {
    ///     cache.put(ChunkIndex::new(i), Arc::new(i), ChunkIndex::new(5));
    /// }
    /// // 3 and 7 are both two chunks away; the lower index goes first.
    /// assert_eq!(cache.evict_one(ChunkIndex::new(5)), Some(ChunkIndex::new(3)));
    /// ```
    pub fn evict_one(&mut self, center: ChunkIndex) -> Option<ChunkIndex> {
        // Ascending iteration + strict comparison keeps the lowest index on ties.
        let mut victim: Option<(ChunkIndex, usize)> = None;
        for &index in self.entries.keys() {
            let distance = index.distance(center);
            match victim {
                Some((_, best)) if distance <= best => {}
                _ => victim = Some((index, distance)),
            }
        }
        let (index, distance) = victim?;
        self.entries.remove(&index);
        tracing::trace!(
            target: "render.cache",
            chunk = index.get(),
            center = center.get(),
            distance,
            "chunk_evicted"
        );
        Some(index)
    }

    /// Remove every entry and reset the hit/miss counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.metrics.reset();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached chunk indices in ascending order.
    pub fn indices(&self) -> Vec<ChunkIndex> {
        self.entries.keys().copied().collect()
    }

    /// Counters accumulated by this cache.
    pub fn metrics(&self) -> &RenderMetrics {
        &self.metrics
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut RenderMetrics {
        &mut self.metrics
    }
}

impl<C> Default for ChunkCache<C> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHED_CHUNKS)
    }
}
