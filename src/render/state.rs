//! The single shared-mutable-state domain of the engine.
//!
//! Document, line heights, cache, metrics, in-flight bookkeeping and active
//! progress sessions all live in one [`EngineState`] behind one mutex.
//! Workers receive immutable inputs, render without holding the lock, then
//! take it once to publish their result.

use super::assembler::{Assembler, Assembly, Slot};
use super::renderer::{ChunkRenderer, LineMeasurer};
use crate::model::{Chunk, ChunkIndex, Document, DocumentChunker, RenderError};
use crate::view_state::{ChunkCache, LineHeightTable, VisibleRange};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Callback receiving each more-complete assembly and its completion fraction.
pub type ProgressCallback<C> = Arc<dyn Fn(Assembly<C>, f64) + Send + Sync>;

/// Who currently owns the rendering of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InFlight {
    /// Submitted to the pool by this scheduler generation, not started.
    Queued(u64),
    /// Picked up by a worker of this generation.
    Running(u64),
    /// Rendered synchronously on a caller's thread.
    Caller,
}

/// A `render_progressively` call still waiting for chunks.
///
/// Keeps every slot it has already shown, so completion never depends on
/// the chunk surviving in the cache.
pub(crate) struct ProgressSession<C> {
    pub(crate) id: u64,
    pub(crate) generation: u64,
    pub(crate) chunks: Vec<Chunk>,
    pub(crate) shown: HashMap<ChunkIndex, Slot<C>>,
    pub(crate) on_progress: ProgressCallback<C>,
}

impl<C> ProgressSession<C> {
    fn assemble(&self, assembler: &Assembler, heights: &LineHeightTable) -> Assembly<C> {
        assembler.assemble_with(&self.chunks, heights, |chunk| {
            self.shown.get(&chunk.index).cloned().unwrap_or(Slot::Pending)
        })
    }
}

/// Progress callbacks to fire once the state lock is released.
pub(crate) type ProgressUpdates<C> = Vec<(ProgressCallback<C>, Assembly<C>)>;

/// Fire progress callbacks collected under the lock.
pub(crate) fn notify_progress<C>(updates: ProgressUpdates<C>) {
    for (on_progress, assembly) in updates {
        let fraction = assembly.fraction_complete();
        on_progress(assembly, fraction);
    }
}

pub(crate) struct EngineState<C> {
    pub(crate) document: Arc<Document>,
    pub(crate) heights: LineHeightTable,
    pub(crate) cache: ChunkCache<C>,
    /// Chunks whose renderer failed, with the failure text. Not retried
    /// until the cache is cleared.
    pub(crate) failed: BTreeMap<ChunkIndex, String>,
    pub(crate) in_flight: HashMap<ChunkIndex, InFlight>,
    /// Last range from `calculate_visible_range`; the prefetch centre.
    pub(crate) last_range: Option<VisibleRange>,
    /// Most recently requested range of any kind; the eviction centre.
    pub(crate) focus: Option<VisibleRange>,
    /// Last range handed to the scheduler; the re-render threshold baseline.
    pub(crate) last_scheduled: Option<VisibleRange>,
    pub(crate) sessions: Vec<ProgressSession<C>>,
    next_session_id: u64,
}

impl<C> EngineState<C> {
    pub(crate) fn new(max_cached_chunks: usize, estimated_line_height: f64) -> Self {
        Self {
            document: Arc::new(Document::empty()),
            heights: LineHeightTable::new(0, estimated_line_height),
            cache: ChunkCache::new(max_cached_chunks),
            failed: BTreeMap::new(),
            in_flight: HashMap::new(),
            last_range: None,
            focus: None,
            last_scheduled: None,
            sessions: Vec::new(),
            next_session_id: 0,
        }
    }

    /// Install a new document and drop everything derived from the old one.
    pub(crate) fn reset(&mut self, document: Document) {
        self.heights.reset(document.total_lines());
        self.document = Arc::new(document);
        self.clear_rendered();
        self.in_flight.clear();
        self.last_range = None;
        self.focus = None;
        self.last_scheduled = None;
        self.sessions.clear();
    }

    /// Empty the cache, its counters and the failure list.
    pub(crate) fn clear_rendered(&mut self) {
        self.cache.clear();
        self.failed.clear();
    }

    /// Chunk at the midpoint of the most recently requested range.
    pub(crate) fn eviction_center(&self, chunker: &DocumentChunker) -> ChunkIndex {
        let line = self.focus.or(self.last_range).map_or(0, |range| range.midpoint());
        chunker.chunk_index_for_line(line)
    }

    /// Chunk at the midpoint of the last visible range.
    pub(crate) fn viewport_center(&self, chunker: &DocumentChunker) -> ChunkIndex {
        let line = self.last_range.map_or(0, |range| range.midpoint());
        chunker.chunk_index_for_line(line)
    }

    /// Cached or permanently failed.
    pub(crate) fn is_settled(&self, index: ChunkIndex) -> bool {
        self.cache.contains(index) || self.failed.contains_key(&index)
    }

    /// What is known about `index` right now, without touching the counters.
    pub(crate) fn settled_slot(&self, index: ChunkIndex) -> Option<Slot<C>> {
        if let Some(content) = self.cache.peek(index) {
            Some(Slot::Rendered(Arc::clone(content)))
        } else {
            self.failed
                .get(&index)
                .map(|reason| Slot::Failed(reason.clone()))
        }
    }

    /// Whether a render of `index` is already owned by a caller thread or
    /// by a unit of `generation`.
    pub(crate) fn is_in_flight(&self, index: ChunkIndex, generation: u64) -> bool {
        match self.in_flight.get(&index) {
            Some(InFlight::Caller) => true,
            Some(InFlight::Queued(owner) | InFlight::Running(owner)) => *owner == generation,
            None => false,
        }
    }

    /// Move a queued unit's mark to running. Returns `false` when the mark
    /// no longer belongs to the unit, which then must not render.
    pub(crate) fn start(&mut self, index: ChunkIndex, generation: u64) -> bool {
        match self.in_flight.get_mut(&index) {
            Some(mark) if *mark == InFlight::Queued(generation) => {
                *mark = InFlight::Running(generation);
                true
            }
            _ => false,
        }
    }

    /// Take over `index` for a synchronous render.
    ///
    /// Succeeds when nothing is rendering it yet, including when a unit is
    /// merely queued; that unit will find its mark gone and skip. Fails while
    /// a worker or another caller is mid-render.
    pub(crate) fn claim(&mut self, index: ChunkIndex) -> bool {
        match self.in_flight.get(&index) {
            Some(InFlight::Running(_) | InFlight::Caller) => false,
            Some(InFlight::Queued(_)) | None => {
                self.in_flight.insert(index, InFlight::Caller);
                true
            }
        }
    }

    /// Drop the in-flight mark for `index` if it still belongs to the
    /// unit of `generation`.
    pub(crate) fn release(&mut self, index: ChunkIndex, generation: u64) {
        if matches!(
            self.in_flight.get(&index),
            Some(InFlight::Queued(owner) | InFlight::Running(owner)) if *owner == generation
        ) {
            self.in_flight.remove(&index);
        }
    }

    /// Drop a caller's mark for `index`.
    pub(crate) fn release_claim(&mut self, index: ChunkIndex) {
        if self.in_flight.get(&index) == Some(&InFlight::Caller) {
            self.in_flight.remove(&index);
        }
    }

    /// Publish a successful render: cache it, time it and, when the chunk
    /// was measured, calibrate the height table.
    pub(crate) fn store_rendered(
        &mut self,
        chunker: &DocumentChunker,
        chunk: &Chunk,
        content: Arc<C>,
        elapsed: Duration,
        measured: Option<Vec<f64>>,
    ) {
        let center = self.eviction_center(chunker);
        let evicted = self.cache.put(chunk.index, content, center);
        self.cache.metrics_mut().record_render(elapsed);
        if let Some(heights) = measured {
            self.heights.update(&heights, chunk.start);
        }
        debug!(
            target: "render.cache",
            chunk = chunk.index.get(),
            elapsed_us = elapsed.as_micros() as u64,
            evicted = evicted.len(),
            cached = self.cache.len(),
            "chunk_stored"
        );
    }

    /// Record a renderer failure; the chunk assembles as a fallback block.
    pub(crate) fn store_failed(&mut self, chunk: &Chunk, error: &RenderError) {
        warn!(
            target: "render.cache",
            chunk = chunk.index.get(),
            error = %error,
            "chunk_render_failed"
        );
        self.failed.insert(chunk.index, error.to_string());
        self.cache.metrics_mut().record_failure();
    }

    /// Resolve each chunk against the cache and the failure list,
    /// recording one hit or miss per chunk. Unsettled chunks are absent.
    pub(crate) fn lookup(&mut self, chunks: &[Chunk]) -> HashMap<ChunkIndex, Slot<C>> {
        let mut slots = HashMap::with_capacity(chunks.len());
        for chunk in chunks {
            if let Some(content) = self.cache.get(chunk.index) {
                slots.insert(chunk.index, Slot::Rendered(content));
            } else if let Some(reason) = self.failed.get(&chunk.index) {
                slots.insert(chunk.index, Slot::Failed(reason.clone()));
            }
        }
        slots
    }

    /// Cache-driven assembly of `range`, recording a hit or miss per chunk.
    pub(crate) fn assemble(
        &mut self,
        assembler: &Assembler,
        chunker: &DocumentChunker,
        range: VisibleRange,
    ) -> Assembly<C> {
        let chunks = chunker.chunks_overlapping(range.lines(), self.document.total_lines());
        let mut slots = self.lookup(&chunks);
        assembler.assemble_with(&chunks, &self.heights, |chunk| {
            slots.remove(&chunk.index).unwrap_or(Slot::Pending)
        })
    }

    /// Register a progress session over `chunks`, seeded with the slots
    /// already shown to the caller. It stays active until every chunk has
    /// a slot or the work is cancelled.
    pub(crate) fn open_session(
        &mut self,
        generation: u64,
        chunks: Vec<Chunk>,
        shown: HashMap<ChunkIndex, Slot<C>>,
        on_progress: ProgressCallback<C>,
    ) {
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.sessions.push(ProgressSession {
            id,
            generation,
            chunks,
            shown,
            on_progress,
        });
    }

    /// Hand a freshly settled chunk to every open session covering it.
    ///
    /// `generation` restricts delivery to sessions of one scheduler
    /// generation; synchronous renders pass `None`. Sessions that become
    /// complete are closed. Returns the callbacks to fire after unlocking.
    pub(crate) fn advance_sessions(
        &mut self,
        assembler: &Assembler,
        chunk: &Chunk,
        slot: &Slot<C>,
        generation: Option<u64>,
    ) -> ProgressUpdates<C> {
        let Self {
            sessions, heights, ..
        } = self;
        let mut updates = Vec::new();
        sessions.retain_mut(|session| {
            let covers = session.chunks.iter().any(|c| c.index == chunk.index);
            if !covers || generation.is_some_and(|g| g != session.generation) {
                return true;
            }
            session.shown.insert(chunk.index, slot.clone());
            let assembly = session.assemble(assembler, heights);
            let complete = assembly.is_complete();
            if complete {
                debug!(target: "render.engine", session = session.id, "progress_session_complete");
            }
            updates.push((Arc::clone(&session.on_progress), assembly));
            !complete
        });
        updates
    }
}

/// Everything a render unit needs, shared by the engine and its workers.
pub(crate) struct Shared<C> {
    pub(crate) state: Mutex<EngineState<C>>,
    /// Signalled whenever an in-flight mark is dropped.
    pub(crate) released: Condvar,
    pub(crate) renderer: Box<dyn ChunkRenderer<C>>,
    pub(crate) measurer: Option<Box<dyn LineMeasurer<C>>>,
    pub(crate) chunker: DocumentChunker,
    pub(crate) assembler: Assembler,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(i: usize) -> ChunkIndex {
        ChunkIndex::new(i)
    }

    fn state() -> EngineState<String> {
        let mut state = EngineState::new(2, 8.0);
        state.reset(Document::new("x\n".repeat(1_000)));
        state
    }

    #[test]
    fn caller_takes_over_queued_chunk_and_unit_skips() {
        let mut state = state();
        state.in_flight.insert(idx(3), InFlight::Queued(1));

        assert!(state.claim(idx(3)));
        assert!(!state.start(idx(3), 1));
        assert!(state.is_in_flight(idx(3), 7));

        state.release_claim(idx(3));
        assert!(state.in_flight.is_empty());
    }

    #[test]
    fn running_chunk_cannot_be_claimed() {
        let mut state = state();
        state.in_flight.insert(idx(3), InFlight::Queued(1));
        assert!(state.start(idx(3), 1));

        assert!(!state.claim(idx(3)));
        state.release(idx(3), 1);
        assert!(state.claim(idx(3)));
    }

    #[test]
    fn release_ignores_marks_of_other_generations() {
        let mut state = state();
        state.in_flight.insert(idx(0), InFlight::Running(2));
        state.release(idx(0), 1);
        assert_eq!(state.in_flight.get(&idx(0)), Some(&InFlight::Running(2)));
        assert!(!state.is_in_flight(idx(0), 1));
    }

    #[test]
    fn eviction_follows_the_latest_requested_range() {
        let chunker = DocumentChunker::new(100);
        let mut state = state();
        state.last_range = Some(VisibleRange::new(0, 50));
        state.focus = Some(VisibleRange::new(900, 50));

        assert_eq!(state.eviction_center(&chunker), idx(9));
        assert_eq!(state.viewport_center(&chunker), idx(0));
    }

    #[test]
    fn session_keeps_chunks_the_cache_evicted() {
        let chunker = DocumentChunker::new(100);
        let assembler = Assembler::new(3);
        let mut state = state();
        let chunks = chunker.chunks_overlapping(0..300, 1_000);
        state.open_session(0, chunks.clone(), HashMap::new(), Arc::new(|_: Assembly<String>, _: f64| {}));

        let mut last = Vec::new();
        for chunk in &chunks {
            let content = Arc::new(format!("chunk {}", chunk.index));
            state.store_rendered(&chunker, chunk, Arc::clone(&content), Duration::ZERO, None);
            last = state.advance_sessions(&assembler, chunk, &Slot::Rendered(content), Some(0));
        }

        assert_eq!(state.cache.len(), 2);
        assert!(state.sessions.is_empty());
        let (_, assembly) = last.pop().expect("final update");
        assert!(assembly.is_complete());
        assert_eq!(assembly.rendered().count(), 3);
    }

    #[test]
    fn sessions_of_other_generations_are_not_advanced() {
        let chunker = DocumentChunker::new(100);
        let assembler = Assembler::new(3);
        let mut state = state();
        let chunks = chunker.chunks_overlapping(0..100, 1_000);
        state.open_session(4, chunks.clone(), HashMap::new(), Arc::new(|_: Assembly<String>, _: f64| {}));

        let slot = Slot::Failed("boom".to_string());
        assert!(state.advance_sessions(&assembler, &chunks[0], &slot, Some(3)).is_empty());
        assert_eq!(state.advance_sessions(&assembler, &chunks[0], &slot, None).len(), 1);
        assert!(state.sessions.is_empty());
    }
}
