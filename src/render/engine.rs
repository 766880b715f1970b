//! ProgressiveRenderer - the engine facade
//!
//! Owns the shared state, the scheduler and the stateless helpers, and
//! exposes the operations a host view drives: prepare a document, map a
//! scroll position to a line range, and render that range either
//! synchronously or progressively.

use super::assembler::{Assembler, Assembly, Slot};
use super::metrics::MetricsSnapshot;
use super::prefetch::Prefetcher;
use super::renderer::{ChunkRenderer, LineMeasurer};
use super::scheduler::{measure, render_timed, ChunkCallback, RenderScheduler};
use super::state::{notify_progress, EngineState, ProgressCallback, Shared};
use crate::config::EngineConfig;
use crate::model::{ChunkIndex, Document, DocumentChunker, EngineError};
use crate::view_state::{PriorityClassifier, ViewportTracker, VisibleRange};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Renders a large document chunk by chunk, nearest the viewport first.
///
/// `C` is whatever the [`ChunkRenderer`] produces; the engine never looks
/// inside it. All methods take `&self` and may be called from any thread.
///
/// # Examples
///
/// ```
/// use chunkview::config::EngineConfig;
/// use chunkview::model::error::RenderError;
/// use chunkview::render::ProgressiveRenderer;
///
/// let engine = ProgressiveRenderer::new(EngineConfig::default(), |text: &str| {
///     Ok::<_, RenderError>(text.to_uppercase())
/// })
/// .unwrap();
/// engine.prepare_document("alpha\nbeta\ngamma\n");
///
/// let range = engine.calculate_visible_range(0.0, 100.0);
/// let assembly = engine.render_visible_content(range);
/// assert!(assembly.is_complete());
/// assert_eq!(assembly.rendered().count(), 1);
/// ```
pub struct ProgressiveRenderer<C> {
    config: EngineConfig,
    shared: Arc<Shared<C>>,
    scheduler: RenderScheduler,
    viewport: ViewportTracker,
    classifier: PriorityClassifier,
    prefetcher: Prefetcher,
}

impl<C> ProgressiveRenderer<C>
where
    C: Send + Sync + 'static,
{
    /// Start an engine with `config.concurrency` render workers.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or a worker thread cannot be
    /// spawned.
    pub fn new<R>(config: EngineConfig, renderer: R) -> Result<Self, EngineError>
    where
        R: ChunkRenderer<C> + 'static,
    {
        Self::build(config, Box::new(renderer), None)
    }

    /// Like [`new`](Self::new), additionally feeding every rendered chunk's
    /// measured line heights back into the height table.
    pub fn with_measurer<R, M>(
        config: EngineConfig,
        renderer: R,
        measurer: M,
    ) -> Result<Self, EngineError>
    where
        R: ChunkRenderer<C> + 'static,
        M: LineMeasurer<C> + 'static,
    {
        Self::build(config, Box::new(renderer), Some(Box::new(measurer)))
    }

    fn build(
        config: EngineConfig,
        renderer: Box<dyn ChunkRenderer<C>>,
        measurer: Option<Box<dyn LineMeasurer<C>>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState::new(
                config.max_cached_chunks,
                config.estimated_line_height,
            )),
            released: Condvar::new(),
            renderer,
            measurer,
            chunker: DocumentChunker::new(config.chunk_size),
            assembler: Assembler::new(config.placeholder_max_lines),
        });
        let scheduler = RenderScheduler::new(config.concurrency)?;
        info!(
            target: "render.engine",
            chunk_size = config.chunk_size,
            concurrency = config.concurrency,
            max_cached_chunks = config.max_cached_chunks,
            "engine_started"
        );
        Ok(Self {
            viewport: ViewportTracker::new(config.render_buffer),
            classifier: PriorityClassifier::new(config.near_threshold, config.far_threshold),
            prefetcher: Prefetcher::new(config.prefetch_radius),
            config,
            shared,
            scheduler,
        })
    }

    /// The configuration the engine was started with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the document.
    ///
    /// Cancels outstanding work, resets the height table to estimates and
    /// empties the cache and its counters. Returns the number of chunks.
    pub fn prepare_document(&self, text: impl Into<Arc<str>>) -> usize {
        let document = Document::new(text);
        let total_lines = document.total_lines();
        self.scheduler.cancel_all();
        self.shared.state.lock().reset(document);
        // Callers waiting on in-flight chunks must see the new document.
        self.shared.released.notify_all();
        let chunks = self.shared.chunker.chunk_count(total_lines);
        info!(target: "render.engine", total_lines, chunks, "document_prepared");
        chunks
    }

    /// Map a scroll position to the line range worth rendering and remember
    /// it as the viewport centre for eviction and prefetch.
    pub fn calculate_visible_range(&self, scroll_offset: f64, viewport_height: f64) -> VisibleRange {
        let mut state = self.shared.state.lock();
        let range = self
            .viewport
            .calculate_visible_range(&state.heights, scroll_offset, viewport_height);
        state.last_range = Some(range);
        state.focus = Some(range);
        trace!(
            target: "viewport",
            scroll_offset,
            viewport_height,
            start_line = range.start_line,
            line_count = range.line_count,
            "visible_range"
        );
        range
    }

    /// The range most recently returned by
    /// [`calculate_visible_range`](Self::calculate_visible_range).
    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.shared.state.lock().last_range
    }

    /// Render every missing chunk of `range` on the calling thread, then
    /// assemble. The result has no placeholders.
    ///
    /// A chunk that a worker is already rendering is waited for rather than
    /// rendered twice; chunks merely queued on the pool are taken over.
    /// Chunks that fail to render come back as fallback blocks. If the
    /// document is replaced while this runs, the fresh renders are dropped
    /// and the new document's range is assembled from the cache instead.
    pub fn render_visible_content(&self, range: VisibleRange) -> Assembly<C> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        let document = Arc::clone(&state.document);
        let range = range.clamped(document.total_lines());
        state.focus = Some(range);
        let chunks = shared.chunker.chunks_overlapping(range.lines(), document.total_lines());
        let mut slots = state.lookup(&chunks);
        let mut rendered_now = 0;

        loop {
            if !Arc::ptr_eq(&state.document, &document) {
                debug!(target: "render.engine", "document_replaced_during_render");
                let range = range.clamped(state.document.total_lines());
                return state.assemble(&shared.assembler, &shared.chunker, range);
            }

            let mut claimed = Vec::new();
            let mut awaiting = 0;
            for chunk in &chunks {
                if slots.contains_key(&chunk.index) {
                    continue;
                }
                if let Some(slot) = state.settled_slot(chunk.index) {
                    slots.insert(chunk.index, slot);
                } else if state.claim(chunk.index) {
                    claimed.push(*chunk);
                } else {
                    awaiting += 1;
                }
            }
            if claimed.is_empty() {
                if awaiting == 0 {
                    break;
                }
                trace!(target: "render.engine", awaiting, "waiting_for_in_flight_chunks");
                shared.released.wait(&mut state);
                continue;
            }

            rendered_now += claimed.len();
            let outcomes: Vec<_> = MutexGuard::unlocked(&mut state, || {
                claimed
                    .into_iter()
                    .map(|chunk| {
                        let (result, elapsed) =
                            render_timed(shared.renderer.as_ref(), document.chunk_text(&chunk));
                        let measured = measure(shared, &result);
                        (chunk, result, elapsed, measured)
                    })
                    .collect()
            });
            if !Arc::ptr_eq(&state.document, &document) {
                continue;
            }

            let mut updates = Vec::new();
            for (chunk, result, elapsed, measured) in outcomes {
                state.release_claim(chunk.index);
                let slot = match result {
                    Ok(content) => {
                        let content = Arc::new(content);
                        state.store_rendered(&shared.chunker, &chunk, Arc::clone(&content), elapsed, measured);
                        Slot::Rendered(content)
                    }
                    Err(err) => {
                        state.store_failed(&chunk, &err);
                        Slot::Failed(err.to_string())
                    }
                };
                updates.extend(state.advance_sessions(&shared.assembler, &chunk, &slot, None));
                slots.insert(chunk.index, slot);
            }
            shared.released.notify_all();
            if !updates.is_empty() {
                MutexGuard::unlocked(&mut state, || notify_progress(updates));
            }
        }

        debug!(
            target: "render.engine",
            chunks = chunks.len(),
            rendered_now,
            "visible_content_rendered"
        );
        shared
            .assembler
            .assemble_with(&chunks, &state.heights, |chunk| {
                slots.remove(&chunk.index).unwrap_or(Slot::Pending)
            })
    }

    /// Emit the best assembly available right now, then render the missing
    /// chunks in the background.
    ///
    /// `on_initial` runs on the calling thread before this returns. Each
    /// chunk that settles afterwards triggers `on_progress` on a worker
    /// thread with a fresh assembly and its completion fraction; the last
    /// call carries `1.0`. Chunks already shown stay in the progress
    /// assemblies even if the cache evicts them meanwhile. If nothing is
    /// missing, `on_progress(_, 1.0)` is called immediately. Progress stops
    /// silently when the work is cancelled.
    ///
    /// Returns the number of render units queued.
    pub fn render_progressively<I, P>(&self, range: VisibleRange, on_initial: I, on_progress: P) -> usize
    where
        I: FnOnce(Assembly<C>),
        P: Fn(Assembly<C>, f64) + Send + Sync + 'static,
    {
        let on_progress: ProgressCallback<C> = Arc::new(on_progress);

        let (initial, requests) = {
            let mut state = self.shared.state.lock();
            // Read under the state lock: a concurrent cancel_all clears
            // sessions only after bumping the generation.
            let generation = self.scheduler.generation();
            let total_lines = state.document.total_lines();
            let range = range.clamped(total_lines);
            state.focus = Some(range);
            state.last_scheduled = Some(range);
            let chunks = self.shared.chunker.chunks_overlapping(range.lines(), total_lines);
            let shown = state.lookup(&chunks);
            let initial = self.shared.assembler.assemble_with(&chunks, &state.heights, |chunk| {
                shown.get(&chunk.index).cloned().unwrap_or(Slot::Pending)
            });
            if initial.is_complete() {
                (initial, Vec::new())
            } else {
                let visible = state.last_range.unwrap_or(range);
                let pending: Vec<_> = chunks
                    .iter()
                    .filter(|chunk| !shown.contains_key(&chunk.index))
                    .copied()
                    .collect();
                let requests = self.classifier.prioritize(pending, &visible, &state.heights);
                state.open_session(generation, chunks, shown, Arc::clone(&on_progress));
                (initial, requests)
            }
        };

        if initial.is_complete() {
            on_initial(initial.clone());
            on_progress(initial, 1.0);
            return 0;
        }
        on_initial(initial);
        self.scheduler.submit(&self.shared, requests, None)
    }

    /// Queue every unsettled chunk overlapping `range`, prioritised by
    /// distance from the last visible range. `on_chunk` fires once per
    /// chunk that settles.
    pub fn schedule(&self, range: VisibleRange, on_chunk: Option<ChunkCallback>) -> usize {
        let requests = {
            let mut state = self.shared.state.lock();
            let total_lines = state.document.total_lines();
            let range = range.clamped(total_lines);
            state.focus = Some(range);
            state.last_scheduled = Some(range);
            let visible = state.last_range.unwrap_or(range);
            let pending = self
                .shared
                .chunker
                .chunks_overlapping(range.lines(), total_lines)
                .into_iter()
                .filter(|chunk| !state.is_settled(chunk.index));
            self.classifier.prioritize(pending, &visible, &state.heights)
        };
        self.scheduler.submit(&self.shared, requests, on_chunk)
    }

    /// React to a scroll: recompute the visible range and, if it moved more
    /// than the re-render threshold since the last scheduled range, cancel
    /// outstanding work and schedule the new range.
    ///
    /// Returns `None` when the move was too small to act on, otherwise the
    /// number of units queued.
    pub fn on_scroll(&self, scroll_offset: f64, viewport_height: f64) -> Option<usize> {
        let range = self.calculate_visible_range(scroll_offset, viewport_height);
        let previous = self.shared.state.lock().last_scheduled;
        if let Some(previous) = previous {
            if !range.differs_beyond(&previous, self.config.rerender_threshold) {
                trace!(
                    target: "render.engine",
                    start_line = range.start_line,
                    previous_start = previous.start_line,
                    "scroll_below_rerender_threshold"
                );
                return None;
            }
        }
        self.cancel_all();
        Some(self.schedule(range, None))
    }

    /// Queue the unsettled chunks within the prefetch radius of the last
    /// visible range at `Low` priority. Returns how many were queued.
    pub fn prefetch_nearby_chunks(&self) -> usize {
        let generation = self.scheduler.generation();
        let requests = {
            let state = self.shared.state.lock();
            self.prefetcher
                .requests(&state, &self.shared.chunker, generation)
        };
        if requests.is_empty() {
            return 0;
        }
        let queued = self.scheduler.submit(&self.shared, requests, None);
        debug!(target: "render.prefetch", queued, "prefetch_submitted");
        queued
    }

    /// Overwrite measured heights starting at `start_line`. Returns how many
    /// lines were updated.
    pub fn update_line_heights(&self, heights: &[f64], start_line: usize) -> usize {
        self.shared.state.lock().heights.update(heights, start_line)
    }

    /// Assemble `range` from the cache without rendering anything.
    pub fn assemble(&self, range: VisibleRange) -> Assembly<C> {
        let mut state = self.shared.state.lock();
        let range = range.clamped(state.document.total_lines());
        state.assemble(&self.shared.assembler, &self.shared.chunker, range)
    }

    /// Current counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.state.lock().cache.metrics().snapshot()
    }

    /// Drop every cached chunk, forget failures and reset the counters.
    pub fn clear_cache(&self) {
        self.shared.state.lock().clear_rendered();
        debug!(target: "render.engine", "cache_cleared");
    }

    /// Cancel all queued and running render units. Returns immediately;
    /// units already past their final check still complete.
    pub fn cancel_all(&self) {
        self.scheduler.cancel_all();
        self.shared.state.lock().sessions.clear();
    }

    /// Block until no render unit is queued or running.
    pub fn wait_idle(&self) {
        self.scheduler.wait_idle();
    }

    /// Lines in the current document.
    pub fn total_lines(&self) -> usize {
        self.shared.state.lock().document.total_lines()
    }

    /// Height of the whole document per the line-height table.
    pub fn total_height(&self) -> f64 {
        self.shared.state.lock().heights.total()
    }

    /// Chunks the current document splits into.
    pub fn chunk_count(&self) -> usize {
        self.shared.chunker.chunk_count(self.total_lines())
    }

    /// Indices currently in the cache, ascending.
    pub fn cached_chunks(&self) -> Vec<ChunkIndex> {
        self.shared.state.lock().cache.indices()
    }

    /// Chunks whose renderer failed, ascending.
    pub fn failed_chunks(&self) -> Vec<ChunkIndex> {
        self.shared.state.lock().failed.keys().copied().collect()
    }
}

impl<C> Drop for ProgressiveRenderer<C> {
    fn drop(&mut self) {
        // Running units must not publish into a dying engine.
        self.scheduler.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RenderError;

    fn engine(config: EngineConfig) -> ProgressiveRenderer<String> {
        ProgressiveRenderer::new(config, |text: &str| Ok::<_, RenderError>(text.to_string()))
            .expect("engine starts")
    }

    fn lines(count: usize) -> String {
        (0..count).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            chunk_size: 0,
            ..EngineConfig::default()
        };
        let result = ProgressiveRenderer::new(config, |text: &str| {
            Ok::<_, RenderError>(text.len())
        });
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn prepare_document_resets_geometry() {
        let engine = engine(EngineConfig::default());
        assert_eq!(engine.prepare_document(lines(250)), 3);
        assert_eq!(engine.total_lines(), 250);
        assert_eq!(engine.total_height(), 250.0 * 8.0);

        engine.update_line_heights(&[20.0], 0);
        assert_eq!(engine.total_height(), 249.0 * 8.0 + 20.0);

        engine.prepare_document(lines(10));
        assert_eq!(engine.total_height(), 80.0);
        assert_eq!(engine.chunk_count(), 1);
    }

    #[test]
    fn render_visible_content_counts_one_miss_per_new_chunk() {
        let engine = engine(EngineConfig::default());
        engine.prepare_document(lines(1_000));
        let range = VisibleRange::new(150, 100); // chunks 1 and 2

        let first = engine.render_visible_content(range);
        assert!(first.is_complete());
        let metrics = engine.metrics();
        assert_eq!((metrics.hits, metrics.misses), (0, 2));
        assert_eq!(metrics.rendered, 2);

        engine.render_visible_content(range);
        let metrics = engine.metrics();
        assert_eq!((metrics.hits, metrics.misses), (2, 2));
        assert_eq!(metrics.cache_hit_rate, 0.5);
    }

    #[test]
    fn progressive_render_counts_one_lookup_per_chunk() {
        let engine = engine(EngineConfig {
            concurrency: 2,
            ..EngineConfig::default()
        });
        engine.prepare_document(lines(1_000));

        let queued = engine.render_progressively(VisibleRange::new(0, 600), |_| {}, |_, _| {});
        assert_eq!(queued, 6);
        engine.wait_idle();

        // Re-assembling for each progress update must not inflate misses.
        let metrics = engine.metrics();
        assert_eq!((metrics.hits, metrics.misses), (0, 6));
        assert_eq!(metrics.rendered, 6);
        assert!(engine.shared.state.lock().sessions.is_empty());
    }

    #[test]
    fn progress_session_uses_the_generation_its_units_run_under() {
        let engine = engine(EngineConfig {
            concurrency: 1,
            ..EngineConfig::default()
        });
        engine.prepare_document(lines(1_000));
        engine.cancel_all();
        engine.cancel_all();
        let generation = engine.scheduler.generation();

        let (tx, rx) = crossbeam_channel::unbounded();
        engine.render_progressively(VisibleRange::new(0, 300), |_| {}, move |_, fraction| {
            let _ = tx.send(fraction);
        });
        {
            let state = engine.shared.state.lock();
            assert!(state.sessions.iter().all(|session| session.generation == generation));
        }
        engine.wait_idle();

        assert_eq!(rx.try_iter().last(), Some(1.0));
        assert!(engine.shared.state.lock().sessions.is_empty());
    }

    #[test]
    fn cancel_all_drops_open_progress_sessions() {
        let engine = engine(EngineConfig::default());
        engine.prepare_document(lines(1_000));
        {
            // Hold the lock so no unit can complete the session first.
            let mut state = engine.shared.state.lock();
            let chunks = engine.shared.chunker.chunks_overlapping(0..100, 1_000);
            state.open_session(0, chunks, Default::default(), Arc::new(|_: Assembly<String>, _: f64| {}));
        }
        engine.cancel_all();
        assert!(engine.shared.state.lock().sessions.is_empty());
    }

    #[test]
    fn on_scroll_ignores_small_moves() {
        let engine = engine(EngineConfig::default());
        engine.prepare_document(lines(10_000));

        assert!(engine.on_scroll(40_000.0, 400.0).is_some());
        engine.wait_idle();
        // 10 lines at 8.0 each: below the 20-line threshold.
        assert_eq!(engine.on_scroll(40_080.0, 400.0), None);
        // 100 lines: far enough.
        assert!(engine.on_scroll(40_800.0, 400.0).is_some());
        engine.wait_idle();
    }

    #[test]
    fn clear_cache_resets_counters_and_failures() {
        let engine = ProgressiveRenderer::new(EngineConfig::default(), |_: &str| {
            Err::<String, _>(RenderError::failed("boom"))
        })
        .expect("engine starts");
        engine.prepare_document(lines(100));
        engine.render_visible_content(VisibleRange::new(0, 10));
        assert_eq!(engine.failed_chunks(), vec![ChunkIndex::new(0)]);
        assert_eq!(engine.metrics().failed, 1);

        engine.clear_cache();
        assert!(engine.failed_chunks().is_empty());
        assert_eq!(engine.metrics().misses, 0);
        assert_eq!(engine.metrics().failed, 0);
    }
}
