//! RenderScheduler - cancellable, priority-ordered chunk rendering
//!
//! A batch of `(chunk, priority)` requests is sorted most-urgent first,
//! stripped of chunks that are already cached, failed or in flight, and
//! handed to the [`WorkerPool`] one unit per chunk.
//!
//! Each unit:
//! 1. checks its session's cancellation token and bails out if set, or if
//!    a synchronous caller has taken the chunk over;
//! 2. renders the chunk text without holding any lock;
//! 3. takes the state lock and checks the token again;
//! 4. writes the result into the cache, metrics and line-height table;
//! 5. hands the chunk to every progress session it belongs to and fires
//!    the callbacks after releasing the lock.
//!
//! `cancel_all` flips the current session's token and starts a new
//! generation. It never waits for running units.

use super::cancellation::{CancellationSource, CancellationToken};
use super::pool::WorkerPool;
use super::renderer::ChunkRenderer;
use super::assembler::Slot;
use super::state::{notify_progress, InFlight, Shared};
use crate::model::{Chunk, ChunkIndex, Document, EngineError, RenderError};
use crate::view_state::RenderPriority;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Callback fired once per settled chunk of a batch.
pub type ChunkCallback = Arc<dyn Fn(ChunkOutcome) + Send + Sync>;

/// How a render unit ended. Cancelled units report nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// Content was rendered and cached.
    Rendered,
    /// The renderer failed; a fallback block will be shown.
    Failed(String),
}

/// Completion report for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Chunk that settled.
    pub chunk: ChunkIndex,
    /// Priority it was scheduled with.
    pub priority: RenderPriority,
    /// Result of the render.
    pub status: UnitStatus,
}

#[derive(Debug)]
struct Session {
    source: CancellationSource,
    generation: u64,
}

/// Dispatches render units onto a bounded worker pool.
pub struct RenderScheduler {
    pool: WorkerPool,
    session: Mutex<Session>,
}

impl RenderScheduler {
    /// Start a scheduler backed by `concurrency` workers.
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        Ok(Self {
            pool: WorkerPool::new(concurrency)?,
            session: Mutex::new(Session {
                source: CancellationSource::new(),
                generation: 0,
            }),
        })
    }

    /// Number of worker threads.
    pub fn concurrency(&self) -> usize {
        self.pool.concurrency()
    }

    /// Current rendering session generation.
    pub fn generation(&self) -> u64 {
        self.session.lock().generation
    }

    /// Units waiting for a worker.
    pub fn queued(&self) -> usize {
        self.pool.queued()
    }

    /// Cancel every unit of the current session and open a new one.
    ///
    /// Returns the new generation. Non-blocking: running units notice the
    /// flag at their next check.
    pub fn cancel_all(&self) -> u64 {
        let mut session = self.session.lock();
        session.source.cancel();
        session.source = CancellationSource::new();
        session.generation += 1;
        debug!(
            target: "render.scheduler",
            generation = session.generation,
            queued = self.pool.queued(),
            "render_session_cancelled"
        );
        session.generation
    }

    /// Block until no unit is queued or running.
    pub fn wait_idle(&self) {
        self.pool.wait_idle();
    }

    /// Submit a batch. Returns how many units were actually queued.
    pub(crate) fn submit<C>(
        &self,
        shared: &Arc<Shared<C>>,
        mut requests: Vec<(Chunk, RenderPriority)>,
        on_chunk: Option<ChunkCallback>,
    ) -> usize
    where
        C: Send + Sync + 'static,
    {
        requests.sort_by_key(|(chunk, priority)| (*priority, chunk.index));
        let (token, generation) = {
            let session = self.session.lock();
            (session.source.token(), session.generation)
        };

        let (document, accepted) = {
            let mut state = shared.state.lock();
            let total_lines = state.document.total_lines();
            let mut accepted = Vec::with_capacity(requests.len());
            for (chunk, priority) in requests {
                if chunk.is_empty() || chunk.end > total_lines {
                    trace!(target: "render.scheduler", chunk = chunk.index.get(), "request_out_of_bounds");
                    continue;
                }
                if state.is_settled(chunk.index) {
                    trace!(target: "render.scheduler", chunk = chunk.index.get(), "request_already_settled");
                    continue;
                }
                if state.is_in_flight(chunk.index, generation) {
                    trace!(target: "render.scheduler", chunk = chunk.index.get(), "request_already_in_flight");
                    continue;
                }
                state.in_flight.insert(chunk.index, InFlight::Queued(generation));
                accepted.push((chunk, priority));
            }
            (Arc::clone(&state.document), accepted)
        };

        let submitted = accepted.len();
        for (chunk, priority) in accepted {
            let unit = RenderUnit {
                shared: Arc::clone(shared),
                document: Arc::clone(&document),
                chunk,
                priority,
                token: token.clone(),
                generation,
                on_chunk: on_chunk.clone(),
            };
            if !self.pool.submit(priority, Box::new(move || unit.run())) {
                warn!(target: "render.scheduler", chunk = chunk.index.get(), "pool_shut_down");
            }
        }
        debug!(target: "render.scheduler", generation, submitted, "render_batch_submitted");
        submitted
    }
}

struct RenderUnit<C> {
    shared: Arc<Shared<C>>,
    document: Arc<Document>,
    chunk: Chunk,
    priority: RenderPriority,
    token: CancellationToken,
    generation: u64,
    on_chunk: Option<ChunkCallback>,
}

impl<C> RenderUnit<C>
where
    C: Send + Sync + 'static,
{
    fn run(self) {
        let Self {
            shared,
            document,
            chunk,
            priority,
            token,
            generation,
            on_chunk,
        } = self;

        {
            let mut state = shared.state.lock();
            if token.is_cancelled() {
                state.release(chunk.index, generation);
                shared.released.notify_all();
                trace!(target: "render.scheduler", chunk = chunk.index.get(), "unit_cancelled_before_start");
                return;
            }
            if !state.start(chunk.index, generation) {
                trace!(target: "render.scheduler", chunk = chunk.index.get(), "unit_superseded");
                return;
            }
        }

        let (result, elapsed) = render_timed(shared.renderer.as_ref(), document.chunk_text(&chunk));
        let measured = measure(&shared, &result);

        let mut state = shared.state.lock();
        state.release(chunk.index, generation);
        shared.released.notify_all();
        // Checked under the lock so a cancel either precedes the write or
        // observes it as already completed.
        if token.is_cancelled() {
            trace!(target: "render.scheduler", chunk = chunk.index.get(), "unit_cancelled_before_write");
            return;
        }

        let (status, slot) = match result {
            Ok(content) => {
                let content = Arc::new(content);
                state.store_rendered(&shared.chunker, &chunk, Arc::clone(&content), elapsed, measured);
                trace!(
                    target: "render.scheduler",
                    chunk = chunk.index.get(),
                    priority = priority.as_str(),
                    "unit_finished"
                );
                (UnitStatus::Rendered, Slot::Rendered(content))
            }
            Err(err) => {
                state.store_failed(&chunk, &err);
                let reason = err.to_string();
                (UnitStatus::Failed(reason.clone()), Slot::Failed(reason))
            }
        };
        let updates = state.advance_sessions(&shared.assembler, &chunk, &slot, Some(generation));
        drop(state);

        notify_progress(updates);
        if let Some(on_chunk) = on_chunk {
            on_chunk(ChunkOutcome {
                chunk: chunk.index,
                priority,
                status,
            });
        }
    }
}

/// Run the renderer once, converting a panic into [`RenderError::Panicked`].
pub(crate) fn render_timed<C>(
    renderer: &dyn ChunkRenderer<C>,
    text: &str,
) -> (Result<C, RenderError>, Duration) {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| renderer.render(text)))
        .unwrap_or_else(|_| Err(RenderError::Panicked));
    (result, started.elapsed())
}

/// Per-line heights of a successful render, if a measurer is configured.
pub(crate) fn measure<C>(shared: &Shared<C>, result: &Result<C, RenderError>) -> Option<Vec<f64>> {
    match (result, &shared.measurer) {
        (Ok(content), Some(measurer)) => Some(measurer.measure(content)),
        _ => None,
    }
}
