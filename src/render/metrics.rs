//! Cache hit/miss counters and render timing.

use std::time::Duration;

/// Counters for the render pipeline.
///
/// Monotonically increasing between resets; only
/// [`ChunkCache::clear`](crate::view_state::cache::ChunkCache::clear) (and
/// therefore `clear_cache` / `prepare_document`) resets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderMetrics {
    hits: u64,
    misses: u64,
    rendered: u64,
    failed: u64,
    last_render_time: Option<Duration>,
}

/// Point-in-time copy of [`RenderMetrics`] handed to callers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    /// Duration of the most recent successful chunk render.
    pub last_render_time: Option<Duration>,
    /// `hits / (hits + misses)`, or 0.0 before any lookup.
    pub cache_hit_rate: f64,
    /// Cache lookups that found an entry.
    pub hits: u64,
    /// Cache lookups that found nothing.
    pub misses: u64,
    /// Chunks rendered successfully.
    pub rendered: u64,
    /// Chunks whose renderer reported a failure.
    pub failed: u64,
}

impl RenderMetrics {
    /// Fresh, zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub(crate) fn record_render(&mut self, elapsed: Duration) {
        self.rendered += 1;
        self.last_render_time = Some(elapsed);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Cache lookups that found an entry.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Cache lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// `hits / (hits + misses)`; 0.0 when nothing has been looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }

    /// Duration of the most recent successful render.
    pub fn last_render_time(&self) -> Option<Duration> {
        self.last_render_time
    }

    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Copy out the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            last_render_time: self.last_render_time,
            cache_hit_rate: self.hit_rate(),
            hits: self.hits,
            misses: self.misses,
            rendered: self.rendered,
            failed: self.failed,
        }
    }
}
