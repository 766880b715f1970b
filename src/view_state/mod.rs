//! View-state layer - line heights, viewport mapping, priorities, caching
//!
//! Everything here is synchronous and single-owner; the render layer wraps
//! it in one lock and drives it from worker threads.
//!
//! # Module Structure
//!
//! - `height_index`: LineHeightTable - per-line heights, O(log n) prefix sums via Fenwick tree
//! - `visible_range`: VisibleRange - line span within or near the viewport
//! - `viewport`: ViewportTracker - scroll offset + viewport size to VisibleRange
//! - `priority`: RenderPriority and the distance-based PriorityClassifier
//! - `cache`: ChunkCache - bounded, distance-evicted rendered-chunk store

pub mod cache;
pub mod height_index;
pub mod priority;
pub mod viewport;
pub mod visible_range;

pub use cache::ChunkCache;
pub use height_index::LineHeightTable;
pub use priority::{PriorityClassifier, RenderPriority};
pub use viewport::ViewportTracker;
pub use visible_range::VisibleRange;
