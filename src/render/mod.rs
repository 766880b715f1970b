//! Render layer - scheduling, caching and assembling chunk output
//!
//! # Module Structure
//!
//! - `engine`: ProgressiveRenderer - public facade over everything below
//! - `scheduler`: RenderScheduler - cancellable, priority-ordered dispatch
//! - `pool`: WorkerPool - fixed threads draining a priority heap
//! - `cancellation`: CancellationSource / CancellationToken
//! - `assembler`: Assembler - cache state to spacer/chunk/placeholder blocks
//! - `prefetch`: Prefetcher - low-priority neighbours of the viewport
//! - `metrics`: RenderMetrics - hit/miss counters and render timing
//! - `renderer`: ChunkRenderer / LineMeasurer seams
//! - `state`: the single lock-guarded engine state

pub mod assembler;
pub mod cancellation;
pub mod engine;
pub mod metrics;
pub mod pool;
pub mod prefetch;
pub mod renderer;
pub mod scheduler;
mod state;

pub use assembler::{Assembler, Assembly, Block, Slot, DEFAULT_PLACEHOLDER_MAX_LINES};
pub use cancellation::{CancellationSource, CancellationToken};
pub use engine::ProgressiveRenderer;
pub use metrics::{MetricsSnapshot, RenderMetrics};
pub use pool::{WorkerPool, DEFAULT_CONCURRENCY};
pub use prefetch::{Prefetcher, DEFAULT_PREFETCH_RADIUS};
pub use renderer::{ChunkRenderer, LineMeasurer};
pub use scheduler::{ChunkCallback, ChunkOutcome, RenderScheduler, UnitStatus};
pub use state::ProgressCallback;
