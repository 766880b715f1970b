//! chunkview
//!
//! Progressive, viewport-driven rendering of large text documents.
//!
//! A document is split into fixed-size line chunks. Chunks near the viewport
//! are rendered first on a bounded worker pool, finished chunks are cached
//! with distance-based eviction, and every request is answered immediately
//! with an assembly of rendered chunks, placeholders and spacers whose total
//! height always matches the full document.
//!
//! The entry point is [`render::ProgressiveRenderer`].

pub mod config;
pub mod logging;
pub mod model;
pub mod render;
pub mod view_state;

// Helpers for the command-line shell
pub mod integration;
