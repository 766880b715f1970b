//! Document model: raw text, line chunks, and error types.

pub mod chunk;
pub mod document;
pub mod error;
pub mod types;

pub use chunk::{Chunk, DocumentChunker, DEFAULT_CHUNK_SIZE};
pub use document::Document;
pub use error::{AppError, EngineError, RenderError};
pub use types::ChunkIndex;
