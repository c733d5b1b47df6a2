//! Core memory types: configuration, errors, ids and document models.

pub mod config;
pub mod document;
pub mod errors;
pub mod ids;

pub use config::{ChunkingConfig, EmbeddingConfig, MemoryConfig, SearchConfig, StorageConfig};
pub use document::{Metadata, NewDocument, SearchResult, VectorDocument};
pub use errors::{MemoryError, MemoryResult};
pub use ids::DocumentId;
