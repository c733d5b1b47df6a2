//! Semantic memory subsystem.
//!
//! Organized bottom-up:
//! - `core`: configuration, errors, ids and document models
//! - `embedding`: provider contract and the `OpenAI`, Google, Voyage and local backends
//! - `storage`: vector store contract, `SQLite` implementation and embedding cache
//! - `retrieval`: cosine similarity and hybrid result merging
//! - `ingest`: file discovery and paragraph chunking
//! - `engine`: the `MemorySearch` orchestrator

pub mod core;
pub mod embedding;
pub mod engine;
pub mod ingest;
pub mod retrieval;
pub mod storage;

// Re-export commonly used types for convenience
pub use core::{
    ChunkingConfig, DocumentId, EmbeddingConfig, MemoryConfig, MemoryError, MemoryResult,
    Metadata, NewDocument, SearchConfig, SearchResult, StorageConfig, VectorDocument,
};
pub use embedding::{EmbedFuture, EmbeddingProvider, ProviderKind, create_provider};
pub use engine::{IndexOptions, MemoryBackends, MemorySearch, MemoryStats, SearchOptions};
pub use ingest::Chunker;
pub use retrieval::{LEXICAL_WEIGHT, cosine_similarity};
pub use storage::{LEXICAL_SCORE, SqliteVectorStore, StoreFuture, VectorStore};
