//! Persistent document storage.

pub mod cache;
pub mod codec;
pub mod sqlite_store;
pub mod vector_store;

pub use cache::{CacheLookup, CachedEmbedding, EmbeddingCache};
pub use sqlite_store::SqliteVectorStore;
pub use vector_store::{LEXICAL_SCORE, StoreFuture, VectorStore};
