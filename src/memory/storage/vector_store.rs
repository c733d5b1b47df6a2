//! Vector store contract.

use std::future::Future;
use std::pin::Pin;

use crate::memory::core::document::{NewDocument, SearchResult, VectorDocument};
use crate::memory::core::errors::MemoryResult;
use crate::memory::core::ids::DocumentId;

/// Boxed future type for vector store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Score reported for every lexical hit. Full-text relevance is not on the
/// cosine scale, so it is not normalized against it.
pub const LEXICAL_SCORE: f32 = 1.0;

/// Durable document storage with vector and full-text search.
pub trait VectorStore: Send + Sync {
    /// Persist one document and return its new id.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the document.
    fn add(&self, doc: NewDocument) -> StoreFuture<'_, MemoryResult<DocumentId>>;

    /// Persist several documents atomically: afterwards either all are visible
    /// or none are. Ids are returned in input order.
    ///
    /// # Errors
    /// Returns an error if the batch cannot be committed.
    fn add_batch(&self, docs: Vec<NewDocument>) -> StoreFuture<'_, MemoryResult<Vec<DocumentId>>>;

    /// Replace a document's embedding and bump `updated_at`.
    /// Returns `false` if no such document exists.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn update_embedding(
        &self,
        id: DocumentId,
        embedding: Vec<f32>,
    ) -> StoreFuture<'_, MemoryResult<bool>>;

    /// Fetch one document.
    ///
    /// # Errors
    /// Returns `CorruptRow` if the stored row cannot be decoded.
    fn get(&self, id: DocumentId) -> StoreFuture<'_, MemoryResult<Option<VectorDocument>>>;

    /// Exact cosine scan over every embedded document. Results score at least
    /// `threshold`, are sorted by descending score and number at most `limit`.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` if a stored vector differs in length from
    /// `query`.
    fn search(
        &self,
        query: Vec<f32>,
        limit: usize,
        threshold: f32,
    ) -> StoreFuture<'_, MemoryResult<Vec<SearchResult>>>;

    /// Full-text search in index relevance order. Every hit scores
    /// [`LEXICAL_SCORE`].
    ///
    /// # Errors
    /// Returns an error if the query cannot be executed.
    fn text_search(
        &self,
        query: &str,
        limit: usize,
    ) -> StoreFuture<'_, MemoryResult<Vec<SearchResult>>>;

    /// Delete one document. Returns `false` if it did not exist.
    ///
    /// # Errors
    /// Returns an error if deletion fails.
    fn delete(&self, id: DocumentId) -> StoreFuture<'_, MemoryResult<bool>>;

    /// Delete every document carrying `source`. Returns how many were removed.
    ///
    /// # Errors
    /// Returns an error if deletion fails.
    fn delete_by_source(&self, source: &str) -> StoreFuture<'_, MemoryResult<usize>>;

    /// Total number of stored documents.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn count(&self) -> StoreFuture<'_, MemoryResult<usize>>;

    /// Release the storage handle and clear the cache. Safe to call twice.
    ///
    /// # Errors
    /// Returns an error if the handle cannot be shut down cleanly.
    fn close(&self) -> StoreFuture<'_, MemoryResult<()>>;
}
