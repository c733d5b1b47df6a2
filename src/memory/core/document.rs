//! Document and search result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::core::ids::DocumentId;

/// Open key/value metadata attached to a document.
///
/// The store never interprets it; callers do.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A stored unit of indexed content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    /// Unique, immutable document id.
    pub id: DocumentId,
    /// The text that was embedded (usually a chunk of a file).
    pub content: String,
    /// Embedding vector, absent until one has been computed.
    pub embedding: Option<Vec<f32>>,
    /// Caller-defined metadata.
    pub metadata: Metadata,
    /// Grouping label used for filtering and bulk deletion.
    pub source: String,
    /// Insert time.
    pub created_at: DateTime<Utc>,
    /// Last time the embedding was replaced.
    pub updated_at: DateTime<Utc>,
}

/// A document before the store assigns its id and timestamps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    /// Text content.
    pub content: String,
    /// Optional embedding vector.
    pub embedding: Option<Vec<f32>>,
    /// Caller-defined metadata.
    pub metadata: Metadata,
    /// Grouping label.
    pub source: String,
}

impl NewDocument {
    /// Create a document with content and source and no embedding.
    #[must_use]
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embedding: None,
            metadata: Metadata::new(),
            source: source.into(),
        }
    }

    /// Attach an embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Add one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// One ranked hit returned by a search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching document id.
    pub id: DocumentId,
    /// Matching content.
    pub content: String,
    /// Cosine similarity for vector hits, a fixed sentinel for lexical hits.
    pub score: f32,
    /// Document metadata.
    pub metadata: Option<Metadata>,
    /// Document source label.
    pub source: Option<String>,
}
