//! Error types for the memory subsystem.

use thiserror::Error;

/// Memory subsystem error type.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A provider was constructed without its credential.
    #[error("missing credential for provider {provider}: set {env_var} or embedding.api_key")]
    MissingCredential {
        /// Provider identifier.
        provider: &'static str,
        /// Environment variable the credential is read from.
        env_var: &'static str,
    },
    /// The embedding vendor answered with a non-success status.
    #[error("provider {provider} returned status {status}: {body}")]
    Provider {
        /// Provider identifier.
        provider: &'static str,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The embedding vendor answered with an unusable payload.
    #[error("provider {provider} returned a malformed response: {reason}")]
    MalformedResponse {
        /// Provider identifier.
        provider: &'static str,
        /// What was wrong with the payload.
        reason: String,
    },
    /// Two vectors of different lengths were compared.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length of the query vector.
        expected: usize,
        /// Length of the stored vector.
        actual: usize,
    },
    /// A stored row could not be decoded.
    #[error("corrupt document {id}: {reason}")]
    CorruptRow {
        /// Document id of the affected row.
        id: String,
        /// Decoding failure.
        reason: String,
    },
    /// The store was used after `close()`.
    #[error("vector store is closed")]
    Closed,
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Embedding error from the local model runtime.
    #[error("embedding error: {0}")]
    Embedding(#[from] rig::embeddings::EmbeddingError),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
