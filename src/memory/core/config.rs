//! Configuration for the memory subsystem.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::memory::core::errors::{MemoryError, MemoryResult};

/// Environment variable overriding the database path.
pub const ENV_DB_PATH: &str = "SEMANTIC_MEMORY_DB";
/// Environment variable overriding the embedding provider.
pub const ENV_PROVIDER: &str = "SEMANTIC_MEMORY_PROVIDER";
/// Environment variable overriding the embedding model.
pub const ENV_MODEL: &str = "SEMANTIC_MEMORY_MODEL";
/// Environment variable overriding the provider base URL.
pub const ENV_BASE_URL: &str = "SEMANTIC_MEMORY_BASE_URL";

/// Top-level configuration for the memory engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Chunking settings used when indexing files.
    pub chunking: ChunkingConfig,
    /// Default search options.
    pub search: SearchConfig,
}

impl MemoryConfig {
    /// Build a configuration from defaults overlaid with environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Ok(provider) = std::env::var(ENV_PROVIDER) {
            config.embedding.provider = provider;
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            config.embedding.model = Some(model);
        }
        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            config.embedding.base_url = Some(base_url);
        }
        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.chunking.chunk_size == 0 {
            return Err(MemoryError::InvalidConfig(
                "chunking.chunk_size must be > 0".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(MemoryError::InvalidConfig(
                "chunking.chunk_overlap must be < chunking.chunk_size".to_string(),
            ));
        }

        if self.storage.cache_capacity == 0 {
            return Err(MemoryError::InvalidConfig(
                "storage.cache_capacity must be > 0".to_string(),
            ));
        }

        if !is_sql_identifier(&self.storage.table) {
            return Err(MemoryError::InvalidConfig(format!(
                "storage.table {:?} is not a valid table name",
                self.storage.table
            )));
        }

        if self.search.limit == 0 {
            return Err(MemoryError::InvalidConfig(
                "search.limit must be > 0".to_string(),
            ));
        }

        if !(-1.0..=1.0).contains(&self.search.threshold) {
            return Err(MemoryError::InvalidConfig(
                "search.threshold must be within [-1, 1]".to_string(),
            ));
        }

        if self.embedding.dimensions == Some(0) {
            return Err(MemoryError::InvalidConfig(
                "embedding.dimensions must be > 0".to_string(),
            ));
        }

        if let Some(base_url) = &self.embedding.base_url {
            Url::parse(base_url)?;
        }

        Ok(())
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub(crate) fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database path (`:memory:` for a throwaway database).
    pub sqlite_path: PathBuf,
    /// Document table name; the full-text index is `{table}_fts`.
    pub table: String,
    /// Maximum number of decoded embeddings kept in memory.
    pub cache_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("memory.sqlite"),
            table: "documents".to_string(),
            cache_capacity: 10_000,
        }
    }
}

/// Embedding provider settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: `openai`, `google`, `gemini`, `voyage`, `local` or `default`.
    pub provider: String,
    /// Model override; each provider has its own default.
    pub model: Option<String>,
    /// Dimensionality override; each provider has its own default.
    pub dimensions: Option<usize>,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Explicit API key; takes precedence over the provider's environment variable.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "default".to_string(),
            model: None,
            dimensions: None,
            base_url: None,
            api_key: None,
        }
    }
}

/// Chunking settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters carried over from the previous chunk.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Default search options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results.
    pub limit: usize,
    /// Minimum cosine similarity kept from vector search.
    pub threshold: f32,
    /// Whether to merge lexical matches into vector results.
    pub hybrid: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.3,
            hybrid: false,
        }
    }
}
