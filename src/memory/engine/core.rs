//! Memory search orchestration.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::memory::core::config::MemoryConfig;
use crate::memory::core::document::{NewDocument, SearchResult};
use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::core::ids::DocumentId;
use crate::memory::embedding::factory::create_provider;
use crate::memory::embedding::provider::EmbeddingProvider;
use crate::memory::ingest::chunker::Chunker;
use crate::memory::ingest::discovery::{discover_files, expand_home};
use crate::memory::retrieval::hybrid_search::{merge_hybrid, retain_sources};
use crate::memory::storage::sqlite_store::SqliteVectorStore;
use crate::memory::storage::vector_store::VectorStore;

/// Source label used by [`MemorySearch::add_memory`] when none is given.
pub const DEFAULT_MEMORY_SOURCE: &str = "user";

/// Backend dependencies for the memory engine.
pub struct MemoryBackends {
    /// Vector store implementation.
    pub store: Arc<dyn VectorStore>,
    /// Embedding provider implementation.
    pub provider: Arc<dyn EmbeddingProvider>,
}

impl MemoryBackends {
    /// Build the configured provider and a `SQLite` store.
    ///
    /// The provider is built first so a missing credential fails before any
    /// file is created.
    ///
    /// # Errors
    /// Returns an error if the provider or the store cannot be initialized.
    pub async fn sqlite(config: &MemoryConfig) -> MemoryResult<Self> {
        let provider = create_provider(&config.embedding)?;
        let store = Arc::new(SqliteVectorStore::new(&config.storage).await?);
        Ok(Self { store, provider })
    }
}

/// Per-call indexing overrides.
#[derive(Clone, Debug, Default)]
pub struct IndexOptions {
    /// Label applied to every chunk instead of each file's path.
    pub source: Option<String>,
    /// Chunk size override, in characters.
    pub chunk_size: Option<usize>,
    /// Chunk overlap override, in characters.
    pub chunk_overlap: Option<usize>,
}

/// Per-call search overrides. Unset fields fall back to [`MemoryConfig::search`].
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Minimum cosine similarity for vector hits.
    pub threshold: Option<f32>,
    /// Only return documents whose source is listed.
    pub sources: Option<Vec<String>>,
    /// Merge full-text hits into the vector results.
    pub hybrid: Option<bool>,
}

/// Engine statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Stored document count.
    pub count: usize,
    /// Active provider id.
    pub provider: String,
    /// Active provider dimensionality.
    pub dimensions: usize,
}

/// Semantic memory engine: chunking, embedding, storage and hybrid search.
pub struct MemorySearch {
    config: MemoryConfig,
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
}

impl MemorySearch {
    /// Create an engine over explicit backends.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: MemoryConfig, backends: MemoryBackends) -> MemoryResult<Self> {
        config.validate()?;
        let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;

        Ok(Self {
            config,
            store: backends.store,
            provider: backends.provider,
            chunker,
        })
    }

    /// Create an engine using the configured provider and a `SQLite` store.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or a backend cannot be
    /// initialized.
    pub async fn from_config(config: MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;
        let backends = MemoryBackends::sqlite(&config).await?;
        Self::new(config, backends)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Index a file or a directory tree. Returns the number of chunks stored.
    ///
    /// Inside a directory, a file that cannot be read as UTF-8 text or whose
    /// chunks the provider rejects is logged and skipped. Failures that affect
    /// every file (a closed or broken store, a missing credential) abort the walk.
    ///
    /// # Errors
    /// Returns an error if `path` does not exist, a directly named file cannot
    /// be read or embedded, or the store fails.
    pub async fn index_path(&self, path: &str, options: IndexOptions) -> MemoryResult<usize> {
        let IndexOptions {
            source,
            chunk_size,
            chunk_overlap,
        } = options;
        let resolved = resolve_path(path)?;
        let chunker = self.chunker_for(chunk_size, chunk_overlap)?;
        let source = source.as_deref();

        if !tokio::fs::metadata(&resolved).await?.is_dir() {
            let text = tokio::fs::read_to_string(&resolved).await?;
            return self.index_text(&text, &resolved, &chunker, source).await;
        }

        let root = resolved.clone();
        let files = tokio::task::spawn_blocking(move || discover_files(&root))
            .await
            .map_err(std::io::Error::other)?;

        let mut total = 0;
        let mut indexed_files = 0;
        let mut failed_files = 0;
        for file in &files {
            let text = match tokio::fs::read_to_string(file).await {
                Ok(text) => text,
                Err(err) => {
                    warn!(path = %file.display(), error = %err, "skipping unreadable file");
                    failed_files += 1;
                    continue;
                }
            };
            match self.index_text(&text, file, &chunker, source).await {
                Ok(0) => {}
                Ok(chunks) => {
                    indexed_files += 1;
                    total += chunks;
                }
                Err(err) if aborts_walk(&err) => return Err(err),
                Err(err) => {
                    warn!(
                        path = %file.display(),
                        error = %err,
                        "skipping file that failed to index"
                    );
                    failed_files += 1;
                }
            }
        }

        info!(
            path = %resolved.display(),
            discovered = files.len(),
            indexed_files,
            failed_files,
            chunks = total,
            "directory indexed"
        );
        Ok(total)
    }

    /// Store one piece of text as a single document, without chunking.
    ///
    /// # Errors
    /// Returns an error if embedding or storage fails.
    pub async fn add_memory(&self, content: &str, source: Option<&str>) -> MemoryResult<DocumentId> {
        let embedding = self.provider.embed_single(content).await?;
        let source = source.unwrap_or(DEFAULT_MEMORY_SOURCE);
        let doc = NewDocument::new(content, source)
            .with_embedding(embedding)
            .with_metadata("type", json!("memory"));

        let id = self.store.add(doc).await?;
        debug!(%id, source, "memory added");
        Ok(id)
    }

    /// Search stored documents by meaning, optionally merged with full-text hits.
    ///
    /// # Errors
    /// Returns an error if embedding the query or querying the store fails.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> MemoryResult<Vec<SearchResult>> {
        let SearchOptions {
            limit,
            threshold,
            sources,
            hybrid,
        } = options;
        let limit = limit.unwrap_or(self.config.search.limit);
        let threshold = threshold.unwrap_or(self.config.search.threshold);
        let hybrid = hybrid.unwrap_or(self.config.search.hybrid);

        let query_vector = self.provider.embed_single(query).await?;
        let mut results = self.store.search(query_vector, limit, threshold).await?;
        if let Some(allowed) = &sources {
            retain_sources(&mut results, allowed);
        }

        if !hybrid {
            debug!(hits = results.len(), "vector search finished");
            return Ok(results);
        }

        let mut lexical = self.store.text_search(query, limit).await?;
        if let Some(allowed) = &sources {
            retain_sources(&mut lexical, allowed);
        }

        let vector_hits = results.len();
        let lexical_hits = lexical.len();
        let merged = merge_hybrid(results, lexical, limit);
        debug!(vector_hits, lexical_hits, hits = merged.len(), "hybrid search finished");
        Ok(merged)
    }

    /// Document count and active provider.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    pub async fn get_stats(&self) -> MemoryResult<MemoryStats> {
        Ok(MemoryStats {
            count: self.store.count().await?,
            provider: self.provider.id().to_string(),
            dimensions: self.provider.dimensions(),
        })
    }

    /// Delete every document carrying `source`. Returns how many were removed.
    ///
    /// # Errors
    /// Returns an error if deletion fails.
    pub async fn clear_source(&self, source: &str) -> MemoryResult<usize> {
        let removed = self.store.delete_by_source(source).await?;
        info!(source, removed, "source cleared");
        Ok(removed)
    }

    /// Release the store. Safe to call more than once.
    ///
    /// # Errors
    /// Returns an error if the store cannot be shut down cleanly.
    pub async fn close(&self) -> MemoryResult<()> {
        self.store.close().await
    }

    fn chunker_for(
        &self,
        chunk_size: Option<usize>,
        chunk_overlap: Option<usize>,
    ) -> MemoryResult<Cow<'_, Chunker>> {
        if chunk_size.is_none() && chunk_overlap.is_none() {
            return Ok(Cow::Borrowed(&self.chunker));
        }
        Ok(Cow::Owned(Chunker::new(
            chunk_size.unwrap_or(self.chunker.chunk_size()),
            chunk_overlap.unwrap_or(self.chunker.chunk_overlap()),
        )?))
    }

    /// Chunk, embed in one batch and store one file's text atomically.
    async fn index_text(
        &self,
        text: &str,
        file: &Path,
        chunker: &Chunker,
        source: Option<&str>,
    ) -> MemoryResult<usize> {
        let chunks = chunker.chunk(text);
        if chunks.is_empty() {
            debug!(path = %file.display(), "nothing to index");
            return Ok(0);
        }

        let total = chunks.len();
        let embeddings = self.provider.embed(chunks.clone()).await?;
        if embeddings.len() != total {
            return Err(MemoryError::MalformedResponse {
                provider: self.provider.id(),
                reason: format!("expected {total} embeddings, got {}", embeddings.len()),
            });
        }

        let file_path = file.display().to_string();
        let source = source.map_or_else(|| file_path.clone(), str::to_string);
        let docs: Vec<NewDocument> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (content, embedding))| {
                NewDocument::new(content, source.clone())
                    .with_embedding(embedding)
                    .with_metadata("filePath", json!(file_path))
                    .with_metadata("chunkIndex", json!(index))
                    .with_metadata("totalChunks", json!(total))
            })
            .collect();

        self.store.add_batch(docs).await?;
        info!(path = %file_path, source = %source, chunks = total, "file indexed");
        Ok(total)
    }
}

/// Errors that would repeat for every remaining file of a directory walk.
const fn aborts_walk(err: &MemoryError) -> bool {
    matches!(
        err,
        MemoryError::Closed
            | MemoryError::MissingCredential { .. }
            | MemoryError::Sqlite(_)
            | MemoryError::TokioSqlite(_)
    )
}

/// Resolve a user-supplied path the way [`MemorySearch::index_path`] does.
///
/// # Errors
/// Returns an error if the current directory cannot be determined.
pub fn resolve_path(path: &str) -> MemoryResult<PathBuf> {
    Ok(std::path::absolute(expand_home(path))?)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::memory::core::config::StorageConfig;
    use crate::memory::core::document::VectorDocument;
    use crate::memory::embedding::provider::EmbedFuture;
    use crate::memory::retrieval::hybrid_search::LEXICAL_WEIGHT;
    use crate::memory::storage::vector_store::StoreFuture;

    const VOCABULARY: &[&str] = &["rust", "python", "memory", "ocean", "cat", "dog"];

    /// Deterministic provider: one dimension per vocabulary word, valued by
    /// how often the word occurs.
    #[derive(Default)]
    struct KeywordProvider {
        calls: AtomicUsize,
    }

    impl KeywordProvider {
        fn vectorize(text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            VOCABULARY
                .iter()
                .map(|word| {
                    let hits = lower
                        .split(|c: char| !c.is_alphanumeric())
                        .filter(|token| token == word)
                        .count();
                    f32::from(u16::try_from(hits).unwrap())
                })
                .collect()
        }
    }

    impl EmbeddingProvider for KeywordProvider {
        fn id(&self) -> &'static str {
            "keyword"
        }

        fn model(&self) -> &str {
            "bag-of-words"
        }

        fn dimensions(&self) -> usize {
            VOCABULARY.len()
        }

        fn embed(&self, texts: Vec<String>) -> EmbedFuture<'_, MemoryResult<Vec<Vec<f32>>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(texts.iter().map(|t| Self::vectorize(t)).collect()) })
        }
    }

    struct FailingProvider;

    impl EmbeddingProvider for FailingProvider {
        fn id(&self) -> &'static str {
            "failing"
        }

        fn model(&self) -> &str {
            "none"
        }

        fn dimensions(&self) -> usize {
            VOCABULARY.len()
        }

        fn embed(&self, _texts: Vec<String>) -> EmbedFuture<'_, MemoryResult<Vec<Vec<f32>>>> {
            Box::pin(async {
                Err(MemoryError::Provider {
                    provider: "failing",
                    status: 500,
                    body: "boom".to_string(),
                })
            })
        }
    }

    /// Rejects any batch containing `marker` the way a vendor rejects an
    /// over-long input; embeds everything else like [`KeywordProvider`].
    struct RejectingProvider {
        marker: &'static str,
    }

    impl EmbeddingProvider for RejectingProvider {
        fn id(&self) -> &'static str {
            "rejecting"
        }

        fn model(&self) -> &str {
            "bag-of-words"
        }

        fn dimensions(&self) -> usize {
            VOCABULARY.len()
        }

        fn embed(&self, texts: Vec<String>) -> EmbedFuture<'_, MemoryResult<Vec<Vec<f32>>>> {
            Box::pin(async move {
                if texts.iter().any(|text| text.contains(self.marker)) {
                    return Err(MemoryError::Provider {
                        provider: "rejecting",
                        status: 400,
                        body: "input exceeds the token limit".to_string(),
                    });
                }
                Ok(texts.iter().map(|t| KeywordProvider::vectorize(t)).collect())
            })
        }
    }

    async fn engine_with(provider: Arc<dyn EmbeddingProvider>) -> MemorySearch {
        let config = MemoryConfig {
            storage: StorageConfig {
                sqlite_path: ":memory:".into(),
                ..StorageConfig::default()
            },
            ..MemoryConfig::default()
        };
        let store = Arc::new(SqliteVectorStore::new(&config.storage).await.unwrap());
        MemorySearch::new(config, MemoryBackends { store, provider }).unwrap()
    }

    async fn engine() -> (MemorySearch, Arc<KeywordProvider>) {
        let provider = Arc::new(KeywordProvider::default());
        (engine_with(provider.clone()).await, provider)
    }

    #[tokio::test]
    async fn test_index_directory_skips_hidden_and_unsupported() {
        let (engine, provider) = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("node_modules")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("rust.md"), "rust memory").unwrap();
        fs::write(root.join("pets.txt"), "cat\n\ndog").unwrap();
        fs::write(root.join("empty.md"), "   \n").unwrap();
        fs::write(root.join("photo.png"), "cat").unwrap();
        fs::write(root.join("node_modules/lib.js"), "rust").unwrap();
        fs::write(root.join(".cache/notes.md"), "rust").unwrap();

        let indexed = engine
            .index_path(root.to_str().unwrap(), IndexOptions::default())
            .await
            .unwrap();

        assert_eq!(indexed, 2);
        assert_eq!(engine.get_stats().await.unwrap().count, 2);
        // One batch per non-empty file, none for the empty one.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_index_file_records_chunk_metadata() {
        let (engine, _) = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.md");
        let paragraphs = [
            format!("rust {}", "a".repeat(895)),
            format!("ocean {}", "b".repeat(894)),
            format!("cat {}", "c".repeat(896)),
        ];
        fs::write(&file, paragraphs.join("\n\n")).unwrap();

        let indexed = engine
            .index_path(file.to_str().unwrap(), IndexOptions::default())
            .await
            .unwrap();
        assert_eq!(indexed, 3);

        let hits = engine
            .search(
                "ocean",
                SearchOptions {
                    threshold: Some(0.1),
                    ..SearchOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        let metadata = hits[0].metadata.as_ref().unwrap();
        assert_eq!(metadata["chunkIndex"], json!(1));
        assert_eq!(metadata["totalChunks"], json!(3));
        assert_eq!(metadata["filePath"], json!(file.display().to_string()));
        assert_eq!(hits[0].source.as_deref(), Some(file.display().to_string().as_str()));
        assert!(hits[0].content.ends_with(&paragraphs[1]));
        assert!(hits[0].content.starts_with(&"a".repeat(200)));
    }

    #[tokio::test]
    async fn test_direct_file_ignores_extension_allow_list() {
        let (engine, _) = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Makefile");
        fs::write(&file, "rust python").unwrap();

        let options = IndexOptions {
            source: Some("build".to_string()),
            ..IndexOptions::default()
        };
        assert_eq!(engine.index_path(file.to_str().unwrap(), options).await.unwrap(), 1);
        assert_eq!(engine.clear_source("build").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_chunk_overrides_apply() {
        let (engine, _) = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("small.txt");
        fs::write(&file, "rust one\n\nrust two\n\nrust three").unwrap();

        let options = IndexOptions {
            chunk_size: Some(10),
            chunk_overlap: Some(0),
            ..IndexOptions::default()
        };
        assert_eq!(engine.index_path(file.to_str().unwrap(), options).await.unwrap(), 3);

        let invalid = IndexOptions {
            chunk_size: Some(10),
            chunk_overlap: Some(10),
            ..IndexOptions::default()
        };
        assert!(engine.index_path(file.to_str().unwrap(), invalid).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_path_is_error() {
        let (engine, _) = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.md");
        assert!(matches!(
            engine
                .index_path(missing.to_str().unwrap(), IndexOptions::default())
                .await,
            Err(MemoryError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_file_in_directory_is_skipped() {
        let (engine, _) = engine().await;
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("binary.txt"), [0xff_u8, 0xfe, 0x00, 0xc3]).unwrap();
        fs::write(dir.path().join("fine.md"), "memory").unwrap();

        let indexed = engine
            .index_path(dir.path().to_str().unwrap(), IndexOptions::default())
            .await
            .unwrap();
        assert_eq!(indexed, 1);
    }

    #[tokio::test]
    async fn test_rejected_file_does_not_stop_directory_walk() {
        let engine = engine_with(Arc::new(RejectingProvider { marker: "toolong" })).await;
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "toolong rust").unwrap();
        fs::write(dir.path().join("b.md"), "rust memory").unwrap();
        fs::write(dir.path().join("c.md"), "cat\n\ndog").unwrap();

        let indexed = engine
            .index_path(dir.path().to_str().unwrap(), IndexOptions::default())
            .await
            .unwrap();

        assert_eq!(indexed, 2);
        assert_eq!(engine.get_stats().await.unwrap().count, 2);
        let rejected = dir.path().join("a.md").display().to_string();
        assert_eq!(engine.clear_source(&rejected).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejected_direct_file_is_error() {
        let engine = engine_with(Arc::new(RejectingProvider { marker: "toolong" })).await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        fs::write(&file, "toolong rust").unwrap();

        assert!(matches!(
            engine
                .index_path(file.to_str().unwrap(), IndexOptions::default())
                .await,
            Err(MemoryError::Provider { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_store_aborts_directory_walk() {
        let (engine, provider) = engine().await;
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "rust").unwrap();
        fs::write(dir.path().join("b.md"), "python").unwrap();
        engine.close().await.unwrap();

        assert!(matches!(
            engine
                .index_path(dir.path().to_str().unwrap(), IndexOptions::default())
                .await,
            Err(MemoryError::Closed)
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let engine = engine_with(Arc::new(FailingProvider)).await;
        let err = engine.add_memory("rust", None).await.unwrap_err();
        assert!(matches!(err, MemoryError::Provider { status: 500, .. }));
        assert_eq!(engine.get_stats().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_add_memory_defaults() {
        let (engine, _) = engine().await;
        let id = engine.add_memory("my cat likes the ocean", None).await.unwrap();

        let hits = engine
            .search("cat", SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert_eq!(hits[0].source.as_deref(), Some(DEFAULT_MEMORY_SOURCE));
        assert_eq!(hits[0].metadata.as_ref().unwrap()["type"], json!("memory"));
    }

    #[tokio::test]
    async fn test_search_filters_sources() {
        let (engine, _) = engine().await;
        engine.add_memory("rust memory", Some("a")).await.unwrap();
        engine.add_memory("rust", Some("b")).await.unwrap();

        let all = engine
            .search("rust", SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let only_b = engine
            .search(
                "rust",
                SearchOptions {
                    sources: Some(vec!["b".to_string()]),
                    ..SearchOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].source.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_hybrid_adds_deweighted_lexical_hits() {
        let (engine, _) = engine().await;
        let vector_id = engine.add_memory("rust memory", Some("s")).await.unwrap();
        // Shares no vocabulary with the query vector, but matches "zebra" lexically.
        let lexical_id = engine.add_memory("zebra stripes", Some("s")).await.unwrap();

        let plain = engine
            .search("rust zebra", SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(plain.len(), 1);
        assert_eq!(plain[0].id, vector_id);

        let hybrid = engine
            .search(
                "rust zebra",
                SearchOptions {
                    hybrid: Some(true),
                    ..SearchOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hybrid.len(), 2);

        let vector_hit = hybrid.iter().find(|hit| hit.id == vector_id).unwrap();
        assert!(vector_hit.score < 1.0);
        assert!((vector_hit.score - plain[0].score).abs() < f32::EPSILON);

        let lexical_hit = hybrid.iter().find(|hit| hit.id == lexical_id).unwrap();
        assert!((lexical_hit.score - LEXICAL_WEIGHT).abs() < f32::EPSILON);
        assert!(hybrid.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_hybrid_respects_sources_and_limit() {
        let (engine, _) = engine().await;
        engine.add_memory("zebra one", Some("a")).await.unwrap();
        engine.add_memory("zebra two", Some("b")).await.unwrap();
        engine.add_memory("zebra three", Some("b")).await.unwrap();

        let hits = engine
            .search(
                "zebra",
                SearchOptions {
                    hybrid: Some(true),
                    sources: Some(vec!["a".to_string()]),
                    ..SearchOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source.as_deref(), Some("a"));

        let limited = engine
            .search(
                "zebra",
                SearchOptions {
                    hybrid: Some(true),
                    limit: Some(2),
                    ..SearchOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_stats_and_clear_source() {
        let (engine, _) = engine().await;
        engine.add_memory("rust", Some("keep")).await.unwrap();
        engine.add_memory("python", Some("drop")).await.unwrap();
        engine.add_memory("dog", Some("drop")).await.unwrap();

        let stats = engine.get_stats().await.unwrap();
        assert_eq!(
            stats,
            MemoryStats {
                count: 3,
                provider: "keyword".to_string(),
                dimensions: VOCABULARY.len(),
            }
        );

        assert_eq!(engine.clear_source("drop").await.unwrap(), 2);
        assert_eq!(engine.get_stats().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_close_twice() {
        let (engine, _) = engine().await;
        engine.close().await.unwrap();
        engine.close().await.unwrap();
        assert!(matches!(
            engine.get_stats().await,
            Err(MemoryError::Closed)
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = MemoryConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        let backends = MemoryBackends {
            store: Arc::new(NeverStore),
            provider: Arc::new(FailingProvider),
        };
        assert!(matches!(
            MemorySearch::new(config, backends),
            Err(MemoryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_resolve_path_is_absolute() {
        assert!(resolve_path("relative/file.md").unwrap().is_absolute());
    }

    /// Store that is never reached; lets config validation be tested synchronously.
    struct NeverStore;

    impl VectorStore for NeverStore {
        fn add(&self, _doc: NewDocument) -> StoreFuture<'_, MemoryResult<DocumentId>> {
            Box::pin(async { Err(MemoryError::Closed) })
        }
        fn add_batch(
            &self,
            _docs: Vec<NewDocument>,
        ) -> StoreFuture<'_, MemoryResult<Vec<DocumentId>>> {
            Box::pin(async { Err(MemoryError::Closed) })
        }
        fn update_embedding(
            &self,
            _id: DocumentId,
            _embedding: Vec<f32>,
        ) -> StoreFuture<'_, MemoryResult<bool>> {
            Box::pin(async { Err(MemoryError::Closed) })
        }
        fn get(
            &self,
            _id: DocumentId,
        ) -> StoreFuture<'_, MemoryResult<Option<VectorDocument>>> {
            Box::pin(async { Err(MemoryError::Closed) })
        }
        fn search(
            &self,
            _query: Vec<f32>,
            _limit: usize,
            _threshold: f32,
        ) -> StoreFuture<'_, MemoryResult<Vec<SearchResult>>> {
            Box::pin(async { Err(MemoryError::Closed) })
        }
        fn text_search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> StoreFuture<'_, MemoryResult<Vec<SearchResult>>> {
            Box::pin(async { Err(MemoryError::Closed) })
        }
        fn delete(&self, _id: DocumentId) -> StoreFuture<'_, MemoryResult<bool>> {
            Box::pin(async { Err(MemoryError::Closed) })
        }
        fn delete_by_source(&self, _source: &str) -> StoreFuture<'_, MemoryResult<usize>> {
            Box::pin(async { Err(MemoryError::Closed) })
        }
        fn count(&self) -> StoreFuture<'_, MemoryResult<usize>> {
            Box::pin(async { Err(MemoryError::Closed) })
        }
        fn close(&self) -> StoreFuture<'_, MemoryResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }
}
