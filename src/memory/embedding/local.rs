//! Local embeddings served by Ollama, driven through Rig.

use reqwest::Client as ReqwestClient;
use rig::client::{EmbeddingsClient, Nothing};
use rig::embeddings::EmbeddingModel;
use rig::providers::ollama;

use crate::memory::core::config::EmbeddingConfig;
use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::embedding::provider::{EmbedFuture, EmbeddingProvider, ensure_count};

const PROVIDER_ID: &str = "local";
const DEFAULT_MODEL: &str = "nomic-embed-text";
const DEFAULT_DIMENSIONS: usize = 768;

type OllamaEmbeddingModel = ollama::EmbeddingModel<ReqwestClient>;

/// Ollama embedder using the Rig provider. Needs no credential.
#[derive(Clone)]
pub struct LocalProvider {
    model: OllamaEmbeddingModel,
    model_name: String,
    dimensions: usize,
}

impl LocalProvider {
    /// Create a new local embedder from config.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> MemoryResult<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let dimensions = config.dimensions.unwrap_or(DEFAULT_DIMENSIONS);

        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(MemoryError::from)?;
        let model = client.embedding_model_with_ndims(model_name.clone(), dimensions);

        Ok(Self {
            model,
            model_name,
            dimensions,
        })
    }
}

impl EmbeddingProvider for LocalProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn model(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, texts: Vec<String>) -> EmbedFuture<'_, MemoryResult<Vec<Vec<f32>>>> {
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let expected = texts.len();
            let embeddings = self
                .model
                .embed_texts(texts)
                .await
                .map_err(MemoryError::Embedding)?;

            // Rig hands back f64 components; storage is f32.
            #[allow(clippy::cast_possible_truncation)]
            let vectors = embeddings
                .into_iter()
                .map(|embedding| embedding.vec.into_iter().map(|v| v as f32).collect())
                .collect();

            ensure_count(PROVIDER_ID, expected, vectors)
        })
    }
}
