//! Google (Gemini) embeddings.
//!
//! The `embedContent` endpoint accepts a single text per request, so a batch
//! is embedded with one sequential call per input.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memory::core::config::EmbeddingConfig;
use crate::memory::core::errors::MemoryResult;
use crate::memory::embedding::provider::{
    EmbedFuture, EmbeddingProvider, check_status, resolve_credential,
};

const PROVIDER_ID: &str = "google";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "text-embedding-004";
const DEFAULT_DIMENSIONS: usize = 768;
const API_KEY_ENVS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

/// Google embedding provider.
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    request_dimensions: Option<usize>,
}

impl GoogleProvider {
    /// Create the provider from config.
    ///
    /// # Errors
    /// Returns `MissingCredential` if neither `GOOGLE_API_KEY` nor `GEMINI_API_KEY` is set.
    pub fn new(config: &EmbeddingConfig) -> MemoryResult<Self> {
        let api_key = resolve_credential(PROVIDER_ID, config.api_key.as_deref(), &API_KEY_ENVS)?;
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model,
            dimensions: config.dimensions.unwrap_or(DEFAULT_DIMENSIONS),
            request_dimensions: config.dimensions,
        })
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!("{}/v1beta/models/{model}:embedContent", self.base_url)
    }

    async fn embed_one(&self, endpoint: &str, text: &str) -> MemoryResult<Vec<f32>> {
        let request = EmbedContentRequest {
            model: format!("models/{}", self.model.trim_start_matches("models/")),
            content: Content {
                parts: [Part { text }],
            },
            output_dimensionality: self.request_dimensions,
        };
        let response = self
            .client
            .post(endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_status(PROVIDER_ID, response).await?;
        let body: EmbedContentResponse = response.json().await?;
        Ok(body.embedding.values)
    }
}

impl EmbeddingProvider for GoogleProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, texts: Vec<String>) -> EmbedFuture<'_, MemoryResult<Vec<Vec<f32>>>> {
        Box::pin(async move {
            debug!(provider = PROVIDER_ID, count = texts.len(), "embedding one text per call");
            let endpoint = self.endpoint();
            let mut vectors = Vec::with_capacity(texts.len());
            for text in &texts {
                vectors.push(self.embed_one(&endpoint, text).await?);
            }
            Ok(vectors)
        })
    }
}
