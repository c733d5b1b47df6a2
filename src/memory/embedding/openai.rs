//! `OpenAI` embeddings using the `/v1/embeddings` endpoint.
//!
//! Batch responses carry an `index` per item and are not guaranteed to come
//! back in submission order, so results are re-sorted before returning.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memory::core::config::EmbeddingConfig;
use crate::memory::core::errors::MemoryResult;
use crate::memory::embedding::provider::{
    EmbedFuture, EmbeddingProvider, check_status, ensure_count, resolve_credential,
};

const PROVIDER_ID: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Known output sizes for `OpenAI` embedding models.
fn default_dimensions(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

/// Build the embeddings URL from a host, a versioned base, or a full endpoint.
fn embeddings_endpoint(base_url: &str) -> String {
    let normalized = base_url.trim_end_matches('/');
    if normalized.ends_with("/embeddings") {
        return normalized.to_string();
    }
    if has_version_suffix(normalized) {
        return format!("{normalized}/embeddings");
    }
    format!("{normalized}/v1/embeddings")
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Restore submission order from index-tagged results.
fn order_by_index(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|item| item.index);
    data.into_iter().map(|item| item.embedding).collect()
}

/// `OpenAI` embedding provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimensions: usize,
    request_dimensions: Option<usize>,
}

impl OpenAiProvider {
    /// Create the provider from config.
    ///
    /// # Errors
    /// Returns `MissingCredential` if no API key is configured.
    pub fn new(config: &EmbeddingConfig) -> MemoryResult<Self> {
        let api_key = resolve_credential(PROVIDER_ID, config.api_key.as_deref(), &[API_KEY_ENV])?;
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: embeddings_endpoint(base_url),
            dimensions: config.dimensions.unwrap_or_else(|| default_dimensions(&model)),
            request_dimensions: config.dimensions,
            model,
        })
    }
}

impl EmbeddingProvider for OpenAiProvider {
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
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            debug!(provider = PROVIDER_ID, count = texts.len(), "embedding batch");
            let request = EmbeddingRequest {
                model: &self.model,
                input: &texts,
                dimensions: self.request_dimensions,
            };
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await?;
            let response = check_status(PROVIDER_ID, response).await?;
            let body: EmbeddingResponse = response.json().await?;

            ensure_count(PROVIDER_ID, texts.len(), order_by_index(body.data))
        })
    }
}
