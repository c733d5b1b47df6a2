//! Voyage AI embeddings.
//!
//! The endpoint embeds a whole batch per request and returns vectors in
//! submission order. Batches are sent as `document` input and single texts
//! as `query` input.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memory::core::config::EmbeddingConfig;
use crate::memory::core::errors::{MemoryError, MemoryResult};
use crate::memory::embedding::provider::{
    EmbedFuture, EmbeddingProvider, check_status, ensure_count, resolve_credential,
};

const PROVIDER_ID: &str = "voyage";
const DEFAULT_BASE_URL: &str = "https://api.voyageai.com";
const DEFAULT_MODEL: &str = "voyage-3";
const API_KEY_ENV: &str = "VOYAGE_API_KEY";
const DOCUMENT_INPUT: &str = "document";
const QUERY_INPUT: &str = "query";

fn default_dimensions(model: &str) -> usize {
    match model {
        "voyage-3-lite" => 512,
        _ => 1024,
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Voyage embedding provider.
pub struct VoyageProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl VoyageProvider {
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
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: format!("{base_url}/v1/embeddings"),
            dimensions: config.dimensions.unwrap_or_else(|| default_dimensions(&model)),
            model,
        })
    }
}

impl VoyageProvider {
    /// Embed a batch tagged as `document` or `query` content.
    async fn embed_as(
        &self,
        texts: Vec<String>,
        input_type: &'static str,
    ) -> MemoryResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER_ID, count = texts.len(), input_type, "embedding batch");
        let request = EmbeddingRequest {
            model: &self.model,
            input: &texts,
            input_type,
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
        let vectors = body.data.into_iter().map(|item| item.embedding).collect();

        ensure_count(PROVIDER_ID, texts.len(), vectors)
    }
}

impl EmbeddingProvider for VoyageProvider {
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
        Box::pin(self.embed_as(texts, DOCUMENT_INPUT))
    }

    /// Single texts are search queries; Voyage embeds them with the query prompt.
    fn embed_single(&self, text: &str) -> EmbedFuture<'_, MemoryResult<Vec<f32>>> {
        let text = text.to_string();
        Box::pin(async move {
            self.embed_as(vec![text], QUERY_INPUT)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| MemoryError::MalformedResponse {
                    provider: PROVIDER_ID,
                    reason: "no embedding returned".to_string(),
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(base_url: String) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "voyage".to_string(),
            base_url: Some(base_url),
            api_key: Some("pa-test".to_string()),
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let app = Router::new().route(
            "/v1/embeddings",
            post(|Json(body): Json<serde_json::Value>| async move {
                let data: Vec<serde_json::Value> = body["input"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
                    .iter()
                    .map(|text| {
                        let len = text.as_str().map_or(0, str::len);
                        serde_json::json!({ "embedding": [f32::from(u16::try_from(len).unwrap())] })
                    })
                    .collect();
                Json(serde_json::json!({ "data": data }))
            }),
        );
        let base = serve(app).await;
        let provider = VoyageProvider::new(&config(base)).unwrap();

        let vectors = provider
            .embed(vec!["four".into(), "a".into()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![4.0], vec![1.0]]);
    }

    #[tokio::test]
    async fn test_short_response_is_malformed() {
        let app = Router::new().route(
            "/v1/embeddings",
            post(|| async { Json(serde_json::json!({ "data": [{ "embedding": [1.0] }] })) }),
        );
        let base = serve(app).await;
        let provider = VoyageProvider::new(&config(base)).unwrap();

        let err = provider
            .embed(vec!["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::MalformedResponse { provider: "voyage", .. }));
    }

    #[tokio::test]
    async fn test_input_type_follows_call() {
        let app = Router::new().route(
            "/v1/embeddings",
            post(|Json(body): Json<serde_json::Value>| async move {
                let marker = if body["input_type"] == "query" { 1.0 } else { 0.0 };
                let count = body["input"].as_array().map_or(0, Vec::len);
                let data: Vec<serde_json::Value> = (0..count)
                    .map(|_| serde_json::json!({ "embedding": [marker] }))
                    .collect();
                Json(serde_json::json!({ "data": data }))
            }),
        );
        let base = serve(app).await;
        let provider = VoyageProvider::new(&config(base)).unwrap();

        assert_eq!(provider.embed_single("what is rust").await.unwrap(), vec![1.0]);
        assert_eq!(
            provider.embed(vec!["rust is a language".into()]).await.unwrap(),
            vec![vec![0.0]]
        );
    }

    #[test]
    fn test_lite_model_dimensions() {
        let mut cfg = config("https://api.voyageai.com".to_string());
        cfg.model = Some("voyage-3-lite".to_string());
        assert_eq!(VoyageProvider::new(&cfg).unwrap().dimensions(), 512);
    }
}
