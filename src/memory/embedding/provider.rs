//! Embedding provider abstraction.

use std::future::Future;
use std::pin::Pin;

use crate::memory::core::errors::{MemoryError, MemoryResult};

/// Boxed future type for embedder operations.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstraction over embedding backends.
///
/// Every variant returns exactly one vector per input text, in input order,
/// and every vector has [`EmbeddingProvider::dimensions`] components.
pub trait EmbeddingProvider: Send + Sync {
    /// Stable provider identifier (`openai`, `google`, `voyage`, `local`).
    fn id(&self) -> &'static str;

    /// Model name used for requests.
    fn model(&self) -> &str;

    /// Return embedding dimensionality.
    fn dimensions(&self) -> usize;

    /// Embed multiple texts.
    ///
    /// # Errors
    /// Returns an error if the remote call fails or answers with a malformed payload.
    fn embed(&self, texts: Vec<String>) -> EmbedFuture<'_, MemoryResult<Vec<Vec<f32>>>>;

    /// Embed a single text string.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_single(&self, text: &str) -> EmbedFuture<'_, MemoryResult<Vec<f32>>> {
        let text = text.to_string();
        Box::pin(async move {
            self.embed(vec![text])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| MemoryError::MalformedResponse {
                    provider: self.id(),
                    reason: "no embedding returned".to_string(),
                })
        })
    }
}

/// Check that a provider answered with one vector per input.
///
/// # Errors
/// Returns `MalformedResponse` when the counts differ.
pub fn ensure_count(
    provider: &'static str,
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> MemoryResult<Vec<Vec<f32>>> {
    if vectors.len() == expected {
        Ok(vectors)
    } else {
        Err(MemoryError::MalformedResponse {
            provider,
            reason: format!("expected {expected} embeddings, got {}", vectors.len()),
        })
    }
}

/// Resolve a credential from explicit config first, then the environment.
///
/// # Errors
/// Returns `MissingCredential` if neither source yields a non-empty value.
pub fn resolve_credential(
    provider: &'static str,
    explicit: Option<&str>,
    env_vars: &[&'static str],
) -> MemoryResult<String> {
    if let Some(key) = explicit.map(str::trim).filter(|key| !key.is_empty()) {
        return Ok(key.to_string());
    }

    for var in env_vars {
        if let Ok(value) = std::env::var(var) {
            let value = value.trim();
            if !value.is_empty() {
                return Ok(value.to_string());
            }
        }
    }

    Err(MemoryError::MissingCredential {
        provider,
        env_var: env_vars.first().copied().unwrap_or("API_KEY"),
    })
}

/// Turn a non-success HTTP response into a provider error carrying the raw body.
pub(crate) async fn check_status(
    provider: &'static str,
    response: reqwest::Response,
) -> MemoryResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(MemoryError::Provider {
        provider,
        status: status.as_u16(),
        body,
    })
}
