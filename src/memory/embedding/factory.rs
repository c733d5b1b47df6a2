//! Provider selection from configuration.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::memory::core::config::EmbeddingConfig;
use crate::memory::core::errors::MemoryResult;
use crate::memory::embedding::google::GoogleProvider;
use crate::memory::embedding::local::LocalProvider;
use crate::memory::embedding::openai::OpenAiProvider;
use crate::memory::embedding::provider::EmbeddingProvider;
use crate::memory::embedding::voyage::VoyageProvider;

/// Concrete embedding backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// `OpenAI` batch endpoint with index-tagged results.
    #[default]
    OpenAi,
    /// Google single-text endpoint.
    Google,
    /// Voyage order-preserving batch endpoint.
    Voyage,
    /// Local Ollama runtime.
    Local,
}

impl ProviderKind {
    /// Resolve a configured provider name.
    ///
    /// `gemini` is an alias for `google`; `default` and unrecognized names
    /// resolve to `OpenAI`.
    #[must_use]
    pub fn resolve(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" | "default" => Self::OpenAi,
            "google" | "gemini" => Self::Google,
            "voyage" => Self::Voyage,
            "local" => Self::Local,
            other => {
                warn!(provider = other, "unknown embedding provider, falling back to openai");
                Self::OpenAi
            }
        }
    }

    /// Provider identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::Voyage => "voyage",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instantiate the provider named by `config.provider`.
///
/// # Errors
/// Returns `MissingCredential` when the chosen provider needs an API key that
/// is not configured, or an error if its client cannot be built.
pub fn create_provider(config: &EmbeddingConfig) -> MemoryResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match ProviderKind::resolve(&config.provider) {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config)?),
        ProviderKind::Google => Arc::new(GoogleProvider::new(config)?),
        ProviderKind::Voyage => Arc::new(VoyageProvider::new(config)?),
        ProviderKind::Local => Arc::new(LocalProvider::new(config)?),
    };
    Ok(provider)
}
