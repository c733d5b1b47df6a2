//! Embedding providers: one contract, several vendor backends.

pub mod factory;
pub mod google;
pub mod local;
pub mod openai;
pub mod provider;
pub mod voyage;

pub use factory::{ProviderKind, create_provider};
pub use google::GoogleProvider;
pub use local::LocalProvider;
pub use openai::OpenAiProvider;
pub use provider::{EmbedFuture, EmbeddingProvider};
pub use voyage::VoyageProvider;
