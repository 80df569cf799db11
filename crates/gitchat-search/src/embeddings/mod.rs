//! Embedding generation for chunk vectors.
//!
//! Two provider backends, selected at startup by `EMBEDDING_PROVIDER`:
//!
//! ```text
//! EmbeddingProvider (trait)
//!     ├── LocalHttpProvider  - HTTP client for a local /embed endpoint
//!     └── OpenAiProvider     - HTTP client for an OpenAI-compatible /v1/embeddings API
//! ```

pub mod factory;
pub mod local_http;
pub mod openai;
mod provider;

pub use factory::build_provider;
pub use local_http::{LocalHttpConfig, LocalHttpProvider};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
