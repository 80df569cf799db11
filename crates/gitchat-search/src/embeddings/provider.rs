//! Embedding provider trait and types
//!
//! Defines the core abstraction for embedding generation with two provider
//! implementations selected at startup by `EMBEDDING_PROVIDER`:
//! - `OpenAiProvider` - OpenAI-compatible embeddings API (batched, 1536-dim by default)
//! - `LocalHttpProvider` - a local HTTP embedding service (one text per request)

use async_trait::async_trait;

use crate::error::Result;

/// Re-exported so the provider trait and its callers share one definition
/// with the config layer that selects a provider at startup.
pub use gitchat_config::EmbeddingProviderType;

/// Status of an embedding provider
///
/// Contains health and capability information for diagnostics.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// Whether the provider is available and responding
    pub available: bool,
    /// Type of provider
    pub provider_type: EmbeddingProviderType,
    /// Endpoint being used, for diagnostics
    pub endpoint: String,
    /// Last health check latency in milliseconds
    pub latency_ms: Option<u64>,
    /// Error message if provider is unavailable
    pub error: Option<String>,
}

impl ProviderStatus {
    /// Create a status for a healthy provider
    pub fn healthy(provider_type: EmbeddingProviderType, endpoint: impl Into<String>) -> Self {
        Self {
            available: true,
            provider_type,
            endpoint: endpoint.into(),
            latency_ms: None,
            error: None,
        }
    }

    /// Create a status for an unavailable provider
    pub fn unavailable(provider_type: EmbeddingProviderType, error: impl Into<String>) -> Self {
        Self {
            available: false,
            provider_type,
            endpoint: "N/A".into(),
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    /// Set latency from a health check
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Embedding provider trait
///
/// Core abstraction for turning chunk text into vectors. Implementations
/// are `Send + Sync` for use across the concurrent indexing pipeline.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Check provider connectivity and status.
    async fn check_status(&self) -> Result<ProviderStatus>;

    /// Dimensionality of generated embeddings.
    fn embedding_dim(&self) -> usize;

    /// The provider type identifier.
    fn provider_type(&self) -> EmbeddingProviderType;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_display() {
        assert_eq!(EmbeddingProviderType::Local.to_string(), "local");
        assert_eq!(EmbeddingProviderType::Openai.to_string(), "openai");
    }

    #[test]
    fn test_provider_type_default() {
        assert_eq!(
            EmbeddingProviderType::default(),
            EmbeddingProviderType::Local
        );
    }

    #[test]
    fn test_provider_status_healthy() {
        let status = ProviderStatus::healthy(EmbeddingProviderType::Local, "http://localhost:8001");
        assert!(status.available);
        assert_eq!(status.endpoint, "http://localhost:8001");
        assert!(status.error.is_none());
    }

    #[test]
    fn test_provider_status_unavailable() {
        let status =
            ProviderStatus::unavailable(EmbeddingProviderType::Openai, "Connection timeout");
        assert!(!status.available);
        assert_eq!(status.error, Some("Connection timeout".to_string()));
    }

    #[test]
    fn test_provider_status_with_latency() {
        let status =
            ProviderStatus::healthy(EmbeddingProviderType::Openai, "remote").with_latency(150);
        assert_eq!(status.latency_ms, Some(150));
    }
}
