//! Builds the configured embedding provider from `gitchat_config::EmbeddingConfig`.

use std::sync::Arc;

use gitchat_config::{EmbeddingConfig, EmbeddingProviderType};

use super::local_http::{LocalHttpConfig, LocalHttpProvider};
use super::openai::{OpenAiConfig, OpenAiProvider};
use super::provider::EmbeddingProvider;
use crate::error::{Result, SearchError};

/// Construct the provider selected by `config.provider`, reading any
/// required provider-specific settings (and environment-sourced secrets)
/// from the matching sub-section.
pub fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderType::Local => {
            let settings = config.local.as_ref().ok_or_else(|| {
                SearchError::InvalidConfig(
                    "embedding.provider is 'local' but [embedding.local] is missing".to_string(),
                )
            })?;
            let provider = LocalHttpProvider::new(LocalHttpConfig {
                url: settings.url.clone(),
                dimension: settings.dimension as usize,
                timeout_secs: settings.timeout_secs,
                max_retries: settings.max_retries,
            })?;
            Ok(Arc::new(provider))
        }
        EmbeddingProviderType::Openai => {
            let settings = config.openai.as_ref().ok_or_else(|| {
                SearchError::InvalidConfig(
                    "embedding.provider is 'openai' but [embedding.openai] is missing".to_string(),
                )
            })?;
            let api_key = std::env::var(&settings.api_key_env).ok();
            let provider = OpenAiProvider::new(OpenAiConfig {
                base_url: settings.url.clone(),
                api_key,
                model: settings.model.clone(),
                timeout_secs: settings.timeout_secs,
                max_retries: settings.max_retries,
            })?;
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitchat_config::{LocalEmbeddingSettings, OpenAIEmbeddingSettings};

    #[test]
    fn local_without_section_is_invalid_config() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Local,
            local: None,
            openai: None,
        };
        let result = build_provider(&config);
        assert!(matches!(result, Err(SearchError::InvalidConfig(_))));
    }

    #[test]
    fn local_with_section_builds() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Local,
            local: Some(LocalEmbeddingSettings {
                url: "http://localhost:8001".to_string(),
                dimension: 384,
                timeout_secs: 30,
                max_retries: 3,
            }),
            openai: None,
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.embedding_dim(), 384);
        assert_eq!(provider.provider_type(), EmbeddingProviderType::Local);
    }

    #[test]
    fn openai_without_section_is_invalid_config() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            local: None,
            openai: None,
        };
        let result = build_provider(&config);
        assert!(matches!(result, Err(SearchError::InvalidConfig(_))));
    }

    #[test]
    fn openai_with_section_builds() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            local: None,
            openai: Some(OpenAIEmbeddingSettings {
                url: "https://api.openai.com/v1".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                model: "text-embedding-3-small".to_string(),
                dimension: 1536,
                timeout_secs: 30,
                max_retries: 3,
            }),
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.embedding_dim(), 1536);
        assert_eq!(provider.provider_type(), EmbeddingProviderType::Openai);
    }
}
