//! Builds the configured chat provider from `gitchat_config::LlmConfig`.

use std::sync::Arc;

use gitchat_config::{LlmConfig, LlmProviderType};

use crate::error::Result;
use crate::openai::{OpenAiChatClient, OpenAiChatConfig};
use crate::provider::ChatProvider;

/// Construct the provider selected by `config.provider`, reading the API
/// key from the configured environment variable.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn ChatProvider>> {
    match config.provider {
        LlmProviderType::Openai => {
            let settings = &config.openai;
            let api_key = std::env::var(&settings.api_key_env).ok();
            let client = OpenAiChatClient::new(OpenAiChatConfig {
                base_url: settings.base_url.clone(),
                api_key,
                model: settings.model.clone(),
                timeout_secs: settings.timeout_secs,
                max_retries: settings.max_retries,
            })?;
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_openai_client_from_default_config() {
        let config = LlmConfig::default();
        let provider = build_provider(&config);
        assert!(provider.is_ok());
    }
}
