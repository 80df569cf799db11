//! Local HTTP embedding service provider.
//!
//! Sends one text per request to a local embedding service, e.g. a
//! sentence-transformers model served behind a small HTTP wrapper.
//!
//! # Endpoint Format
//!
//! - POST `{url}/embed`
//! - Request: `{"text": "..."}`
//! - Response: `{"embedding": [...]}`

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
use crate::error::{Result, SearchError};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Configuration for the local HTTP embedding service.
#[derive(Debug, Clone)]
pub struct LocalHttpConfig {
    pub url: String,
    pub dimension: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LocalHttpConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001".to_string(),
            dimension: 384,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Local HTTP embedding provider.
pub struct LocalHttpProvider {
    client: Client,
    config: LocalHttpConfig,
}

impl LocalHttpProvider {
    pub fn new(config: LocalHttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::ProviderUnavailable(format!("HTTP client error: {e}")))?;
        Ok(Self { client, config })
    }

    fn embed_url(&self) -> String {
        format!("{}/embed", self.config.url.trim_end_matches('/'))
    }

    async fn embed_one_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let mut retry_delay = RETRY_BASE_DELAY;

        for attempt in 0..=self.config.max_retries {
            match self.send_request(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) if !e.is_retryable() || attempt == self.config.max_retries => {
                    return Err(e)
                }
                Err(_) => {
                    tokio::time::sleep(retry_delay).await;
                    retry_delay = (retry_delay * 2).min(Duration::from_secs(10));
                }
            }
        }
        unreachable!("loop always returns")
    }

    async fn send_request(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(self.embed_url())
            .json(&EmbedRequest { text })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let parsed: EmbedResponse = response.json().await?;
                if parsed.embedding.len() != self.config.dimension {
                    return Err(SearchError::DimensionMismatch {
                        expected: self.config.dimension,
                        actual: parsed.embedding.len(),
                    });
                }
                Ok(parsed.embedding)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::ProviderUnavailable(format!(
                    "request failed with status {status}: {body}"
                )))
            }
        }
    }

    async fn health_check(&self) -> Result<Duration> {
        let start = Instant::now();
        self.send_request("health check").await?;
        Ok(start.elapsed())
    }
}

#[async_trait]
impl EmbeddingProvider for LocalHttpProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        try_join_all(texts.iter().map(|t| self.embed_one_with_retry(t))).await
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        match self.health_check().await {
            Ok(latency) => Ok(ProviderStatus::healthy(
                EmbeddingProviderType::Local,
                self.config.url.clone(),
            )
            .with_latency(latency.as_millis() as u64)),
            Err(e) => Ok(ProviderStatus::unavailable(
                EmbeddingProviderType::Local,
                e.to_string(),
            )),
        }
    }

    fn embedding_dim(&self) -> usize {
        self.config.dimension
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> LocalHttpConfig {
        LocalHttpConfig {
            url: server.uri(),
            dimension: 4,
            timeout_secs: 5,
            max_retries: 1,
        }
    }

    #[tokio::test]
    async fn embed_sends_one_request_per_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"embedding": [0.1, 0.2, 0.3, 0.4]})),
            )
            .expect(3)
            .mount(&server)
            .await;

        let provider = LocalHttpProvider::new(test_config(&server)).unwrap();
        let result = provider
            .embed(vec!["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].len(), 4);
    }

    #[tokio::test]
    async fn embed_rejects_wrong_dimension() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"embedding": [0.1, 0.2]})),
            )
            .mount(&server)
            .await;

        let provider = LocalHttpProvider::new(test_config(&server)).unwrap();
        let result = provider.embed(vec!["a".into()]).await;
        assert!(matches!(result, Err(SearchError::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn embedding_dim_is_configured_dimension() {
        let server = MockServer::start().await;
        let provider = LocalHttpProvider::new(test_config(&server)).unwrap();
        assert_eq!(provider.embedding_dim(), 4);
    }
}
