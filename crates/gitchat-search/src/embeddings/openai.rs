//! OpenAI-compatible embedding provider.
//!
//! # Endpoint Format
//!
//! - POST `{base_url}/embeddings`
//! - Request: `{"model": "...", "input": ["text1", "text2", ...]}`
//! - Response: `{"data": [{"embedding": [...], "index": 0}, ...], ...}`
//!
//! Requests are batched at 100 texts per call, matching the vector store's
//! own upsert batch size.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
use crate::error::{Result, SearchError};

/// Texts per embeddings request.
const BATCH_SIZE: usize = 100;

/// Base delay for exponential backoff.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Configuration for the OpenAI-compatible embeddings provider.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL for the API (e.g. "https://api.openai.com/v1").
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl OpenAiConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: Some(api_key.into()),
            model: "text-embedding-3-small".into(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

/// OpenAI-compatible remote embeddings provider.
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
    dimension: AtomicUsize,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::ProviderUnavailable(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            config,
            dimension: AtomicUsize::new(0),
        })
    }

    fn embeddings_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/embeddings")
        } else {
            format!("{base}/v1/embeddings")
        }
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut retry_delay = RETRY_BASE_DELAY;

        for attempt in 0..=self.config.max_retries {
            match self.send_request(texts.clone()).await {
                Ok(embeddings) => return Ok(embeddings),
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

    async fn send_request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = self.embeddings_url();
        let body = EmbeddingsRequest {
            model: self.config.model.clone(),
            input: texts,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(ref api_key) = self.config.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            StatusCode::OK => {
                let parsed: EmbeddingsResponse = response.json().await?;
                let mut data = parsed.data;
                data.sort_by_key(|d| d.index);
                let embeddings: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();

                if let Some(first) = embeddings.first() {
                    let dim = first.len();
                    let cached = self.dimension.load(Ordering::Relaxed);
                    if cached == 0 {
                        self.dimension.store(dim, Ordering::Relaxed);
                    } else if cached != dim {
                        return Err(SearchError::DimensionMismatch {
                            expected: cached,
                            actual: dim,
                        });
                    }
                }
                Ok(embeddings)
            }
            StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::Auth(body))
            }
            StatusCode::NOT_FOUND => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::InvalidModel(body))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                Err(SearchError::RateLimit { retry_after })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::ProviderUnavailable(format!(
                    "request failed with status {status}: {body}"
                )))
            }
        }
    }

    async fn health_check(&self) -> Result<Duration> {
        let start = Instant::now();
        let result = self.send_request(vec!["health check".to_string()]).await;
        result.map(|_| start.elapsed())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            embeddings.extend(self.embed_batch(batch.to_vec()).await?);
        }
        Ok(embeddings)
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        match self.health_check().await {
            Ok(latency) => Ok(ProviderStatus::healthy(
                EmbeddingProviderType::Openai,
                self.config.base_url.clone(),
            )
            .with_latency(latency.as_millis() as u64)),
            Err(e) => Ok(ProviderStatus::unavailable(
                EmbeddingProviderType::Openai,
                e.to_string(),
            )),
        }
    }

    fn embedding_dim(&self) -> usize {
        let dim = self.dimension.load(Ordering::Relaxed);
        if dim > 0 {
            dim
        } else {
            match self.config.model.as_str() {
                "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
                "text-embedding-3-large" => 3072,
                _ => 1536,
            }
        }
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Openai
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_response(dim: usize, count: usize) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..count)
            .map(|i| serde_json::json!({"object": "embedding", "embedding": vec![0.1_f32; dim], "index": i}))
            .collect();
        serde_json::json!({"object": "list", "data": data, "model": "test-model"})
    }

    fn test_config(server: &MockServer) -> OpenAiConfig {
        OpenAiConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            timeout_secs: 5,
            max_retries: 1,
        }
    }

    #[tokio::test]
    async fn embed_sends_bearer_auth_and_parses_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_json(&EmbeddingsRequest {
                model: "test-model".into(),
                input: vec!["hello world".into()],
            }))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(1536, 1)))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(test_config(&server)).unwrap();
        let result = provider.embed(vec!["hello world".into()]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].len(), 1536);
        assert_eq!(provider.embedding_dim(), 1536);
    }

    #[tokio::test]
    async fn embed_empty_input_short_circuits() {
        let server = MockServer::start().await;
        let provider = OpenAiProvider::new(test_config(&server)).unwrap();
        let result = provider.embed(vec![]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn embed_splits_into_batches_of_100() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(8, 100)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(8, 50)))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(test_config(&server)).unwrap();
        let texts: Vec<String> = (0..150).map(|i| format!("text {i}")).collect();
        let result = provider.embed(texts).await.unwrap();
        assert_eq!(result.len(), 150);
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(test_config(&server)).unwrap();
        let result = provider.embed(vec!["test".into()]).await;
        assert!(matches!(result, Err(SearchError::Auth(_))));
    }

    #[tokio::test]
    async fn rate_limit_reports_retry_after() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "60")
                    .set_body_string("rate limited"),
            )
            .mount(&server)
            .await;

        let mut config = test_config(&server);
        config.max_retries = 0;
        let provider = OpenAiProvider::new(config).unwrap();
        let result = provider.embed(vec!["test".into()]).await;
        match result {
            Err(SearchError::RateLimit { retry_after }) => assert_eq!(retry_after, Some(60)),
            other => panic!("expected RateLimit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn check_status_reports_unavailable_on_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = test_config(&server);
        config.max_retries = 0;
        let provider = OpenAiProvider::new(config).unwrap();
        let status = provider.check_status().await.unwrap();
        assert!(!status.available);
    }
}
