//! Error types for gitchat-search.

use thiserror::Error;

/// Errors that can occur in gitchat-search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Qdrant error: {0}")]
    Qdrant(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding provider authentication failed: {0}")]
    Auth(String),

    #[error("embedding provider rate limited, retry after {retry_after:?} seconds")]
    RateLimit { retry_after: Option<u64> },

    #[error("embedding model not found: {0}")]
    InvalidModel(String),

    #[error("embedding request to {endpoint} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        source: Box<SearchError>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl SearchError {
    /// Whether a retry loop should attempt this request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Request(e) => e.is_timeout() || e.is_connect(),
            SearchError::ProviderUnavailable(_) | SearchError::RateLimit { .. } => true,
            SearchError::Auth(_) | SearchError::InvalidModel(_) => false,
            _ => false,
        }
    }
}

impl From<qdrant_client::QdrantError> for SearchError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        SearchError::Qdrant(err.to_string())
    }
}

/// Result type for gitchat-search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
