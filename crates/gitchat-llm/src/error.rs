//! LLM client error types.

use thiserror::Error;

/// Errors that can occur while talking to a chat-completion provider.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request to LLM provider failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM provider returned {status} for {endpoint}: {body}")]
    Status {
        status: reqwest::StatusCode,
        endpoint: String,
        body: String,
    },

    #[error("failed to parse LLM response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("LLM response from {endpoint} contained no choices")]
    EmptyResponse { endpoint: String },

    #[error("LLM authentication failed: {0}")]
    Auth(String),

    #[error("LLM provider rate-limited the request (retry after {retry_after:?}s)")]
    RateLimit { retry_after: Option<u64> },

    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("LLM request to {endpoint} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        #[source]
        source: Box<LlmError>,
    },
}

impl LlmError {
    /// Whether this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Request(e) => e.is_timeout() || e.is_connect(),
            LlmError::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            LlmError::RateLimit { .. } => true,
            LlmError::Decode { .. } | LlmError::Auth(_) | LlmError::InvalidConfig(_) => false,
            LlmError::EmptyResponse { .. } => false,
            LlmError::RetriesExhausted { .. } => false,
        }
    }
}

/// Convenience result alias for this crate.
pub type Result<T> = std::result::Result<T, LlmError>;
