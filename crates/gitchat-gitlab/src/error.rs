//! GitLab client error types.

use thiserror::Error;

/// Errors that can occur while talking to the GitLab API.
#[derive(Error, Debug)]
pub enum GitlabError {
    /// The underlying HTTP request failed (connection, timeout, TLS, ...)
    #[error("request to GitLab failed: {0}")]
    Request(#[from] reqwest::Error),

    /// GitLab returned a non-success status code.
    #[error("GitLab returned {status} for {endpoint}: {body}")]
    Status {
        status: reqwest::StatusCode,
        endpoint: String,
        body: String,
    },

    /// The response body could not be parsed as the expected JSON shape.
    #[error("failed to parse GitLab response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// All retry attempts were exhausted.
    #[error("GitLab request to {endpoint} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        #[source]
        source: Box<GitlabError>,
    },
}

impl GitlabError {
    /// Whether this error is worth retrying (as opposed to a client error
    /// like 401/404 that will never succeed on replay).
    pub fn is_retryable(&self) -> bool {
        match self {
            GitlabError::Request(e) => e.is_timeout() || e.is_connect(),
            GitlabError::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            GitlabError::Decode { .. } => false,
            GitlabError::RetriesExhausted { .. } => false,
        }
    }
}

/// Convenience result alias for this crate.
pub type Result<T> = std::result::Result<T, GitlabError>;
