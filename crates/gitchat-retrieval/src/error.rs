//! Retrieval error types.

use thiserror::Error;

/// Errors that can occur while planning or executing a retrieval.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error(transparent)]
    Llm(#[from] gitchat_llm::LlmError),

    #[error(transparent)]
    Search(#[from] gitchat_search::SearchError),

    #[error(transparent)]
    Gitlab(#[from] gitchat_gitlab::GitlabError),
}

/// Convenience result alias for this crate.
pub type Result<T> = std::result::Result<T, RetrievalError>;
