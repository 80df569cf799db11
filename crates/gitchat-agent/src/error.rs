//! Agent error types.

use thiserror::Error;

/// Errors that can occur while running the code analysis agent.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("chat provider error: {0}")]
    Llm(#[from] gitchat_llm::LlmError),

    #[error("repository has not been cloned: {0}")]
    RepoNotCloned(std::path::PathBuf),
}

/// Convenience result alias for this crate.
pub type Result<T> = std::result::Result<T, AgentError>;
