//! Indexer error types.

use thiserror::Error;

/// Errors that can occur while orchestrating a full index or sync run.
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("GitLab request failed: {0}")]
    Gitlab(#[from] gitchat_gitlab::GitlabError),

    #[error("vector store error: {0}")]
    Search(#[from] gitchat_search::SearchError),

    #[error("manifest store error: {0}")]
    Manifest(#[from] gitchat_manifest::ManifestError),

    #[error("chunking error: {0}")]
    Chunking(#[from] gitchat_chunking::ChunkingError),

    #[error("job queue error: {0}")]
    Queue(#[from] rusqlite::Error),

    #[error("project {0} not found in manifest")]
    ProjectNotFound(i64),

    #[error("a run is already active for project {0}")]
    AlreadyIndexing(i64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for this crate.
pub type Result<T> = std::result::Result<T, IndexerError>;
