//! Manifest store error types.

use thiserror::Error;

/// Errors that can occur while reading or writing the manifest database.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: String, found: String },

    #[error("project not found: gitlab_id={0}")]
    ProjectNotFound(i64),

    #[error("unrecognized indexing status: {0}")]
    InvalidStatus(String),

    #[error("unrecognized item type: {0}")]
    InvalidItemType(String),
}

/// Convenience result alias for this crate.
pub type Result<T> = std::result::Result<T, ManifestError>;
