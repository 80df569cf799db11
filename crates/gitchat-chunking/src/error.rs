//! Chunking error types.

use thiserror::Error;

/// Errors that can occur while chunking content.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// The BPE tokenizer failed to initialize.
    #[error("failed to load tokenizer: {0}")]
    TokenizerInit(String),
}

/// Convenience result alias for this crate.
pub type Result<T> = std::result::Result<T, ChunkingError>;
