//! Content-aware chunking for GitLab issues, merge requests, comments,
//! code files and READMEs.
//!
//! Chunks are measured in cl100k BPE tokens so a `chunk_size` budget lines
//! up with the embedding provider's own token accounting. Each chunk type
//! carries a typed [`ChunkMetadata`] variant matching the vector store's
//! per-point payload schema.

mod chunker;
mod error;
mod tokenizer;
mod types;

pub use chunker::{detect_language, Chunker};
pub use error::{ChunkingError, Result};
pub use tokenizer::Tokenizer;
pub use types::{
    Chunk, ChunkMetadata, CodeMetadata, CommentMetadata, IssueMetadata, MergeRequestMetadata,
    ReadmeMetadata, Subtype,
};
