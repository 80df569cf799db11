//! Chunk and metadata types.
//!
//! `ChunkMetadata` mirrors the payload schema in the external interfaces
//! section: one variant per content type, carrying exactly the
//! item-specific keys that type's vector-store payload needs.

use serde::{Deserialize, Serialize};

/// A single chunk of content ready for embedding and storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub token_count: usize,
}

/// Subtype for issue/merge_request chunks: the title+metadata card, or a
/// piece of the free-text description.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Subtype {
    Metadata,
    Description,
}

/// Per-content-type payload metadata, internally tagged by `type` to match
/// the vector store's payload schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkMetadata {
    Issue(IssueMetadata),
    MergeRequest(MergeRequestMetadata),
    Code(CodeMetadata),
    Comment(CommentMetadata),
    Readme(ReadmeMetadata),
}

impl ChunkMetadata {
    /// The project this chunk belongs to.
    pub fn project_id(&self) -> i64 {
        match self {
            ChunkMetadata::Issue(m) => m.project_id,
            ChunkMetadata::MergeRequest(m) => m.project_id,
            ChunkMetadata::Code(m) => m.project_id,
            ChunkMetadata::Comment(m) => m.project_id,
            ChunkMetadata::Readme(m) => m.project_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueMetadata {
    pub subtype: Subtype,
    pub project_id: i64,
    pub issue_id: i64,
    pub issue_iid: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub web_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequestMetadata {
    pub subtype: Subtype,
    pub project_id: i64,
    pub mr_id: i64,
    pub mr_iid: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub web_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeMetadata {
    pub project_id: i64,
    pub file_path: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_type: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentMetadata {
    pub project_id: i64,
    pub parent_type: String,
    pub parent_iid: i64,
    pub comment_id: i64,
    pub author: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadmeMetadata {
    pub project_id: i64,
    pub project_name: String,
    pub web_url: String,
    pub file_path: String,
}
