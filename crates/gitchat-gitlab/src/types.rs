//! Typed GitLab API v4 response shapes.
//!
//! Only the fields the indexing pipeline actually reads are modeled;
//! everything else GitLab sends is ignored by serde.

use serde::{Deserialize, Serialize};

/// A GitLab project (repository).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub path_with_namespace: String,
    pub web_url: String,
    pub http_url_to_repo: String,
    pub default_branch: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A GitLab user reference, embedded in issues/MRs/notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub username: String,
}

/// A GitLab milestone reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneRef {
    pub title: String,
}

/// A GitLab issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub iid: i64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub author: UserRef,
    #[serde(default)]
    pub milestone: Option<MilestoneRef>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub closed_at: Option<String>,
    pub web_url: String,
}

/// A GitLab merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: i64,
    pub iid: i64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub author: UserRef,
    pub source_branch: String,
    pub target_branch: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub merged_at: Option<String>,
    pub web_url: String,
}

/// A note/comment on an issue or merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    #[serde(default)]
    pub body: Option<String>,
    pub author: UserRef,
    pub created_at: String,
    #[serde(default)]
    pub system: bool,
}

/// A threaded discussion, containing an ordered list of notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    pub id: String,
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// A single file change in a merge request diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrDiff {
    pub old_path: String,
    pub new_path: String,
    #[serde(default)]
    pub diff: String,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
}

/// A single entry in a repository tree listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub path: String,
    pub mode: String,
}

impl TreeEntry {
    /// Whether this entry is a regular file (as opposed to a subtree).
    pub fn is_blob(&self) -> bool {
        self.entry_type == "blob"
    }
}

/// A file content response (base64-encoded), from the files API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContent {
    pub file_path: String,
    pub content: String,
    pub encoding: String,
}
