//! Row types for the manifest database.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ManifestError;

/// Per-project indexing state. Transitions are owned by the orchestrator;
/// the manifest store only persists and guards them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingStatus {
    Pending,
    Indexing,
    Syncing,
    Completed,
    Error,
    Stopped,
}

impl IndexingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexingStatus::Pending => "pending",
            IndexingStatus::Indexing => "indexing",
            IndexingStatus::Syncing => "syncing",
            IndexingStatus::Completed => "completed",
            IndexingStatus::Error => "error",
            IndexingStatus::Stopped => "stopped",
        }
    }

    /// Whether a run is already active in this state (full index or sync),
    /// the guard condition the orchestrator's `already_indexing` check uses.
    pub fn is_active(&self) -> bool {
        matches!(self, IndexingStatus::Indexing | IndexingStatus::Syncing)
    }
}

impl fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexingStatus {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IndexingStatus::Pending),
            "indexing" => Ok(IndexingStatus::Indexing),
            "syncing" => Ok(IndexingStatus::Syncing),
            "completed" => Ok(IndexingStatus::Completed),
            "error" => Ok(IndexingStatus::Error),
            "stopped" => Ok(IndexingStatus::Stopped),
            other => Err(ManifestError::InvalidStatus(other.to_string())),
        }
    }
}

/// The kind of content an `IndexedItem` row tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Issue,
    MergeRequest,
    Code,
    Readme,
    Comment,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Issue => "issue",
            ItemType::MergeRequest => "merge_request",
            ItemType::Code => "code",
            ItemType::Readme => "readme",
            ItemType::Comment => "comment",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue" => Ok(ItemType::Issue),
            "merge_request" => Ok(ItemType::MergeRequest),
            "code" => Ok(ItemType::Code),
            "readme" => Ok(ItemType::Readme),
            "comment" => Ok(ItemType::Comment),
            other => Err(ManifestError::InvalidItemType(other.to_string())),
        }
    }
}

/// A persistent project record.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: i64,
    pub gitlab_id: i64,
    pub name: String,
    pub path_with_namespace: String,
    pub default_branch: String,
    pub http_url_to_repo: String,
    pub is_indexed: bool,
    pub is_selected: bool,
    pub indexing_status: IndexingStatus,
    pub indexing_error: Option<String>,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub last_indexed_commit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A manifest row linking one piece of source content to the vector points
/// it was embedded into.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedItem {
    pub id: i64,
    pub project_id: i64,
    pub item_type: ItemType,
    pub item_id: String,
    pub item_iid: Option<String>,
    pub qdrant_point_ids: Vec<Uuid>,
    pub last_updated_at: Option<DateTime<Utc>>,
}
