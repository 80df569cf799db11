//! Shared handles every indexing stage needs.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use gitchat_chunking::Chunker;
use gitchat_gitlab::GitlabClient;
use gitchat_manifest::ManifestStore;
use gitchat_search::{EmbeddingProvider, QdrantStore};

/// Handles shared across every stage of a single indexing or sync run.
///
/// `manifest` is behind a `Mutex` because `rusqlite::Connection` is not
/// `Sync`: several worker-pool slots may be driving different projects'
/// stage chains concurrently and each touches the manifest only for brief,
/// single-statement updates.
#[derive(Clone)]
pub struct IndexContext {
    pub gitlab: Arc<GitlabClient>,
    pub chunker: Arc<Chunker>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub store: Arc<QdrantStore>,
    pub manifest: Arc<Mutex<ManifestStore>>,
    pub collection_name: String,
    pub gitlab_url: String,
    pub gitlab_pat: Option<String>,
    pub repos_path: PathBuf,
    pub embedding_batch_size: usize,
}

impl IndexContext {
    /// Local on-disk clone path for a project's code, keyed by its GitLab id
    /// (never the local manifest row id, so the path is stable across a
    /// manifest rebuild).
    pub fn repo_path(&self, gitlab_id: i64) -> PathBuf {
        self.repos_path.join(gitlab_id.to_string())
    }
}
