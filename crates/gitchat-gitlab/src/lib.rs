//! GitLab REST v4 API client used by the indexer, retriever and code
//! analysis agent.
//!
//! Every call goes through [`GitlabClient`], which enforces a minimum
//! interval between requests and retries transient failures with
//! exponential backoff (base 1s, cap 10s, 3 attempts), the same envelope
//! the original Python client applied via `tenacity`.

mod client;
mod error;
mod types;

pub use client::{GitlabClient, GitlabClientConfig};
pub use error::{GitlabError, Result};
pub use types::{
    Discussion, FileContent, Issue, MergeRequest, MilestoneRef, MrDiff, Note, Project, TreeEntry,
    UserRef,
};
