//! Accumulator types threaded through a stage chain.

use serde::{Deserialize, Serialize};

/// Cumulative outcome of a full-index or sync run, threaded from stage to
/// stage the way the original Celery chain threaded a result dict. Each
/// stage only fills in the fields it owns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageOutcome {
    pub readme_indexed: bool,
    pub issues_indexed: usize,
    pub mrs_indexed: usize,
    pub code_files_indexed: usize,
    pub items_deleted: usize,
}

/// Which stage chain an orchestrator run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// README + issues + MRs + code, from scratch.
    FullIndex,
    /// Delta fetch against `last_indexed_at`/`last_indexed_commit`.
    Sync,
}

/// Outcome of requesting a run: either it started, or a run was already
/// active and the request was rejected without changing any state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequestOutcome {
    Started,
    AlreadyIndexing,
}
