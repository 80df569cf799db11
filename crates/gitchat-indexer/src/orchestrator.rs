//! Per-project orchestration: runs the full-index or incremental-sync stage
//! chain under the status-guarded state machine described in §4.5.1.

use tracing::{error, info};

use gitchat_manifest::IndexingStatus;

use crate::context::IndexContext;
use crate::error::{IndexerError, Result};
use crate::stages::{cleanup, code, issues, merge_requests, readme};
use crate::types::{RunKind, RunRequestOutcome, StageOutcome};

/// Drives a single project through one stage chain at a time. Stateless
/// beyond the shared [`IndexContext`] handles; all mutable state lives in
/// the manifest database.
pub struct Orchestrator {
    ctx: IndexContext,
}

impl Orchestrator {
    pub fn new(ctx: IndexContext) -> Self {
        Self { ctx }
    }

    /// Request a full index. Returns `AlreadyIndexing` without changing any
    /// state if a run is already active for this project.
    pub async fn run_full_index(&self, gitlab_id: i64) -> Result<RunRequestOutcome> {
        self.run(gitlab_id, RunKind::FullIndex).await
    }

    /// Request an incremental sync. Falls back to a full index if the
    /// project has never been indexed before.
    pub async fn run_sync(&self, gitlab_id: i64) -> Result<RunRequestOutcome> {
        let never_indexed = {
            let manifest = self.ctx.manifest.lock().expect("manifest mutex poisoned");
            let project = manifest
                .get_project(gitlab_id)?
                .ok_or(IndexerError::ProjectNotFound(gitlab_id))?;
            project.last_indexed_at.is_none()
        };

        if never_indexed {
            info!("project {gitlab_id} never indexed, falling back to full index");
            return self.run(gitlab_id, RunKind::FullIndex).await;
        }

        self.run(gitlab_id, RunKind::Sync).await
    }

    /// Remove every trace of a project's indexed content: all vectors
    /// tagged with its `gitlab_id` and its manifest row (which cascades to
    /// `indexed_items`). The on-disk repo clone is left alone; a later
    /// full index reuses it rather than re-cloning.
    pub async fn clear_index(&self, gitlab_id: i64) -> Result<()> {
        self.ctx
            .store
            .delete_project_points(&self.ctx.collection_name, gitlab_id)
            .await?;
        let manifest = self.ctx.manifest.lock().expect("manifest mutex poisoned");
        manifest.delete_project(gitlab_id)?;
        Ok(())
    }

    /// Stop an active run: status -> `stopped`. Does not cancel in-flight
    /// network calls; the stage chain checks status between stages isn't
    /// modeled here (single-stage-chain-per-call-site), so this primarily
    /// matters for jobs still queued or about to start their next stage.
    pub fn stop(&self, gitlab_id: i64) -> Result<()> {
        let manifest = self.ctx.manifest.lock().expect("manifest mutex poisoned");
        manifest.stop_run(gitlab_id)?;
        Ok(())
    }

    async fn run(&self, gitlab_id: i64, kind: RunKind) -> Result<RunRequestOutcome> {
        let target_status = match kind {
            RunKind::FullIndex => IndexingStatus::Indexing,
            RunKind::Sync => IndexingStatus::Syncing,
        };

        let started = {
            let manifest = self.ctx.manifest.lock().expect("manifest mutex poisoned");
            manifest.try_start_run(gitlab_id, target_status)?
        };

        if !started {
            return Ok(RunRequestOutcome::AlreadyIndexing);
        }

        match self.execute_chain(gitlab_id, kind).await {
            Ok(outcome) => {
                info!("{kind:?} completed for project {gitlab_id}: {outcome:?}");
                Ok(RunRequestOutcome::Started)
            }
            Err(e) => {
                error!("{kind:?} failed for project {gitlab_id}: {e}");
                let manifest = self.ctx.manifest.lock().expect("manifest mutex poisoned");
                manifest.fail_run(gitlab_id, &e.to_string())?;
                Ok(RunRequestOutcome::Started)
            }
        }
    }

    async fn execute_chain(&self, gitlab_id: i64, kind: RunKind) -> Result<StageOutcome> {
        let (local_project_id, default_branch, project_name, web_url, clone_url, last_commit) = {
            let manifest = self.ctx.manifest.lock().expect("manifest mutex poisoned");
            let project = manifest
                .get_project(gitlab_id)?
                .ok_or(IndexerError::ProjectNotFound(gitlab_id))?;
            (
                project.id,
                project.default_branch.clone(),
                project.name.clone(),
                format!("{}/{}", self.ctx.gitlab_url, project.path_with_namespace),
                project.http_url_to_repo.clone(),
                project.last_indexed_commit.clone(),
            )
        };

        let mut outcome = StageOutcome::default();

        match kind {
            RunKind::FullIndex => {
                outcome.readme_indexed = readme::index_readme_full(
                    &self.ctx,
                    local_project_id,
                    gitlab_id,
                    &default_branch,
                    &project_name,
                    &web_url,
                )
                .await?;

                outcome.issues_indexed =
                    issues::index_issues_full(&self.ctx, local_project_id, gitlab_id).await?;

                outcome.mrs_indexed = merge_requests::index_merge_requests_full(
                    &self.ctx,
                    local_project_id,
                    gitlab_id,
                )
                .await?;

                let (files_indexed, head) =
                    code::index_code_full(&self.ctx, local_project_id, gitlab_id, &clone_url)
                        .await?;
                outcome.code_files_indexed = files_indexed;

                let manifest = self.ctx.manifest.lock().expect("manifest mutex poisoned");
                manifest.complete_run(gitlab_id, head.as_deref())?;
            }
            RunKind::Sync => {
                let last_indexed_at = {
                    let manifest = self.ctx.manifest.lock().expect("manifest mutex poisoned");
                    manifest
                        .get_project(gitlab_id)?
                        .and_then(|p| p.last_indexed_at)
                };
                let updated_after = last_indexed_at
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default();

                outcome.readme_indexed = readme::index_readme_delta(
                    &self.ctx,
                    local_project_id,
                    gitlab_id,
                    &default_branch,
                    &project_name,
                    &web_url,
                )
                .await?;

                outcome.issues_indexed = issues::index_issues_delta(
                    &self.ctx,
                    local_project_id,
                    gitlab_id,
                    &updated_after,
                )
                .await?;

                outcome.mrs_indexed = merge_requests::index_merge_requests_delta(
                    &self.ctx,
                    local_project_id,
                    gitlab_id,
                    &updated_after,
                )
                .await?;

                let (files_indexed, head) = code::index_code_delta(
                    &self.ctx,
                    local_project_id,
                    gitlab_id,
                    &clone_url,
                    last_commit.as_deref(),
                )
                .await?;
                outcome.code_files_indexed = files_indexed;

                outcome.items_deleted =
                    cleanup::cleanup_deletions(&self.ctx, local_project_id, gitlab_id).await?;

                let manifest = self.ctx.manifest.lock().expect("manifest mutex poisoned");
                manifest.complete_run(gitlab_id, head.as_deref())?;
            }
        }

        Ok(outcome)
    }
}
