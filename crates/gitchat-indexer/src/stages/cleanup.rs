//! Cleanup-deletions stage: remove manifest rows (and their vector points)
//! for issues/MRs that no longer exist upstream.

use std::collections::HashSet;

use tracing::{info, warn};

use gitchat_manifest::ItemType;

use crate::context::IndexContext;
use crate::embed::delete_item_points;
use crate::error::Result;

async fn cleanup_item_type(
    ctx: &IndexContext,
    local_project_id: i64,
    item_type: ItemType,
    remote_ids: HashSet<String>,
) -> Result<usize> {
    let local_ids = {
        let manifest = ctx.manifest.lock().expect("manifest mutex poisoned");
        manifest.list_item_ids(local_project_id, item_type)?
    };

    let mut deleted = 0;
    for local_id in local_ids {
        if remote_ids.contains(&local_id) {
            continue;
        }

        let existing = {
            let manifest = ctx.manifest.lock().expect("manifest mutex poisoned");
            manifest.delete_indexed_item(local_project_id, item_type, &local_id)?
        };

        if let Some(existing) = existing {
            if let Err(e) = delete_item_points(ctx, &existing.qdrant_point_ids).await {
                warn!("failed to delete stale points for {item_type} {local_id}: {e}");
                continue;
            }
            deleted += 1;
        }
    }

    Ok(deleted)
}

/// Diff locally-tracked issue/MR ids against the live remote set and delete
/// anything no longer present upstream.
pub async fn cleanup_deletions(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
) -> Result<usize> {
    let remote_issue_ids: HashSet<String> = ctx
        .gitlab
        .get_issue_ids(gitlab_id)
        .await?
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    let remote_mr_ids: HashSet<String> = ctx
        .gitlab
        .get_mr_ids(gitlab_id)
        .await?
        .into_iter()
        .map(|id| id.to_string())
        .collect();

    let issues_deleted =
        cleanup_item_type(ctx, local_project_id, ItemType::Issue, remote_issue_ids).await?;
    let mrs_deleted =
        cleanup_item_type(ctx, local_project_id, ItemType::MergeRequest, remote_mr_ids).await?;

    let total = issues_deleted + mrs_deleted;
    info!("cleanup removed {total} stale items for project {gitlab_id}");
    Ok(total)
}
