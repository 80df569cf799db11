//! Merge requests stage: the MR analogue of [`crate::stages::issues`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use gitchat_gitlab::MergeRequest;
use gitchat_manifest::ItemType;

use crate::context::IndexContext;
use crate::embed::{delete_item_points, embed_and_upsert};
use crate::error::Result;

const PACING: Duration = Duration::from_millis(200);

fn parse_updated_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn index_one_mr(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
    mr: &MergeRequest,
    replace_existing: bool,
) -> Result<bool> {
    let mut chunks = ctx.chunker.chunk_merge_request(mr, gitlab_id);

    match ctx.gitlab.get_mr_notes(gitlab_id, mr.iid).await {
        Ok(notes) => {
            for note in &notes {
                chunks.extend(ctx.chunker.chunk_comment(note, "merge_request", mr.iid, gitlab_id));
            }
        }
        Err(e) => warn!("failed to fetch notes for MR {}/{}: {e}", gitlab_id, mr.iid),
    }

    if chunks.is_empty() {
        return Ok(false);
    }

    let item_id = mr.id.to_string();

    if replace_existing {
        let existing = {
            let manifest = ctx.manifest.lock().expect("manifest mutex poisoned");
            manifest.get_indexed_item(local_project_id, ItemType::MergeRequest, &item_id)?
        };
        if let Some(existing) = existing {
            delete_item_points(ctx, &existing.qdrant_point_ids).await?;
        }
    }

    let item_id_for_entity = item_id.clone();
    let point_ids =
        embed_and_upsert(ctx, gitlab_id, chunks, move |_| item_id_for_entity.clone()).await?;

    let manifest = ctx.manifest.lock().expect("manifest mutex poisoned");
    manifest.upsert_indexed_item(
        local_project_id,
        ItemType::MergeRequest,
        &item_id,
        Some(&mr.iid.to_string()),
        &point_ids,
        parse_updated_at(&mr.updated_at),
    )?;

    Ok(true)
}

/// Full index: every merge request, paginated newest-updated-first.
pub async fn index_merge_requests_full(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
) -> Result<usize> {
    let mrs = ctx.gitlab.get_all_merge_requests(gitlab_id).await?;
    let mut indexed = 0;

    for mr in &mrs {
        match index_one_mr(ctx, local_project_id, gitlab_id, mr, false).await {
            Ok(true) => indexed += 1,
            Ok(false) => {}
            Err(e) => warn!("failed to index MR {}/{}: {e}", gitlab_id, mr.iid),
        }
        tokio::time::sleep(PACING).await;
    }

    info!("indexed {indexed} merge requests for project {gitlab_id}");
    Ok(indexed)
}

/// Incremental sync: only merge requests updated since `updated_after`.
pub async fn index_merge_requests_delta(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
    updated_after: &str,
) -> Result<usize> {
    let mrs = ctx
        .gitlab
        .get_merge_requests_updated_after(gitlab_id, updated_after)
        .await?;
    let mut indexed = 0;

    for mr in &mrs {
        match index_one_mr(ctx, local_project_id, gitlab_id, mr, true).await {
            Ok(true) => indexed += 1,
            Ok(false) => {}
            Err(e) => warn!("failed to re-index MR {}/{}: {e}", gitlab_id, mr.iid),
        }
        tokio::time::sleep(PACING).await;
    }

    info!("re-indexed {indexed} changed merge requests for project {gitlab_id}");
    Ok(indexed)
}
