//! Issues stage: full index paginates every issue updated-desc; sync fetches
//! only the delta since the project's last indexed timestamp. Both paths
//! embed the issue's own chunks plus one chunk set per comment, and pace
//! themselves with a 200ms sleep between items to stay gentle on the GitLab
//! API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use gitchat_gitlab::Issue;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gitlab_zulu_timestamp() {
        let parsed = parse_updated_at("2024-03-01T12:30:00Z");
        assert!(parsed.is_some());
        assert_eq!(parsed.unwrap().to_rfc3339(), "2024-03-01T12:30:00+00:00");
    }

    #[test]
    fn malformed_timestamp_yields_none() {
        assert!(parse_updated_at("not-a-date").is_none());
    }
}

async fn index_one_issue(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
    issue: &Issue,
    replace_existing: bool,
) -> Result<bool> {
    let mut chunks = ctx.chunker.chunk_issue(issue, gitlab_id);

    match ctx.gitlab.get_issue_notes(gitlab_id, issue.iid).await {
        Ok(notes) => {
            for note in &notes {
                chunks.extend(ctx.chunker.chunk_comment(note, "issue", issue.iid, gitlab_id));
            }
        }
        Err(e) => warn!("failed to fetch notes for issue {}/{}: {e}", gitlab_id, issue.iid),
    }

    if chunks.is_empty() {
        return Ok(false);
    }

    let item_id = issue.id.to_string();

    if replace_existing {
        let existing = {
            let manifest = ctx.manifest.lock().expect("manifest mutex poisoned");
            manifest.get_indexed_item(local_project_id, ItemType::Issue, &item_id)?
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
        ItemType::Issue,
        &item_id,
        Some(&issue.iid.to_string()),
        &point_ids,
        parse_updated_at(&issue.updated_at),
    )?;

    Ok(true)
}

/// Full index: every issue, paginated newest-updated-first.
pub async fn index_issues_full(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
) -> Result<usize> {
    let issues = ctx.gitlab.get_all_issues(gitlab_id).await?;
    let mut indexed = 0;

    for issue in &issues {
        match index_one_issue(ctx, local_project_id, gitlab_id, issue, false).await {
            Ok(true) => indexed += 1,
            Ok(false) => {}
            Err(e) => warn!("failed to index issue {}/{}: {e}", gitlab_id, issue.iid),
        }
        tokio::time::sleep(PACING).await;
    }

    info!("indexed {indexed} issues for project {gitlab_id}");
    Ok(indexed)
}

/// Incremental sync: only issues updated since `updated_after`.
pub async fn index_issues_delta(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
    updated_after: &str,
) -> Result<usize> {
    let issues = ctx
        .gitlab
        .get_issues_updated_after(gitlab_id, updated_after)
        .await?;
    let mut indexed = 0;

    for issue in &issues {
        match index_one_issue(ctx, local_project_id, gitlab_id, issue, true).await {
            Ok(true) => indexed += 1,
            Ok(false) => {}
            Err(e) => warn!("failed to re-index issue {}/{}: {e}", gitlab_id, issue.iid),
        }
        tokio::time::sleep(PACING).await;
    }

    info!("re-indexed {indexed} changed issues for project {gitlab_id}");
    Ok(indexed)
}
