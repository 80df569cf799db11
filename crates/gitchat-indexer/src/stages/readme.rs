//! README stage: full index always embeds; sync compares a content hash
//! and skips when nothing changed.

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use gitchat_manifest::ItemType;

use crate::context::IndexContext;
use crate::embed::{delete_item_points, embed_and_upsert};
use crate::error::Result;

const README_CANDIDATES: &[&str] = &["README.md", "readme.md", "Readme.md", "README.MD"];

/// Probe the README candidates on `default_branch`, returning the first
/// non-empty body found.
async fn fetch_readme(ctx: &IndexContext, gitlab_id: i64, default_branch: &str) -> Option<String> {
    for candidate in README_CANDIDATES {
        match ctx
            .gitlab
            .get_file_raw(gitlab_id, candidate, default_branch)
            .await
        {
            Ok(content) if !content.trim().is_empty() => return Some(content),
            Ok(_) => continue,
            Err(e) => {
                debug!("README candidate {candidate} not found for {gitlab_id}: {e}");
                continue;
            }
        }
    }
    None
}

fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{digest:x}")[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_and_eight_hex_chars() {
        let a = content_hash("# Hello\n\nWorld");
        let b = content_hash("# Hello\n\nWorld");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn content_hash_changes_with_content() {
        assert_ne!(content_hash("one"), content_hash("two"));
    }
}

/// Full-index README stage: always (re)embeds if a README is found.
pub async fn index_readme_full(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
    default_branch: &str,
    project_name: &str,
    web_url: &str,
) -> Result<bool> {
    let Some(content) = fetch_readme(ctx, gitlab_id, default_branch).await else {
        info!("no README found for project {gitlab_id}");
        return Ok(false);
    };

    let chunks = ctx.chunker.chunk_readme(&content, gitlab_id, project_name, web_url);
    if chunks.is_empty() {
        return Ok(false);
    }

    let item_id = gitlab_id.to_string();
    let point_ids = embed_and_upsert(ctx, gitlab_id, chunks, |_| item_id.clone()).await?;
    let hash = content_hash(&content);

    let manifest = ctx.manifest.lock().expect("manifest mutex poisoned");
    manifest.upsert_indexed_item(
        local_project_id,
        ItemType::Readme,
        &item_id,
        Some(&hash),
        &point_ids,
        None,
    )?;

    info!("indexed README for project {gitlab_id}");
    Ok(true)
}

/// Incremental sync README stage: skip re-embedding when the content hash
/// stored in the manifest row's `item_iid` slot is unchanged.
pub async fn index_readme_delta(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
    default_branch: &str,
    project_name: &str,
    web_url: &str,
) -> Result<bool> {
    let Some(content) = fetch_readme(ctx, gitlab_id, default_branch).await else {
        return Ok(false);
    };

    let hash = content_hash(&content);
    let item_id = gitlab_id.to_string();

    let existing = {
        let manifest = ctx.manifest.lock().expect("manifest mutex poisoned");
        manifest.get_indexed_item(local_project_id, ItemType::Readme, &item_id)?
    };

    if let Some(existing) = &existing {
        if existing.item_iid.as_deref() == Some(hash.as_str()) {
            debug!("README unchanged for project {gitlab_id}, skipping");
            return Ok(false);
        }
    }

    let chunks = ctx.chunker.chunk_readme(&content, gitlab_id, project_name, web_url);
    if chunks.is_empty() {
        return Ok(false);
    }

    if let Some(existing) = &existing {
        delete_item_points(ctx, &existing.qdrant_point_ids).await?;
    }

    let point_ids = embed_and_upsert(ctx, gitlab_id, chunks, |_| item_id.clone()).await?;

    let manifest = ctx.manifest.lock().expect("manifest mutex poisoned");
    manifest.upsert_indexed_item(
        local_project_id,
        ItemType::Readme,
        &item_id,
        Some(&hash),
        &point_ids,
        None,
    )?;

    info!("re-indexed changed README for project {gitlab_id}");
    Ok(true)
}
