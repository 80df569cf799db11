//! Code stage: shallow clone/pull, walk the tree, chunk and embed.
//!
//! The full-index path re-chunks the entire indexable tree. The sync path
//! diffs HEAD against the last indexed commit and only re-chunks files that
//! actually changed, unioning their point ids into the project's single
//! `code` manifest row rather than replacing it (deleted paths are left
//! stale until the next full index, per the acknowledged tradeoff).

use std::path::Path;

use tracing::{info, warn};
use uuid::Uuid;

use gitchat_manifest::ItemType;

use crate::context::IndexContext;
use crate::embed::embed_and_upsert;
use crate::error::Result;
use crate::git;
use crate::walk::walk_indexable_files;

async fn read_file_lossy(path: &Path) -> Option<String> {
    let bytes = tokio::fs::read(path).await.ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

async fn chunk_and_embed_files(
    ctx: &IndexContext,
    gitlab_id: i64,
    repo_path: &Path,
    rel_paths: &[std::path::PathBuf],
) -> (usize, Vec<Uuid>) {
    let mut files_indexed = 0;
    let mut all_point_ids = Vec::new();

    for rel_path in rel_paths {
        let abs_path = repo_path.join(rel_path);
        let Some(content) = read_file_lossy(&abs_path).await else {
            warn!("failed to read {abs_path:?} for indexing");
            continue;
        };
        let rel_str = rel_path.to_string_lossy().to_string();

        let chunks = ctx.chunker.chunk_code_file(&rel_str, &content, gitlab_id);
        if chunks.is_empty() {
            continue;
        }

        let entity_id = rel_str.clone();
        match embed_and_upsert(ctx, gitlab_id, chunks, move |_| entity_id.clone()).await {
            Ok(ids) => {
                all_point_ids.extend(ids);
                files_indexed += 1;
            }
            Err(e) => warn!("failed to embed {rel_str}: {e}"),
        }
    }

    (files_indexed, all_point_ids)
}

/// Full index: clone/pull, walk every indexable file, embed all of them.
/// Returns `(files_indexed, head_commit)`.
pub async fn index_code_full(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
    clone_url: &str,
) -> Result<(usize, Option<String>)> {
    let repo_path = ctx.repo_path(gitlab_id);
    let cloned = git::ensure_repo_cloned(&repo_path, clone_url, ctx.gitlab_pat.as_deref()).await;

    if !cloned {
        warn!("repository not cloned for project {gitlab_id}, skipping code stage");
        return Ok((0, None));
    }

    let rel_paths = walk_indexable_files(&repo_path);
    let (files_indexed, all_point_ids) =
        chunk_and_embed_files(ctx, gitlab_id, &repo_path, &rel_paths).await;

    let item_id = gitlab_id.to_string();
    let manifest = ctx.manifest.lock().expect("manifest mutex poisoned");
    manifest.upsert_indexed_item(
        local_project_id,
        ItemType::Code,
        &item_id,
        None,
        &all_point_ids,
        None,
    )?;
    drop(manifest);

    let head = git::current_head(&repo_path).await;
    info!("indexed {files_indexed} code files for project {gitlab_id}");
    Ok((files_indexed, head))
}

/// Incremental sync: pull, diff against the last indexed commit, re-embed
/// only the files that changed. Returns `(files_indexed, new_head)`.
pub async fn index_code_delta(
    ctx: &IndexContext,
    local_project_id: i64,
    gitlab_id: i64,
    clone_url: &str,
    last_indexed_commit: Option<&str>,
) -> Result<(usize, Option<String>)> {
    let repo_path = ctx.repo_path(gitlab_id);
    let before_head = if repo_path.exists() {
        git::current_head(&repo_path).await
    } else {
        None
    };

    let cloned = git::ensure_repo_cloned(&repo_path, clone_url, ctx.gitlab_pat.as_deref()).await;
    if !cloned {
        warn!("repository unavailable for project {gitlab_id}, skipping code sync");
        return Ok((0, last_indexed_commit.map(str::to_string)));
    }

    let new_head = git::current_head(&repo_path).await;

    if let (Some(new_head), Some(last)) = (&new_head, last_indexed_commit) {
        if new_head == last {
            info!("code unchanged for project {gitlab_id}, skipping");
            return Ok((0, Some(new_head.clone())));
        }
    }

    let base = last_indexed_commit
        .map(str::to_string)
        .or(before_head.clone());

    let rel_paths: Vec<std::path::PathBuf> = match (&base, &new_head) {
        (Some(base), Some(head)) if base != head => {
            let changed = git::changed_files(&repo_path, base, head).await;
            changed
                .into_iter()
                .map(std::path::PathBuf::from)
                .filter(|p| crate::walk::is_indexable_file(&repo_path.join(p), &repo_path))
                .collect()
        }
        // No usable base commit to diff from: fall back to a full walk so
        // the first sync after a fresh clone still indexes something.
        _ => walk_indexable_files(&repo_path),
    };

    let (files_indexed, new_point_ids) =
        chunk_and_embed_files(ctx, gitlab_id, &repo_path, &rel_paths).await;

    if !new_point_ids.is_empty() {
        let item_id = gitlab_id.to_string();
        let manifest = ctx.manifest.lock().expect("manifest mutex poisoned");
        manifest.merge_point_ids(local_project_id, ItemType::Code, &item_id, &new_point_ids, None)?;
    }

    info!("re-indexed {files_indexed} changed code files for project {gitlab_id}");
    Ok((files_indexed, new_head))
}
