//! Shared embed-then-upsert helper used by every content stage.
//!
//! Mirrors the teacher indexer's batch-encode-then-batch-upsert shape:
//! chunks are embedded `embedding_batch_size` at a time (the remote
//! embedding APIs this crate talks to are themselves batched) and the
//! resulting points are handed to the vector store in one call.

use gitchat_chunking::Chunk;
use gitchat_search::schema::{item_type_tag, point_id};
use gitchat_search::ChunkPoint;
use uuid::Uuid;

use crate::context::IndexContext;
use crate::error::Result;

/// Given an ordered list of chunks and a function deriving each chunk's
/// entity id (issue id, file path, comment id, ...), embed and upsert all
/// of them, returning the point ids that were written.
pub async fn embed_and_upsert(
    ctx: &IndexContext,
    project_id: i64,
    chunks: Vec<Chunk>,
    entity_id: impl Fn(&Chunk) -> String,
) -> Result<Vec<Uuid>> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let mut all_ids = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(ctx.embedding_batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = ctx.embeddings.embed(texts).await?;

        let points: Vec<ChunkPoint> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let item_type = item_type_tag(&chunk.metadata);
                let id = point_id(project_id, item_type, &entity_id(chunk), &chunk.content);
                all_ids.push(id);
                ChunkPoint {
                    id,
                    vector,
                    chunk: chunk.clone(),
                }
            })
            .collect();

        ctx.store
            .upsert_points(&ctx.collection_name, points)
            .await?;
    }

    Ok(all_ids)
}

/// Delete a manifest item's previously-stored points, if any.
pub async fn delete_item_points(
    ctx: &IndexContext,
    point_ids: &[Uuid],
) -> Result<()> {
    if point_ids.is_empty() {
        return Ok(());
    }
    ctx.store
        .delete_points(&ctx.collection_name, point_ids)
        .await?;
    Ok(())
}
