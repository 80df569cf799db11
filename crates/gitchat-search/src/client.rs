//! Qdrant client wrapper for the `gitlab_content` collection.

use qdrant_client::qdrant::{
    vectors_config::Config, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, FieldType, Filter, PointId, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParams, VectorsConfig,
};
use qdrant_client::Qdrant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SearchError};
use crate::schema::{fields, ChunkPoint, CollectionConfig, SearchHit};

/// Points are upserted/deleted in batches this size to avoid oversized
/// requests, matching the remote embedding API's own batch-of-100 unit.
const BATCH_SIZE: usize = 100;

/// Configuration for connecting to Qdrant.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Qdrant client wrapper managing the single `gitlab_content` collection.
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Connect to Qdrant, verifying reachability.
    pub async fn connect(config: QdrantConfig) -> Result<Self> {
        info!("connecting to Qdrant at {}", config.url);

        let mut builder = Qdrant::from_url(&config.url);
        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }

        let client = builder
            .build()
            .map_err(|e| SearchError::Connection(format!("failed to build Qdrant client: {e}")))?;

        client
            .list_collections()
            .await
            .map_err(|e| SearchError::Connection(format!("failed to connect to Qdrant: {e}")))?;

        Ok(Self { client })
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.client.collection_exists(name).await?)
    }

    async fn collection_dimension(&self, name: &str) -> Result<Option<u64>> {
        if !self.collection_exists(name).await? {
            return Ok(None);
        }
        let info = self.client.collection_info(name).await?;
        let dim = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|vc| vc.config)
            .and_then(|c| match c {
                Config::Params(params) => Some(params.size),
                Config::ParamsMap(_) => None,
            });
        Ok(dim)
    }

    /// Ensure the collection exists with the given dimension. If it
    /// already exists with a different vector size, it is dropped and
    /// recreated: switching embedding providers is a destructive
    /// migration by design (prior vectors cannot be reused at a new
    /// dimensionality).
    pub async fn ensure_collection(&self, config: &CollectionConfig) -> Result<()> {
        if let Some(existing_dim) = self.collection_dimension(config.name).await? {
            if existing_dim == config.dimension {
                debug!("collection '{}' already at dimension {}", config.name, existing_dim);
                return Ok(());
            }
            warn!(
                "collection '{}' dimension changed ({} -> {}); dropping and recreating, all prior indexing is lost",
                config.name, existing_dim, config.dimension
            );
            self.client.delete_collection(config.name).await?;
        }

        info!(
            "creating collection '{}' (dim={}, distance={:?})",
            config.name, config.dimension, config.distance
        );

        let vectors_config = VectorsConfig {
            config: Some(Config::Params(VectorParams {
                size: config.dimension,
                distance: config.distance.into(),
                ..Default::default()
            })),
        };

        self.client
            .create_collection(
                CreateCollectionBuilder::new(config.name).vectors_config(vectors_config),
            )
            .await?;

        self.create_payload_indexes(config.name).await?;
        Ok(())
    }

    async fn create_payload_indexes(&self, collection_name: &str) -> Result<()> {
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                collection_name,
                fields::PROJECT_ID,
                FieldType::Integer,
            ))
            .await?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                collection_name,
                fields::TYPE,
                FieldType::Keyword,
            ))
            .await?;

        Ok(())
    }

    /// Upsert chunk points, batched to `BATCH_SIZE` per request.
    pub async fn upsert_points(&self, collection_name: &str, points: Vec<ChunkPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        for batch in points.chunks(BATCH_SIZE) {
            let qdrant_points: Vec<PointStruct> = batch
                .iter()
                .map(|p| PointStruct::new(p.id.to_string(), p.vector.clone(), p.payload()))
                .collect();

            self.client
                .upsert_points(UpsertPointsBuilder::new(collection_name, qdrant_points).wait(true))
                .await?;
        }

        debug!("upserted {} points to '{}'", points.len(), collection_name);
        Ok(())
    }

    /// Delete points by id, batched. Used to retract an item's previous
    /// chunk set before re-embedding it during incremental sync.
    pub async fn delete_points(&self, collection_name: &str, point_ids: &[Uuid]) -> Result<()> {
        if point_ids.is_empty() {
            return Ok(());
        }

        for batch in point_ids.chunks(BATCH_SIZE) {
            let ids: Vec<PointId> = batch.iter().map(|id| id.to_string().into()).collect();
            self.client
                .delete_points(
                    DeletePointsBuilder::new(collection_name)
                        .points(ids)
                        .wait(true),
                )
                .await?;
        }

        Ok(())
    }

    /// Delete all points for a project (used when a project is removed
    /// from the selected set).
    pub async fn delete_project_points(&self, collection_name: &str, project_id: i64) -> Result<()> {
        let filter = Filter::must([Condition::matches(fields::PROJECT_ID, project_id)]);
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection_name)
                    .points(filter)
                    .wait(true),
            )
            .await?;
        Ok(())
    }

    /// Vector similarity search, optionally scoped to a project and/or a
    /// set of content types.
    pub async fn search(
        &self,
        collection_name: &str,
        query_vector: Vec<f32>,
        limit: u64,
        project_id: Option<i64>,
        item_types: Option<&[&str]>,
    ) -> Result<Vec<SearchHit>> {
        let mut must = Vec::new();
        if let Some(project_id) = project_id {
            must.push(Condition::matches(fields::PROJECT_ID, project_id));
        }

        let mut filter = Filter::must(must);
        if let Some(types) = item_types {
            if !types.is_empty() {
                filter.should = types
                    .iter()
                    .map(|t| Condition::matches(fields::TYPE, t.to_string()))
                    .collect();
                filter.min_should = Some(qdrant_client::qdrant::MinShould {
                    conditions: vec![],
                    min_count: 1,
                });
            }
        }

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection_name, query_vector, limit)
                    .filter(filter)
                    .with_payload(true),
            )
            .await?;

        Ok(response.result.into_iter().filter_map(to_search_hit).collect())
    }

    /// Scroll all points for a project (used for debugging / small
    /// projects; prefer `search` for ranked retrieval).
    pub async fn scroll_project(
        &self,
        collection_name: &str,
        project_id: i64,
        limit: u32,
    ) -> Result<Vec<SearchHit>> {
        let filter = Filter::must([Condition::matches(fields::PROJECT_ID, project_id)]);

        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(collection_name)
                    .filter(filter)
                    .limit(limit)
                    .with_payload(true),
            )
            .await?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                to_search_hit(qdrant_client::qdrant::ScoredPoint {
                    id: point.id,
                    payload: point.payload,
                    score: 0.0,
                    version: 0,
                    vectors: None,
                    shard_key: None,
                    order_value: None,
                })
            })
            .collect())
    }
}

fn to_search_hit(point: qdrant_client::qdrant::ScoredPoint) -> Option<SearchHit> {
    use qdrant_client::qdrant::point_id::PointIdOptions;

    let point_id = point.id?;
    let id = match point_id.point_id_options? {
        PointIdOptions::Uuid(u) => Uuid::parse_str(&u).ok()?,
        PointIdOptions::Num(_) => return None,
    };

    Some(SearchHit {
        id,
        score: point.score,
        payload: point.payload.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = QdrantConfig::default();
        assert_eq!(config.url, "http://localhost:6334");
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn collection_config_uses_cosine_distance() {
        let config = CollectionConfig::new(1536);
        assert_eq!(config.dimension, 1536);
        assert_eq!(config.name, crate::schema::COLLECTION_NAME);
    }
}
