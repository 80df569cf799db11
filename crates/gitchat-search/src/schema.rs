//! Collection schema, payload shape and point-id derivation for the
//! `gitlab_content` Qdrant collection.

use qdrant_client::qdrant::Distance;
use qdrant_client::Payload;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use gitchat_chunking::Chunk;

/// The single logical collection this crate manages.
pub const COLLECTION_NAME: &str = "gitlab_content";

/// Indexed payload field names, used both when building filters and when
/// reading results back out of Qdrant.
pub mod fields {
    pub const PROJECT_ID: &str = "project_id";
    pub const TYPE: &str = "type";
    pub const CONTENT: &str = "content";
    pub const TOKEN_COUNT: &str = "token_count";
}

/// Vector collection configuration, parameterized by the active embedding
/// provider's dimension.
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub name: &'static str,
    pub dimension: u64,
    pub distance: Distance,
}

impl CollectionConfig {
    pub fn new(dimension: u64) -> Self {
        Self {
            name: COLLECTION_NAME,
            dimension,
            distance: Distance::Cosine,
        }
    }
}

/// Derive a chunk's point id: the first 32 hex characters of
/// SHA-256(`"{project_id}:{item_type}:{entity_id}:{content[:200]}"`),
/// written as a UUID so it can be used as a Qdrant point id. This makes
/// re-embedding the same item idempotent, since the same inputs always
/// hash to the same point.
pub fn point_id(project_id: i64, item_type: &str, entity_id: &str, content: &str) -> Uuid {
    let content_prefix: String = content.chars().take(200).collect();
    let input = format!("{project_id}:{item_type}:{entity_id}:{content_prefix}");
    let digest = Sha256::digest(input.as_bytes());
    let hex = format!("{digest:x}");
    let hex32 = &hex[..32];
    let uuid_str = format!(
        "{}-{}-{}-{}-{}",
        &hex32[0..8],
        &hex32[8..12],
        &hex32[12..16],
        &hex32[16..20],
        &hex32[20..32]
    );
    Uuid::parse_str(&uuid_str).expect("32 hex characters always parse as a UUID")
}

/// A chunk's item-type tag, used both in the point id hash and as the
/// payload's `type` discriminator. Matches the `ChunkMetadata` variant name.
pub fn item_type_tag(metadata: &gitchat_chunking::ChunkMetadata) -> &'static str {
    use gitchat_chunking::ChunkMetadata::*;
    match metadata {
        Issue(_) => "issue",
        MergeRequest(_) => "merge_request",
        Code(_) => "code",
        Comment(_) => "comment",
        Readme(_) => "readme",
    }
}

/// A chunk plus its embedding vector, ready to upsert.
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

impl ChunkPoint {
    /// Build the point's payload: the chunk's typed metadata flattened
    /// with `content` and `token_count`.
    pub fn payload(&self) -> Payload {
        let metadata_value =
            serde_json::to_value(&self.chunk.metadata).expect("ChunkMetadata always serializes");
        let mut map = match metadata_value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("ChunkMetadata serializes to a JSON object"),
        };
        map.insert(
            fields::CONTENT.to_string(),
            serde_json::Value::String(self.chunk.content.clone()),
        );
        map.insert(
            fields::TOKEN_COUNT.to_string(),
            serde_json::Value::Number(self.chunk.token_count.into()),
        );
        Payload::try_from(serde_json::Value::Object(map)).expect("payload map is a valid object")
    }
}

/// A search/scroll result read back from Qdrant.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub score: f32,
    pub payload: Payload,
}

impl SearchHit {
    pub fn project_id(&self) -> Option<i64> {
        self.get_i64(fields::PROJECT_ID)
    }

    pub fn item_type(&self) -> Option<String> {
        self.get_string(fields::TYPE)
    }

    pub fn content(&self) -> Option<String> {
        self.get_string(fields::CONTENT)
    }

    pub fn token_count(&self) -> Option<u64> {
        self.payload
            .get(fields::TOKEN_COUNT)
            .and_then(|v| v.as_integer())
            .map(|i| i as u64)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.payload
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(|v| v.as_integer())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(|v| v.as_bool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitchat_chunking::{ChunkMetadata, IssueMetadata, Subtype};

    fn issue_chunk() -> Chunk {
        Chunk {
            content: "Issue #1: Login fails".to_string(),
            metadata: ChunkMetadata::Issue(IssueMetadata {
                subtype: Subtype::Metadata,
                project_id: 42,
                issue_id: 100,
                issue_iid: 1,
                title: "Login fails".to_string(),
                state: Some("opened".to_string()),
                labels: vec![],
                created_at: Some("2024-01-01T00:00:00Z".to_string()),
                web_url: "https://gitlab.example.com/g/p/-/issues/1".to_string(),
            }),
            token_count: 5,
        }
    }

    #[test]
    fn point_id_is_deterministic() {
        let a = point_id(42, "issue", "100", "some content here");
        let b = point_id(42, "issue", "100", "some content here");
        assert_eq!(a, b);
    }

    #[test]
    fn point_id_differs_on_project() {
        let a = point_id(42, "issue", "100", "some content here");
        let b = point_id(43, "issue", "100", "some content here");
        assert_ne!(a, b);
    }

    #[test]
    fn point_id_only_uses_first_200_chars_of_content() {
        let long_tail = "x".repeat(500);
        let a = point_id(1, "code", "f.py", &format!("{}{}", "a".repeat(200), long_tail));
        let b = point_id(
            1,
            "code",
            "f.py",
            &format!("{}{}", "a".repeat(200), "y".repeat(500)),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn item_type_tag_matches_variant() {
        assert_eq!(item_type_tag(&issue_chunk().metadata), "issue");
    }

    #[test]
    fn chunk_point_payload_flattens_metadata_and_content() {
        let point = ChunkPoint {
            id: point_id(42, "issue", "1", "Issue #1: Login fails"),
            vector: vec![0.1, 0.2],
            chunk: issue_chunk(),
        };
        let payload = point.payload();
        assert_eq!(
            payload.get(fields::TYPE).and_then(|v| v.as_str()),
            Some("issue")
        );
        assert_eq!(
            payload.get(fields::CONTENT).and_then(|v| v.as_str()),
            Some("Issue #1: Login fails")
        );
        assert_eq!(
            payload
                .get(fields::TOKEN_COUNT)
                .and_then(|v| v.as_integer()),
            Some(5)
        );
        assert_eq!(
            payload.get(fields::PROJECT_ID).and_then(|v| v.as_integer()),
            Some(42)
        );
    }
}
