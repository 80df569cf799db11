//! Qdrant vector store client, payload schema and embedding providers for
//! the `gitlab_content` collection.
//!
//! # Example
//!
//! ```ignore
//! use gitchat_search::{QdrantStore, QdrantConfig, CollectionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = QdrantStore::connect(QdrantConfig::default()).await?;
//!     store.ensure_collection(&CollectionConfig::new(1536)).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod embeddings;
pub mod error;
pub mod schema;

pub use client::{QdrantConfig, QdrantStore};
pub use error::{Result, SearchError};
pub use schema::{point_id, ChunkPoint, CollectionConfig, SearchHit, COLLECTION_NAME};

pub use embeddings::{
    build_provider, EmbeddingProvider, EmbeddingProviderType, LocalHttpConfig, LocalHttpProvider,
    OpenAiConfig, OpenAiProvider, ProviderStatus,
};
