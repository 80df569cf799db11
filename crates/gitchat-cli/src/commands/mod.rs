//! CLI command implementations and the shared handles they're built from.

pub mod ask;
pub mod clear_index;
pub mod index;
pub mod projects;
pub mod search;
pub mod status;
pub mod stop;
pub mod sync;

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use gitchat_agent::CodeAnalysisAgent;
use gitchat_chunking::Chunker;
use gitchat_config::{ConfigLoader, GitchatConfig};
use gitchat_gitlab::{GitlabClient, GitlabClientConfig};
use gitchat_indexer::{IndexContext, Orchestrator};
use gitchat_llm::build_provider as build_llm_provider;
use gitchat_manifest::ManifestStore;
use gitchat_retrieval::{HybridRetriever, QueryPlanner};
use gitchat_search::{embeddings::build_provider as build_embedding_provider, QdrantConfig, QdrantStore};

use crate::GlobalOptions;

/// Load the merged configuration (global -> local -> env -> CLI overrides)
/// for the current directory.
pub fn load_config(global: &GlobalOptions) -> Result<GitchatConfig> {
    let workspace = std::env::current_dir().context("failed to get current directory")?;
    let mut loader = ConfigLoader::new();
    let overrides = global.to_config_overrides();
    loader
        .load(&workspace, Some(&overrides))
        .context("failed to load configuration")
}

/// Open the manifest store at the configured path.
pub fn build_manifest(config: &GitchatConfig) -> Result<Arc<Mutex<ManifestStore>>> {
    let store = ManifestStore::open(&config.storage.manifest_path)
        .with_context(|| format!("failed to open manifest at {:?}", config.storage.manifest_path))?;
    Ok(Arc::new(Mutex::new(store)))
}

/// Build a GitLab API client from configuration, reading the PAT from the
/// environment variable `gitlab.pat_env` names.
pub fn build_gitlab_client(config: &GitchatConfig) -> Result<Arc<GitlabClient>> {
    let pat = std::env::var(&config.gitlab.pat_env).with_context(|| {
        format!(
            "GitLab personal access token not set (expected in ${})",
            config.gitlab.pat_env
        )
    })?;

    let mut gitlab_config = GitlabClientConfig::new(config.gitlab.url.clone(), pat);
    gitlab_config.timeout_secs = config.gitlab.timeout_secs;
    gitlab_config.min_request_interval_ms = config.gitlab.min_request_interval_ms;

    GitlabClient::new(gitlab_config)
        .map(Arc::new)
        .context("failed to build GitLab client")
}

/// Connect to Qdrant and ensure the collection exists at the configured
/// embedding dimension.
pub async fn build_vector_store(
    config: &GitchatConfig,
    dimension: u64,
) -> Result<Arc<QdrantStore>> {
    let store = QdrantStore::connect(QdrantConfig {
        url: config.storage.qdrant.url(),
        api_key: config.storage.qdrant.api_key.clone(),
        timeout_secs: 30,
    })
    .await
    .context("failed to connect to Qdrant")?;

    store
        .ensure_collection(&gitchat_search::CollectionConfig::new(dimension))
        .await
        .context("failed to ensure the gitlab_content collection exists")?;

    Ok(Arc::new(store))
}

/// Assemble everything the indexing orchestrator needs.
pub async fn build_index_context(config: &GitchatConfig) -> Result<IndexContext> {
    let embeddings =
        build_embedding_provider(&config.embedding).context("failed to build embedding provider")?;
    let dimension = embeddings.embedding_dim() as u64;

    let gitlab = build_gitlab_client(config)?;
    let chunker = Arc::new(
        Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)
            .context("failed to build chunker")?,
    );
    let store = build_vector_store(config, dimension).await?;
    let manifest = build_manifest(config)?;

    Ok(IndexContext {
        gitlab,
        chunker,
        embeddings,
        store,
        manifest,
        collection_name: gitchat_search::COLLECTION_NAME.to_string(),
        gitlab_url: config.gitlab.url.clone(),
        gitlab_pat: std::env::var(&config.gitlab.pat_env).ok(),
        repos_path: config.storage.repos_path.clone(),
        embedding_batch_size: 32,
    })
}

/// Build an orchestrator over a freshly-assembled index context.
pub async fn build_orchestrator(config: &GitchatConfig) -> Result<Orchestrator> {
    let ctx = build_index_context(config).await?;
    Ok(Orchestrator::new(ctx))
}

/// Build a hybrid retriever (query planner + retriever) over the configured
/// LLM, embedding provider and vector store.
pub async fn build_retriever(config: &GitchatConfig) -> Result<(QueryPlanner, HybridRetriever)> {
    let llm = build_llm_provider(&config.llm).context("failed to build LLM provider")?;
    let embeddings =
        build_embedding_provider(&config.embedding).context("failed to build embedding provider")?;
    let dimension = embeddings.embedding_dim() as u64;
    let store = build_vector_store(config, dimension).await?;
    let gitlab = build_gitlab_client(config)?;

    let planner = QueryPlanner::new(llm);
    let retriever = HybridRetriever::new(store, embeddings, gitlab);
    Ok((planner, retriever))
}

/// Build a code analysis agent over the configured LLM provider.
pub fn build_agent(config: &GitchatConfig) -> Result<CodeAnalysisAgent> {
    let llm = build_llm_provider(&config.llm).context("failed to build LLM provider")?;
    Ok(CodeAnalysisAgent::new(llm))
}

/// Print an info message to stderr, respecting `--quiet`.
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}
