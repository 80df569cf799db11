//! Gitchat configuration management.
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.gitchat/config.toml`
//! - Local config: `.gitchat/config.toml` (in a project workspace)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides → env.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for gitchat.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GitchatConfig {
    /// GitLab API client configuration
    pub gitlab: GitlabConfig,

    /// LLM provider configuration (query planning, chat, code analysis)
    pub llm: LlmConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Vector store and manifest storage configuration
    pub storage: StorageConfig,

    /// Chunking configuration
    pub chunking: ChunkingConfig,

    /// Retrieval configuration
    pub retrieval: RetrievalConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// GitLab API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitlabConfig {
    /// Base GitLab instance URL, e.g. `https://gitlab.com`
    pub url: String,

    /// Environment variable name containing the `PRIVATE-TOKEN` personal access token
    pub pat_env: String,

    /// Per-request timeout, in seconds
    pub timeout_secs: u64,

    /// Minimum interval between requests, in milliseconds
    pub min_request_interval_ms: u64,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pat_env: "GITLAB_PAT".to_string(),
            timeout_secs: 30,
            min_request_interval_ms: 100,
        }
    }
}

/// LLM provider configuration, used by the query planner, hybrid retriever
/// and code analysis agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which LLM provider to use
    pub provider: LlmProviderType,

    /// OpenAI-compatible chat completion settings
    pub openai: OpenAIChatSettings,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderType::default(),
            openai: OpenAIChatSettings::default(),
        }
    }
}

/// LLM provider type selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LlmProviderType {
    /// OpenAI-compatible chat completions API (default)
    #[default]
    Openai,
}

/// OpenAI-compatible chat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIChatSettings {
    /// API base URL
    pub base_url: String,

    /// Environment variable name containing the API key
    pub api_key_env: String,

    /// Chat completion model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retry attempts
    pub max_retries: u32,
}

impl Default for OpenAIChatSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Embedding provider configuration.
///
/// Controls which provider generates embeddings for semantic search.
///
/// # Example TOML
///
/// ```toml
/// [embedding]
/// provider = "local"  # or "openai"
///
/// [embedding.local]
/// url = "http://localhost:8001"
/// dimension = 384
///
/// [embedding.openai]
/// url = "https://api.openai.com/v1"
/// api_key_env = "OPENAI_API_KEY"
/// model = "text-embedding-3-small"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which embedding provider to use
    pub provider: EmbeddingProviderType,

    /// Local HTTP embedding service settings (required when provider = "local")
    pub local: Option<LocalEmbeddingSettings>,

    /// OpenAI-compatible provider settings (required when provider = "openai")
    pub openai: Option<OpenAIEmbeddingSettings>,
}

impl EmbeddingConfig {
    /// Validate that required settings exist for the selected provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider {
            EmbeddingProviderType::Local => {
                let Some(settings) = self.local.as_ref() else {
                    return Err(ConfigError::ValidationError(
                        "embedding.provider is 'local' but [embedding.local] section is missing"
                            .to_string(),
                    ));
                };
                if settings.url.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "embedding.local.url is required".to_string(),
                    ));
                }
                if settings.dimension == 0 {
                    return Err(ConfigError::ValidationError(
                        "embedding.local.dimension must be non-zero".to_string(),
                    ));
                }
                Ok(())
            }
            EmbeddingProviderType::Openai => {
                let Some(settings) = self.openai.as_ref() else {
                    return Err(ConfigError::ValidationError(
                        "embedding.provider is 'openai' but [embedding.openai] section is missing"
                            .to_string(),
                    ));
                };
                if settings.url.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "embedding.openai.url is required".to_string(),
                    ));
                }
                if settings.model.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "embedding.openai.model is required".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Embedding vector dimension for the selected provider, if known.
    pub fn dimension(&self) -> Option<u32> {
        match self.provider {
            EmbeddingProviderType::Local => self.local.as_ref().map(|s| s.dimension),
            EmbeddingProviderType::Openai => self.openai.as_ref().map(|s| s.dimension),
        }
    }
}

/// Embedding provider type selection.
///
/// The spec's original Python backend also supported an Azure ML provider;
/// this workspace only ever reaches two.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// Local, out-of-process HTTP embedding service (default)
    #[default]
    Local,
    /// OpenAI-compatible embeddings API
    Openai,
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Openai => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::Openai),
            _ => Err(ConfigError::ValidationError(format!(
                "Unknown embedding provider: '{}'. Valid values: local, openai",
                s
            ))),
        }
    }
}

/// Local HTTP embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEmbeddingSettings {
    /// Base URL of the local embedding HTTP service
    pub url: String,

    /// Vector dimension returned by the service
    pub dimension: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retry attempts
    pub max_retries: u32,
}

impl Default for LocalEmbeddingSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001".to_string(),
            dimension: 384,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// OpenAI-compatible embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIEmbeddingSettings {
    /// API base URL
    pub url: String,

    /// Environment variable name containing the API key
    pub api_key_env: String,

    /// Embedding model name
    pub model: String,

    /// Vector dimension produced by the model
    pub dimension: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retry attempts
    pub max_retries: u32,
}

impl Default for OpenAIEmbeddingSettings {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Storage configuration: the Qdrant vector store and the local SQLite
/// manifest database, plus the on-disk checkout root for cloned projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Qdrant configuration
    pub qdrant: QdrantConfig,

    /// Path to the SQLite manifest database file
    pub manifest_path: PathBuf,

    /// Root directory under which project repositories are cloned
    pub repos_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            qdrant: QdrantConfig::default(),
            manifest_path: PathBuf::from(".gitchat/manifest.db"),
            repos_path: PathBuf::from("/app/repos"),
        }
    }
}

/// Qdrant vector database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    /// Qdrant host
    pub host: String,

    /// Qdrant gRPC port
    pub port: u16,

    /// API key for authentication (optional)
    pub api_key: Option<String>,

    /// Collection name holding all indexed content
    pub collection_name: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6334,
            api_key: None,
            collection_name: "gitlab_content".to_string(),
        }
    }
}

impl QdrantConfig {
    /// Build the gRPC connection URL for this configuration.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk
    pub chunk_size: usize,

    /// Token overlap between consecutive chunks of the same source text
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of results returned by a retrieval call
    pub top_k_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k_results: 10 }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,

    /// Log file path (optional; stderr if unset)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments and environment variables over
/// file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override GitLab URL
    pub gitlab_url: Option<String>,

    /// Override Qdrant host
    pub qdrant_host: Option<String>,

    /// Override Qdrant port
    pub qdrant_port: Option<u16>,

    /// Override manifest database path
    pub manifest_path: Option<PathBuf>,

    /// Override repos checkout path
    pub repos_path: Option<PathBuf>,

    /// Override embedding provider type
    pub embedding_provider: Option<EmbeddingProviderType>,

    /// Override chunk size
    pub chunk_size: Option<usize>,

    /// Override chunk overlap
    pub chunk_overlap: Option<usize>,

    /// Override top_k_results
    pub top_k_results: Option<usize>,

    /// Override log level
    pub log_level: Option<String>,
}

impl GitchatConfig {
    /// Apply CLI/env overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref url) = overrides.gitlab_url {
            self.gitlab.url = url.clone();
        }

        if let Some(ref host) = overrides.qdrant_host {
            self.storage.qdrant.host = host.clone();
        }

        if let Some(port) = overrides.qdrant_port {
            self.storage.qdrant.port = port;
        }

        if let Some(ref path) = overrides.manifest_path {
            self.storage.manifest_path = path.clone();
        }

        if let Some(ref path) = overrides.repos_path {
            self.storage.repos_path = path.clone();
        }

        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }

        if let Some(chunk_size) = overrides.chunk_size {
            self.chunking.chunk_size = chunk_size;
        }

        if let Some(chunk_overlap) = overrides.chunk_overlap {
            self.chunking.chunk_overlap = chunk_overlap;
        }

        if let Some(top_k) = overrides.top_k_results {
            self.retrieval.top_k_results = top_k;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    ///
    /// Checks that all required settings exist for the selected providers
    /// and that the GitLab URL is present (the one setting that has no
    /// sensible default).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gitlab.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "gitlab.url is required (set GITLAB_URL or [gitlab].url)".to_string(),
            ));
        }
        self.embedding.validate()?;
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        Ok(())
    }

    /// Resolve the manifest database path relative to a workspace root.
    pub fn manifest_path(&self, workspace_root: &std::path::Path) -> PathBuf {
        if self.storage.manifest_path.is_absolute() {
            self.storage.manifest_path.clone()
        } else {
            workspace_root.join(&self.storage.manifest_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GitchatConfig::default();
        assert_eq!(config.storage.qdrant.host, "localhost");
        assert_eq!(config.storage.qdrant.port, 6334);
        assert_eq!(config.chunking.chunk_size, 512);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k_results, 10);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Local);
    }

    #[test]
    fn test_qdrant_url() {
        let config = QdrantConfig::default();
        assert_eq!(config.url(), "http://localhost:6334");
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = GitchatConfig::default();
        let overrides = ConfigOverrides {
            gitlab_url: Some("https://gitlab.example.com".to_string()),
            qdrant_host: Some("qdrant.internal".to_string()),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.gitlab.url, "https://gitlab.example.com");
        assert_eq!(config.storage.qdrant.host, "qdrant.internal");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_manifest_path_resolution() {
        let config = GitchatConfig::default();
        let workspace = PathBuf::from("/home/user/project");

        let path = config.manifest_path(&workspace);
        assert_eq!(
            path,
            PathBuf::from("/home/user/project/.gitchat/manifest.db")
        );
    }

    #[test]
    fn test_manifest_path_absolute() {
        let mut config = GitchatConfig::default();
        config.storage.manifest_path = PathBuf::from("/data/manifest.db");
        let workspace = PathBuf::from("/home/user/project");

        let path = config.manifest_path(&workspace);
        assert_eq!(path, PathBuf::from("/data/manifest.db"));
    }

    #[test]
    fn test_embedding_provider_type_display() {
        assert_eq!(EmbeddingProviderType::Local.to_string(), "local");
        assert_eq!(EmbeddingProviderType::Openai.to_string(), "openai");
    }

    #[test]
    fn test_embedding_provider_type_from_str() {
        assert_eq!(
            "local".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::Local
        );
        assert_eq!(
            "openai".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::Openai
        );
        assert!("azure-ml".parse::<EmbeddingProviderType>().is_err());
    }

    #[test]
    fn test_embedding_config_validate_local() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Local,
            local: Some(LocalEmbeddingSettings::default()),
            openai: None,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedding_config_validate_local_missing() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Local,
            local: None,
            openai: None,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("embedding.local"));
    }

    #[test]
    fn test_embedding_config_validate_openai_missing() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            local: None,
            openai: None,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_embedding_config_validate_openai_valid() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            local: None,
            openai: Some(OpenAIEmbeddingSettings::default()),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedding_dimension() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            local: None,
            openai: Some(OpenAIEmbeddingSettings::default()),
        };
        assert_eq!(config.dimension(), Some(1536));
    }

    #[test]
    fn test_validate_requires_gitlab_url() {
        let mut config = GitchatConfig::default();
        config.embedding.local = Some(LocalEmbeddingSettings::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gitlab.url"));
    }

    #[test]
    fn test_validate_rejects_overlap_ge_chunk_size() {
        let mut config = GitchatConfig::default();
        config.gitlab.url = "https://gitlab.example.com".to_string();
        config.embedding.local = Some(LocalEmbeddingSettings::default());
        config.chunking.chunk_overlap = 512;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_apply_embedding_provider_override() {
        let mut config = GitchatConfig::default();
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Local);

        let overrides = ConfigOverrides {
            embedding_provider: Some(EmbeddingProviderType::Openai),
            ..Default::default()
        };
        config.apply_overrides(&overrides);

        assert_eq!(config.embedding.provider, EmbeddingProviderType::Openai);
    }

    #[test]
    fn test_embedding_config_toml_roundtrip() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            local: None,
            openai: Some(OpenAIEmbeddingSettings {
                url: "https://api.openai.com/v1".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                model: "text-embedding-3-small".to_string(),
                dimension: 1536,
                timeout_secs: 45,
                max_retries: 5,
            }),
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: EmbeddingConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.provider, EmbeddingProviderType::Openai);
        let openai = parsed.openai.unwrap();
        assert_eq!(openai.model, "text-embedding-3-small");
        assert_eq!(openai.timeout_secs, 45);
    }
}
