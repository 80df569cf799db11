//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.gitchat/config.toml`
//! 2. Local config: `.gitchat/config.toml` (in workspace)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{ConfigOverrides, GitchatConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".gitchat";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".gitchat";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.gitchat`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<GitchatConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.gitchat`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a workspace.
    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<GitchatConfig, ConfigError> {
        let mut config = GitchatConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(workspace_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<GitchatConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;

        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a workspace.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<GitchatConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Save configuration to the global config file.
    pub fn save_global(&self, config: &GitchatConfig) -> Result<(), ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        let global_path = global_dir.join(CONFIG_FILE_NAME);
        save_config_file(&global_path, config)
    }

    /// Save configuration to the local config file for a workspace.
    pub fn save_local(
        &self,
        workspace_root: &Path,
        config: &GitchatConfig,
    ) -> Result<(), ConfigError> {
        let local_path = self.local_config_path(workspace_root);
        save_config_file(&local_path, config)
    }

    /// Initialize global configuration directory.
    ///
    /// Creates `~/.gitchat/config.toml` with default configuration.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        if !global_dir.exists() {
            std::fs::create_dir_all(global_dir)
                .map_err(|e| ConfigError::create_dir(global_dir, e))?;
        }

        let config_path = global_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            let default_config = GitchatConfig::default();
            save_config_file(&config_path, &default_config)?;
        }

        Ok(config_path)
    }

    /// Initialize local configuration for a workspace.
    ///
    /// Creates `.gitchat/config.toml` with default configuration.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        let local_dir = workspace_root.join(LOCAL_CONFIG_DIR);

        if !local_dir.exists() {
            std::fs::create_dir_all(&local_dir)
                .map_err(|e| ConfigError::create_dir(&local_dir, e))?;
        }

        let config_path = local_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            let default_config = GitchatConfig::default();
            save_config_file(&config_path, &default_config)?;
        }

        Ok(config_path)
    }

    /// Clear cached global configuration.
    ///
    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path) -> Result<GitchatConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &GitchatConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// This performs a field-by-field merge, allowing partial configs.
fn merge_configs(base: GitchatConfig, overlay: GitchatConfig) -> GitchatConfig {
    GitchatConfig {
        gitlab: merge_gitlab(base.gitlab, overlay.gitlab),
        llm: merge_llm(base.llm, overlay.llm),
        embedding: merge_embedding(base.embedding, overlay.embedding),
        storage: merge_storage(base.storage, overlay.storage),
        chunking: merge_chunking(base.chunking, overlay.chunking),
        retrieval: merge_retrieval(base.retrieval, overlay.retrieval),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_gitlab(base: crate::GitlabConfig, overlay: crate::GitlabConfig) -> crate::GitlabConfig {
    crate::GitlabConfig {
        url: if overlay.url.is_empty() {
            base.url
        } else {
            overlay.url
        },
        pat_env: if overlay.pat_env != "GITLAB_PAT" {
            overlay.pat_env
        } else {
            base.pat_env
        },
        timeout_secs: if overlay.timeout_secs != 30 {
            overlay.timeout_secs
        } else {
            base.timeout_secs
        },
        min_request_interval_ms: if overlay.min_request_interval_ms != 100 {
            overlay.min_request_interval_ms
        } else {
            base.min_request_interval_ms
        },
    }
}

/// Merge LLM config. The chat model name is the only field likely to
/// differ from default in practice; overlay wins whenever it deviates.
fn merge_llm(base: crate::LlmConfig, overlay: crate::LlmConfig) -> crate::LlmConfig {
    crate::LlmConfig {
        provider: overlay.provider,
        openai: crate::OpenAIChatSettings {
            base_url: if overlay.openai.base_url != "https://api.openai.com/v1" {
                overlay.openai.base_url
            } else {
                base.openai.base_url
            },
            api_key_env: if overlay.openai.api_key_env != "OPENAI_API_KEY" {
                overlay.openai.api_key_env
            } else {
                base.openai.api_key_env
            },
            model: if overlay.openai.model != "gpt-4o" {
                overlay.openai.model
            } else {
                base.openai.model
            },
            timeout_secs: if overlay.openai.timeout_secs != 30 {
                overlay.openai.timeout_secs
            } else {
                base.openai.timeout_secs
            },
            max_retries: if overlay.openai.max_retries != 3 {
                overlay.openai.max_retries
            } else {
                base.openai.max_retries
            },
        },
    }
}

/// Merge embedding config.
fn merge_embedding(
    base: crate::EmbeddingConfig,
    overlay: crate::EmbeddingConfig,
) -> crate::EmbeddingConfig {
    crate::EmbeddingConfig {
        provider: if overlay.provider != crate::EmbeddingProviderType::Local {
            overlay.provider
        } else {
            base.provider
        },
        local: overlay.local.or(base.local),
        openai: overlay.openai.or(base.openai),
    }
}

/// Merge storage config, overlay values override base.
fn merge_storage(
    base: crate::StorageConfig,
    overlay: crate::StorageConfig,
) -> crate::StorageConfig {
    crate::StorageConfig {
        qdrant: merge_qdrant(base.qdrant, overlay.qdrant),
        manifest_path: if overlay.manifest_path != PathBuf::from(".gitchat/manifest.db") {
            overlay.manifest_path
        } else {
            base.manifest_path
        },
        repos_path: if overlay.repos_path != PathBuf::from("/app/repos") {
            overlay.repos_path
        } else {
            base.repos_path
        },
    }
}

/// Merge Qdrant config.
fn merge_qdrant(base: crate::QdrantConfig, overlay: crate::QdrantConfig) -> crate::QdrantConfig {
    crate::QdrantConfig {
        host: if overlay.host != "localhost" {
            overlay.host
        } else {
            base.host
        },
        port: if overlay.port != 6334 {
            overlay.port
        } else {
            base.port
        },
        api_key: overlay.api_key.or(base.api_key),
        collection_name: if overlay.collection_name != "gitlab_content" {
            overlay.collection_name
        } else {
            base.collection_name
        },
    }
}

fn merge_chunking(
    base: crate::ChunkingConfig,
    overlay: crate::ChunkingConfig,
) -> crate::ChunkingConfig {
    crate::ChunkingConfig {
        chunk_size: if overlay.chunk_size != 512 {
            overlay.chunk_size
        } else {
            base.chunk_size
        },
        chunk_overlap: if overlay.chunk_overlap != 50 {
            overlay.chunk_overlap
        } else {
            base.chunk_overlap
        },
    }
}

fn merge_retrieval(
    base: crate::RetrievalConfig,
    overlay: crate::RetrievalConfig,
) -> crate::RetrievalConfig {
    crate::RetrievalConfig {
        top_k_results: if overlay.top_k_results != 10 {
            overlay.top_k_results
        } else {
            base.top_k_results
        },
    }
}

/// Merge logging config.
fn merge_logging(
    base: crate::LoggingConfig,
    overlay: crate::LoggingConfig,
) -> crate::LoggingConfig {
    crate::LoggingConfig {
        level: if overlay.level != "info" {
            overlay.level
        } else {
            base.level
        },
        format: overlay.format,
        file: overlay.file.or(base.file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config(content: &str, dir: &Path, filename: &str) -> PathBuf {
        let config_dir = dir.join(".gitchat");
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join(filename);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.storage.qdrant.host, "localhost");
        assert_eq!(config.storage.qdrant.port, 6334);
    }

    #[test]
    fn test_load_local_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        create_test_config(
            r#"
            [gitlab]
            url = "https://gitlab.example.com"

            [storage.qdrant]
            host = "custom-qdrant"
            "#,
            temp.path(),
            "config.toml",
        );

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.gitlab.url, "https://gitlab.example.com");
        assert_eq!(config.storage.qdrant.host, "custom-qdrant");
    }

    #[test]
    fn test_global_overrides_default() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
            [logging]
            level = "debug"

            [storage.qdrant]
            host = "global-qdrant"
            "#,
        )
        .unwrap();

        create_test_config(
            r#"
            [storage.qdrant]
            host = "local-qdrant"
            "#,
            temp.path(),
            "config.toml",
        );

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.storage.qdrant.host, "local-qdrant");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_all() {
        let temp = TempDir::new().unwrap();

        create_test_config(
            r#"
            [storage.qdrant]
            host = "local-qdrant"
            "#,
            temp.path(),
            "config.toml",
        );

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let overrides = ConfigOverrides {
            qdrant_host: Some("cli-qdrant".to_string()),
            log_level: Some("trace".to_string()),
            ..Default::default()
        };

        let config = loader.load(temp.path(), Some(&overrides)).unwrap();

        assert_eq!(config.storage.qdrant.host, "cli-qdrant");
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let mut config = GitchatConfig::default();
        config.storage.qdrant.host = "saved-qdrant".to_string();
        config.logging.level = "warn".to_string();

        loader.save_local(temp.path(), &config).unwrap();

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let loaded = loader.load(temp.path(), None).unwrap();

        assert_eq!(loaded.storage.qdrant.host, "saved-qdrant");
        assert_eq!(loaded.logging.level, "warn");
    }

    #[test]
    fn test_init_local_creates_config() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config_path = loader.init_local(temp.path()).unwrap();

        assert!(config_path.exists());
        assert!(config_path.ends_with(".gitchat/config.toml"));

        let content = std::fs::read_to_string(&config_path).unwrap();
        let _: GitchatConfig = toml::from_str(&content).unwrap();
    }

    #[test]
    fn test_cache_clearing() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            r#"
            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let mut loader = ConfigLoader::with_global_dir(&global_dir);

        let _ = loader.load_global().unwrap();
        assert!(loader.global_config.is_some());

        loader.clear_cache();
        assert!(loader.global_config.is_none());
    }
}
