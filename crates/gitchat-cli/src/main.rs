//! gitchat CLI - GitLab content indexing and hybrid-retrieval chat
//!
//! # Usage
//!
//! ```bash
//! # Pull your GitLab project list into the manifest
//! gitchat projects refresh
//!
//! # Select a project and run its first full index
//! gitchat projects select 42
//! gitchat index 42
//!
//! # Ask a retrieval question across selected projects
//! gitchat search "why does the login flow redirect twice"
//!
//! # Ask the code analysis agent about one project's repository
//! gitchat ask 42 "where is the retry logic for GitLab API calls"
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// gitchat - GitLab content indexing and hybrid-retrieval chat
#[derive(Parser, Debug)]
#[command(name = "gitchat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// GitLab instance base URL
    #[arg(long, global = true, env = "GITCHAT_GITLAB_URL")]
    gitlab_url: Option<String>,

    /// Qdrant host
    #[arg(long, global = true, env = "GITCHAT_QDRANT_HOST")]
    qdrant_host: Option<String>,

    /// Qdrant port
    #[arg(long, global = true, env = "GITCHAT_QDRANT_PORT")]
    qdrant_port: Option<u16>,

    /// Path to the manifest database
    #[arg(long, global = true, env = "GITCHAT_MANIFEST_PATH")]
    manifest_path: Option<PathBuf>,

    /// Path under which project repos are cloned
    #[arg(long, global = true, env = "GITCHAT_REPOS_PATH")]
    repos_path: Option<PathBuf>,

    /// Embedding provider type (local, openai)
    #[arg(long, global = true, env = "GITCHAT_EMBEDDING_PROVIDER", value_parser = parse_embedding_provider)]
    embedding_provider: Option<gitchat_config::EmbeddingProviderType>,

    /// Chunk size override, in tokens
    #[arg(long, global = true, env = "GITCHAT_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Chunk overlap override, in tokens
    #[arg(long, global = true, env = "GITCHAT_CHUNK_OVERLAP")]
    chunk_overlap: Option<usize>,

    /// Number of results to return from a retrieval query
    #[arg(long, global = true, env = "GITCHAT_TOP_K")]
    top_k_results: Option<usize>,
}

/// Parse embedding provider from string
fn parse_embedding_provider(s: &str) -> Result<gitchat_config::EmbeddingProviderType, String> {
    s.parse()
        .map_err(|e: gitchat_config::ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> gitchat_config::ConfigOverrides {
        gitchat_config::ConfigOverrides {
            gitlab_url: self.gitlab_url.clone(),
            qdrant_host: self.qdrant_host.clone(),
            qdrant_port: self.qdrant_port,
            manifest_path: self.manifest_path.clone(),
            repos_path: self.repos_path.clone(),
            embedding_provider: self.embedding_provider,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k_results: self.top_k_results,
            log_level: None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the set of known and selected GitLab projects
    #[command(subcommand)]
    Projects(commands::projects::ProjectsCommand),

    /// Run a full index of a project
    Index(commands::index::IndexArgs),

    /// Run an incremental sync of a project (or all selected projects)
    Sync(commands::sync::SyncArgs),

    /// Show a project's indexing status
    Status(commands::status::StatusArgs),

    /// Stop an in-progress index or sync run
    Stop(commands::stop::StopArgs),

    /// Remove a project's indexed content from the vector store and manifest
    ClearIndex(commands::clear_index::ClearIndexArgs),

    /// Run a hybrid retrieval query across selected projects
    Search(commands::search::SearchArgs),

    /// Ask the code analysis agent about one project's repository
    Ask(commands::ask::AskArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Projects(cmd) => commands::projects::execute(cmd, cli.global).await,
        Commands::Index(args) => commands::index::execute(args, cli.global).await,
        Commands::Sync(args) => commands::sync::execute(args, cli.global).await,
        Commands::Status(args) => commands::status::execute(args, cli.global).await,
        Commands::Stop(args) => commands::stop::execute(args, cli.global).await,
        Commands::ClearIndex(args) => commands::clear_index::execute(args, cli.global).await,
        Commands::Search(args) => commands::search::execute(args, cli.global).await,
        Commands::Ask(args) => commands::ask::execute(args, cli.global).await,
    }
}
