//! Status command - show a project's indexing status

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::{build_manifest, load_config};
use crate::GlobalOptions;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// GitLab project id
    gitlab_id: i64,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ProjectStatus {
    status: String,
    is_indexed: bool,
    error: Option<String>,
    last_indexed_at: Option<String>,
    last_indexed_commit: Option<String>,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, _global: GlobalOptions) -> Result<()> {
    let config = load_config(&_global)?;
    let manifest = build_manifest(&config)?;
    let manifest = manifest.lock().expect("manifest mutex poisoned");

    let project = manifest
        .get_project(args.gitlab_id)?
        .ok_or_else(|| anyhow::anyhow!("no project with GitLab id {} is known", args.gitlab_id))?;

    let status = ProjectStatus {
        status: project.indexing_status.to_string(),
        is_indexed: project.is_indexed,
        error: project.indexing_error,
        last_indexed_at: project.last_indexed_at.map(|dt| dt.to_rfc3339()),
        last_indexed_commit: project.last_indexed_commit,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("status:          {}", status.status);
        println!("indexed:         {}", status.is_indexed);
        if let Some(err) = &status.error {
            println!("error:           {err}");
        }
        if let Some(at) = &status.last_indexed_at {
            println!("last indexed at: {at}");
        }
        if let Some(commit) = &status.last_indexed_commit {
            println!("last commit:     {commit}");
        }
    }
    Ok(())
}
