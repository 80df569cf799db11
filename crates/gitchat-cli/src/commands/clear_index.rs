//! Clear-index command - remove a project's indexed content

use anyhow::Result;
use clap::Args;

use super::{build_orchestrator, load_config, print_info};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct ClearIndexArgs {
    /// GitLab project id
    gitlab_id: i64,
}

pub async fn execute(args: ClearIndexArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let orchestrator = build_orchestrator(&config).await?;
    orchestrator.clear_index(args.gitlab_id).await?;
    print_info(
        &format!("Cleared indexed content for project {}.", args.gitlab_id),
        global.quiet,
    );
    Ok(())
}
