//! Stop command - stop an in-progress index or sync run

use anyhow::Result;
use clap::Args;

use super::{build_orchestrator, load_config, print_info};
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct StopArgs {
    /// GitLab project id
    gitlab_id: i64,
}

pub async fn execute(args: StopArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let orchestrator = build_orchestrator(&config).await?;
    orchestrator.stop(args.gitlab_id)?;
    print_info(&format!("Stopped project {}.", args.gitlab_id), global.quiet);
    Ok(())
}
