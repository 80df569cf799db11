//! Index command - run a full index of one project

use anyhow::Result;
use clap::Args;

use gitchat_indexer::RunRequestOutcome;

use super::{build_orchestrator, load_config, print_info};
use crate::progress::spinner;
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// GitLab project id
    gitlab_id: i64,
}

pub async fn execute(args: IndexArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let orchestrator = build_orchestrator(&config).await?;

    let pb = spinner(&format!("Indexing project {}...", args.gitlab_id), global.quiet);
    let outcome = orchestrator.run_full_index(args.gitlab_id).await?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match outcome {
        RunRequestOutcome::Started => {
            print_info(&format!("Index started for project {}.", args.gitlab_id), global.quiet);
        }
        RunRequestOutcome::AlreadyIndexing => {
            print_info(
                &format!("Project {} is already indexing or syncing.", args.gitlab_id),
                global.quiet,
            );
        }
    }
    Ok(())
}
