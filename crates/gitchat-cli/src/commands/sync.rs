//! Sync command - incrementally sync one project, or every selected project

use anyhow::Result;
use clap::Args;
use tracing::warn;

use gitchat_indexer::RunRequestOutcome;

use super::{build_manifest, build_orchestrator, load_config, print_info};
use crate::progress::spinner;
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// GitLab project id. Omit when using --all.
    gitlab_id: Option<i64>,

    /// Sync every selected project instead of a single one
    #[arg(long, conflicts_with = "gitlab_id")]
    all: bool,
}

pub async fn execute(args: SyncArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;

    if args.all {
        let manifest = build_manifest(&config)?;
        let selected = {
            let manifest = manifest.lock().expect("manifest mutex poisoned");
            manifest.list_selected_projects()?
        };

        let orchestrator = build_orchestrator(&config).await?;
        for project in selected {
            let pb = spinner(&format!("Syncing project {}...", project.gitlab_id), global.quiet);
            match orchestrator.run_sync(project.gitlab_id).await {
                Ok(_) => print_info(&format!("Sync started for project {}.", project.gitlab_id), global.quiet),
                Err(e) => warn!("sync failed to start for project {}: {e}", project.gitlab_id),
            }
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
        }
        return Ok(());
    }

    let gitlab_id = args
        .gitlab_id
        .ok_or_else(|| anyhow::anyhow!("either a project id or --all is required"))?;

    let orchestrator = build_orchestrator(&config).await?;
    let pb = spinner(&format!("Syncing project {gitlab_id}..."), global.quiet);
    let outcome = orchestrator.run_sync(gitlab_id).await?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match outcome {
        RunRequestOutcome::Started => {
            print_info(&format!("Sync started for project {gitlab_id}."), global.quiet);
        }
        RunRequestOutcome::AlreadyIndexing => {
            print_info(
                &format!("Project {gitlab_id} is already indexing or syncing."),
                global.quiet,
            );
        }
    }
    Ok(())
}
