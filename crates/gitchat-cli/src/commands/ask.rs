//! Ask command - run the code analysis agent over one project's repository

use anyhow::Result;
use clap::Args;

use super::{build_agent, load_config};
use crate::progress::spinner;
use crate::GlobalOptions;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// GitLab project id whose cloned repository the agent should read
    #[arg(long)]
    project: i64,

    /// Natural-language question about the repository
    query: String,
}

pub async fn execute(args: AskArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let agent = build_agent(&config)?;
    let repo_path = config.storage.repos_path.join(args.project.to_string());

    let pb = spinner("Analyzing repository...", global.quiet);
    let answer = agent.analyze(&repo_path, &args.query).await?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    println!("{}", answer.answer);
    if !global.quiet && !answer.tool_calls.is_empty() {
        eprintln!("\n({} tool call(s) made)", answer.tool_calls.len());
    }
    Ok(())
}
