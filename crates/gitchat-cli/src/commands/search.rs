//! Search command - hybrid retrieval query across selected projects

use anyhow::Result;
use clap::{Args, ValueEnum};

use super::{build_manifest, build_retriever, load_config, print_info};
use crate::GlobalOptions;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    query: String,

    /// Restrict the search to these GitLab project ids. Defaults to every
    /// selected project.
    #[arg(long = "project")]
    projects: Vec<i64>,

    /// Maximum number of results to return
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Output format: text (default), json
    #[arg(long, short = 'o', default_value = "text")]
    output: OutputFormat,
}

/// Execute the search command
pub async fn execute(args: SearchArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;

    let project_ids = if args.projects.is_empty() {
        let manifest = build_manifest(&config)?;
        let manifest = manifest.lock().expect("manifest mutex poisoned");
        manifest
            .list_selected_projects()?
            .into_iter()
            .map(|p| p.gitlab_id)
            .collect::<Vec<_>>()
    } else {
        args.projects.clone()
    };

    if project_ids.is_empty() {
        print_info("No projects selected. Run `gitchat projects select <id>` first.", global.quiet);
        return Ok(());
    }

    let (planner, retriever) = build_retriever(&config).await?;
    let plan = planner.plan(&args.query).await;
    let top_k = args.limit.unwrap_or(config.retrieval.top_k_results);
    let records = retriever.retrieve(&plan, &project_ids, top_k).await;

    if records.is_empty() {
        if !global.quiet {
            eprintln!("No results found for: {}", args.query);
        }
        return Ok(());
    }

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Text => {
            for (i, record) in records.iter().enumerate() {
                println!(
                    "{:>3}. [{:.3}] {} ({})",
                    i + 1,
                    record.score,
                    record.id,
                    record.content_type
                );
                let snippet: String = record.content.chars().take(200).collect();
                println!("     {}", snippet.replace('\n', " "));
            }
        }
    }

    Ok(())
}
