//! Projects command - list, refresh, select and deselect GitLab projects

use anyhow::Result;
use clap::{Args, Subcommand};

use super::{build_gitlab_client, build_manifest, load_config, print_info};
use crate::GlobalOptions;

#[derive(Subcommand, Debug)]
pub enum ProjectsCommand {
    /// List known projects and their selection/indexing state
    List(ListArgs),

    /// Pull the full project list from GitLab into the manifest
    Refresh(RefreshArgs),

    /// Mark a project as selected for search and sync
    Select(SelectArgs),

    /// Remove a project from the selected set
    Deselect(DeselectArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show selected projects
    #[arg(long)]
    selected: bool,
}

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Only consider projects the token holder is a member of
    #[arg(long, default_value_t = true)]
    membership: bool,
}

#[derive(Args, Debug)]
pub struct SelectArgs {
    /// GitLab project id
    gitlab_id: i64,
}

#[derive(Args, Debug)]
pub struct DeselectArgs {
    /// GitLab project id
    gitlab_id: i64,
}

pub async fn execute(cmd: ProjectsCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ProjectsCommand::List(args) => list(args, global).await,
        ProjectsCommand::Refresh(args) => refresh(args, global).await,
        ProjectsCommand::Select(args) => select(args, global).await,
        ProjectsCommand::Deselect(args) => deselect(args, global).await,
    }
}

async fn list(args: ListArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let manifest = build_manifest(&config)?;
    let manifest = manifest.lock().expect("manifest mutex poisoned");

    let projects = if args.selected {
        manifest.list_selected_projects()?
    } else {
        manifest.list_projects()?
    };

    if projects.is_empty() {
        print_info("No projects known. Run `gitchat projects refresh` first.", global.quiet);
        return Ok(());
    }

    for project in projects {
        println!(
            "{:<10} {:<8} {:<8} {:<40}",
            project.gitlab_id,
            if project.is_selected { "selected" } else { "-" },
            project.indexing_status,
            project.path_with_namespace,
        );
    }
    Ok(())
}

async fn refresh(args: RefreshArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let gitlab = build_gitlab_client(&config)?;
    let manifest = build_manifest(&config)?;

    let projects = gitlab.get_projects(args.membership).await?;
    let manifest = manifest.lock().expect("manifest mutex poisoned");

    for project in &projects {
        manifest.upsert_project(
            project.id,
            &project.name,
            &project.path_with_namespace,
            project.default_branch.as_deref().unwrap_or("main"),
            &project.http_url_to_repo,
        )?;
    }

    print_info(
        &format!("Refreshed {} project(s) from GitLab.", projects.len()),
        global.quiet,
    );
    Ok(())
}

async fn select(args: SelectArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let manifest = build_manifest(&config)?;
    let manifest = manifest.lock().expect("manifest mutex poisoned");
    manifest.set_selected(args.gitlab_id, true)?;
    print_info(&format!("Selected project {}.", args.gitlab_id), global.quiet);
    Ok(())
}

async fn deselect(args: DeselectArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;
    let manifest = build_manifest(&config)?;
    let manifest = manifest.lock().expect("manifest mutex poisoned");
    manifest.set_selected(args.gitlab_id, false)?;
    print_info(&format!("Deselected project {}.", args.gitlab_id), global.quiet);
    Ok(())
}
