//! Shallow-clone-then-fast-forward-pull repository cache.
//!
//! Mirrors the original agent's `ensure_repo_cloned`: a missing working tree
//! is cloned with `--depth=1`; an existing one is updated with `git pull
//! --ff-only`. Both calls have hard timeouts and a timed-out subprocess is
//! treated as "no change" rather than a failure, since the stage can always
//! retry on the next run.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::warn;

const CLONE_TIMEOUT: Duration = Duration::from_secs(300);
const PULL_TIMEOUT: Duration = Duration::from_secs(60);

/// Ensure `repo_path` holds a clone of `clone_url`, cloning or
/// fast-forward-pulling as needed. Returns `true` if the working tree exists
/// afterward (a timed-out clone leaves it absent).
pub async fn ensure_repo_cloned(repo_path: &Path, clone_url: &str, pat: Option<&str>) -> bool {
    if repo_path.exists() {
        pull(repo_path).await;
        return repo_path.exists();
    }

    if let Some(parent) = repo_path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!("failed to create repo cache directory {parent:?}: {e}");
            return false;
        }
    }

    let url = match pat {
        Some(pat) if clone_url.starts_with("https://") => {
            clone_url.replacen("https://", &format!("https://oauth2:{pat}@"), 1)
        }
        _ => clone_url.to_string(),
    };

    let mut cmd = Command::new("git");
    cmd.args(["clone", "--depth=1", &url, &repo_path.to_string_lossy()])
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    match tokio::time::timeout(CLONE_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) if !output.status.success() => {
            warn!(
                "git clone failed for {repo_path:?}: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(Err(e)) => warn!("failed to spawn git clone for {repo_path:?}: {e}"),
        Err(_) => warn!("git clone timed out after {CLONE_TIMEOUT:?} for {repo_path:?}"),
        Ok(Ok(_)) => {}
    }

    repo_path.exists()
}

/// Fast-forward-only pull an existing working tree. Swallows failures and
/// timeouts; the caller falls back to whatever HEAD already exists on disk.
async fn pull(repo_path: &Path) {
    let mut cmd = Command::new("git");
    cmd.args(["pull", "--ff-only"])
        .current_dir(repo_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    match tokio::time::timeout(PULL_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) if !output.status.success() => {
            warn!(
                "git pull --ff-only failed for {repo_path:?}: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(Err(e)) => warn!("failed to spawn git pull for {repo_path:?}: {e}"),
        Err(_) => warn!("git pull timed out after {PULL_TIMEOUT:?} for {repo_path:?}"),
        Ok(Ok(_)) => {}
    }
}

/// Current HEAD commit hash of a working tree, or `None` if it cannot be
/// determined (not a git repo, no commits, command failure).
pub async fn current_head(repo_path: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_path)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let head = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if head.is_empty() {
        None
    } else {
        Some(head)
    }
}

/// File paths that differ between `base` and `head` (added, modified or
/// renamed), relative to `repo_path`. Deleted paths are intentionally
/// excluded by the `--diff-filter`: the incremental code stage only
/// re-indexes files that still exist.
pub async fn changed_files(repo_path: &Path, base: &str, head: &str) -> Vec<String> {
    if base == head {
        return Vec::new();
    }

    let output = Command::new("git")
        .args([
            "diff",
            "--name-only",
            "--diff-filter=ACMR",
            &format!("{base}..{head}"),
        ])
        .current_dir(repo_path)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        Ok(output) => {
            warn!(
                "git diff failed for {repo_path:?}: {}",
                String::from_utf8_lossy(&output.stderr)
            );
            Vec::new()
        }
        Err(e) => {
            warn!("failed to spawn git diff for {repo_path:?}: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn changed_files_short_circuits_when_base_equals_head() {
        let files = changed_files(Path::new("/nonexistent"), "abc123", "abc123").await;
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn current_head_is_none_for_a_non_repo_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(current_head(tmp.path()).await.is_none());
    }
}
