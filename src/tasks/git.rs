use std::path::Path;

use anyhow::anyhow;
use tokio::process::Command;
use tracing::info;

use crate::shared::AppState;
use crate::tasks::{write_output, Result, TaskError, TaskRequest};

const CLONE_DEST: &str = "/data/repo";
const MARKER_FILE: &str = "automation.txt";
const COMMIT_MESSAGE: &str = "Automated commit by the automation agent";

async fn git(args: &[&str], dir: Option<&Path>) -> Result<String> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let out = command
        .output()
        .await
        .map_err(|e| anyhow!("failed to launch git: {}", e))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(TaskError::External(anyhow!(
            "git {} exited with {}: {}",
            args.first().unwrap_or(&""),
            out.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

/// Clone a repository under the data root, drop a marker file into it, and
/// commit the change. Identity is pinned per invocation so the commit never
/// depends on host-level git config.
pub async fn clone_and_commit(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let url = req
        .url()
        .ok_or_else(|| TaskError::MissingInput("a repository URL in the task".to_string()))?;
    let dest = state.sandbox.resolve(&req.path_or(0, CLONE_DEST))?;

    if dest.exists() {
        return Err(TaskError::Rejected(format!(
            "{} already exists; clone destination must be fresh",
            dest.display()
        )));
    }

    info!(%url, dest = %dest.display(), "cloning repository");
    let dest_str = dest.to_string_lossy();
    git(&["clone", "--depth", "1", url.as_str(), dest_str.as_ref()], None).await?;

    let marker = dest.join(MARKER_FILE);
    let stamp = chrono::Utc::now().to_rfc3339();
    write_output(&marker, format!("cloned from {url} at {stamp}\n")).await?;

    git(&["add", MARKER_FILE], Some(&dest)).await?;
    git(
        &[
            "-c",
            "user.name=autoagent",
            "-c",
            "user.email=autoagent@localhost",
            "commit",
            "-m",
            COMMIT_MESSAGE,
        ],
        Some(&dest),
    )
    .await?;

    Ok(format!("Cloned {} and committed {}", url, marker.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::state::test_state;

    #[tokio::test]
    async fn tasks_without_a_repo_url_are_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let req = TaskRequest {
            task: "clone a git repo and make a commit",
            email: None,
            paths: vec![],
        };
        let err = clone_and_commit(&state, &req).await.unwrap_err();
        assert!(matches!(err, TaskError::MissingInput(_)));
    }

    #[tokio::test]
    async fn existing_destination_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        std::fs::create_dir(dir.path().join("repo")).unwrap();

        let req = TaskRequest {
            task: "clone https://example.com/a.git",
            email: None,
            paths: vec!["repo".to_string()],
        };
        let err = clone_and_commit(&state, &req).await.unwrap_err();
        assert!(matches!(err, TaskError::Rejected(_)));
    }
}
