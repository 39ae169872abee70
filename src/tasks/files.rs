use std::path::PathBuf;

use anyhow::anyhow;
use serde_json::Value;
use tokio::process::Command;
use tracing::info;

use crate::shared::AppState;
use crate::tasks::{read_input, write_output, Result, TaskError, TaskRequest};

const FORMAT_DEFAULT: &str = "/data/format.md";
const CONTACTS_INPUT: &str = "/data/contacts.json";
const CONTACTS_OUTPUT: &str = "/data/contacts-sorted.json";
const LOGS_DIR: &str = "/data/logs";
const LOGS_OUTPUT: &str = "/data/logs-recent.txt";
const RECENT_LOG_COUNT: usize = 10;

/// Format a markdown file in place with prettier, invoked as a subprocess.
pub async fn format_markdown(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let target = state.sandbox.resolve(&req.path_or(0, FORMAT_DEFAULT))?;

    if !target.exists() {
        return Err(TaskError::MissingInput(target.display().to_string()));
    }

    info!(target = %target.display(), "running prettier");
    let out = Command::new("npx")
        .arg("-y")
        .arg("prettier@3.4.2")
        .arg("--write")
        .arg(&target)
        .output()
        .await
        .map_err(|e| anyhow!("failed to launch prettier: {}", e))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(TaskError::External(anyhow!(
            "prettier exited with {}: {}",
            out.status,
            stderr.trim()
        )));
    }

    Ok(format!("Formatted {} with prettier", target.display()))
}

fn contact_key(contact: &Value) -> (String, String) {
    let field = |name: &str| {
        contact
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    (field("last_name"), field("first_name"))
}

/// Sort a JSON array of contacts by last name, then first name, ascending.
/// Fields beyond the two names are carried through untouched.
pub async fn sort_contacts(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let input = state.sandbox.resolve(&req.path_or(0, CONTACTS_INPUT))?;
    let output = state.sandbox.resolve(&req.path_or(1, CONTACTS_OUTPUT))?;

    let contents = read_input(&input).await?;
    let mut contacts: Vec<Value> = serde_json::from_str(&contents)
        .map_err(|e| anyhow!("{} is not a JSON array of contacts: {}", input.display(), e))?;

    contacts.sort_by_key(contact_key);

    let sorted = serde_json::to_string(&contacts).map_err(|e| anyhow!(e))?;
    write_output(&output, sorted).await?;

    Ok(format!(
        "Sorted {} contacts into {}",
        contacts.len(),
        output.display()
    ))
}

/// Write the first line of the most recently modified `.log` files, most
/// recent first.
pub async fn recent_log_lines(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let logs_dir = state.sandbox.resolve(&req.path_or(0, LOGS_DIR))?;
    let output = state.sandbox.resolve(&req.path_or(1, LOGS_OUTPUT))?;

    let mut entries = match std::fs::read_dir(&logs_dir) {
        Ok(iter) => iter
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "log"))
            .collect::<Vec<PathBuf>>(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TaskError::MissingInput(logs_dir.display().to_string()))
        }
        Err(e) => {
            return Err(TaskError::External(anyhow!(
                "failed to list {}: {}",
                logs_dir.display(),
                e
            )))
        }
    };

    // newest first, by modification time
    entries.sort_by_cached_key(|p| {
        std::cmp::Reverse(
            p.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        )
    });

    let mut first_lines = Vec::new();
    for path in entries.iter().take(RECENT_LOG_COUNT) {
        let contents = read_input(path).await?;
        first_lines.push(contents.lines().next().unwrap_or_default().to_string());
    }

    let count = first_lines.len();
    write_output(&output, first_lines.join("\n")).await?;

    Ok(format!(
        "Wrote the first line of {} recent log files to {}",
        count,
        output.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::state::test_state;

    fn request(paths: &[&str]) -> TaskRequest<'static> {
        TaskRequest {
            task: "",
            email: None,
            paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn sorts_contacts_by_last_then_first_name() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        std::fs::write(
            dir.path().join("contacts.json"),
            r#"[{"first_name":"B","last_name":"Z"},{"first_name":"A","last_name":"A"}]"#,
        )
        .unwrap();

        sort_contacts(&state, &request(&["contacts.json", "sorted.json"]))
            .await
            .unwrap();

        let sorted: Vec<Value> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("sorted.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(sorted[0]["last_name"], "A");
        assert_eq!(sorted[1]["last_name"], "Z");
    }

    #[tokio::test]
    async fn missing_contacts_file_is_a_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let err = sort_contacts(&state, &request(&["contacts.json", "sorted.json"]))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::MissingInput(_)));
    }

    #[tokio::test]
    async fn collects_first_lines_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        std::fs::write(logs.join("old.log"), "old line\nmore\n").unwrap();
        std::fs::write(logs.join("skip.txt"), "not a log\n").unwrap();
        // ensure a strictly newer mtime on the second file
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(logs.join("new.log"), "new line\nmore\n").unwrap();

        recent_log_lines(&state, &request(&["logs", "recent.txt"]))
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("recent.txt")).unwrap();
        assert_eq!(written, "new line\nold line");
    }
}
