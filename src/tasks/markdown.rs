use anyhow::anyhow;
use pulldown_cmark::{html, Options, Parser};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::shared::AppState;
use crate::tasks::{read_input, write_output, Result, TaskError, TaskRequest};

const DOCS_DIR: &str = "/data/docs";
const DOCS_INDEX: &str = "/data/docs/index.json";
const HTML_INPUT: &str = "/data/input.md";

fn first_h1(contents: &str) -> Option<String> {
    contents
        .lines()
        .find_map(|line| line.trim_start().strip_prefix("# "))
        .map(|title| title.trim().to_string())
}

/// Build an index of every markdown file under the docs directory: relative
/// path mapped to its first H1 title.
pub async fn index_docs(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let docs_dir = state.sandbox.resolve(&req.path_or(0, DOCS_DIR))?;
    let output = state.sandbox.resolve(&req.path_or(1, DOCS_INDEX))?;

    if !docs_dir.is_dir() {
        return Err(TaskError::MissingInput(docs_dir.display().to_string()));
    }

    let mut index = Map::new();
    for entry in WalkDir::new(&docs_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !path.extension().is_some_and(|ext| ext == "md") {
            continue;
        }

        let contents = read_input(path).await?;
        let title = first_h1(&contents).unwrap_or_default();
        let rel = path
            .strip_prefix(&docs_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        index.insert(rel, Value::String(title));
    }

    let count = index.len();
    let json = serde_json::to_string(&Value::Object(index)).map_err(|e| anyhow!(e))?;
    write_output(&output, json).await?;

    Ok(format!(
        "Indexed {} markdown files into {}",
        count,
        output.display()
    ))
}

fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::empty());
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Render a markdown file to HTML.
pub async fn render_html(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let input = state.sandbox.resolve(&req.path_or(0, HTML_INPUT))?;
    let output = match req.paths.get(1) {
        Some(path) => state.sandbox.resolve(path)?,
        None => input.with_extension("html"),
    };

    let contents = read_input(&input).await?;
    write_output(&output, markdown_to_html(&contents)).await?;

    Ok(format!(
        "Converted {} to {}",
        input.display(),
        output.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::state::test_state;

    #[test]
    fn finds_the_first_h1_only() {
        assert_eq!(first_h1("intro\n# Title\n# Second\n"), Some("Title".into()));
        assert_eq!(first_h1("## only a subtitle\n"), None);
    }

    #[test]
    fn renders_basic_markdown() {
        let html = markdown_to_html("# Hi\n\nsome *text*\n");
        assert!(html.contains("<h1>Hi</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[tokio::test]
    async fn indexes_titles_by_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let docs = dir.path().join("docs");
        std::fs::create_dir_all(docs.join("nested")).unwrap();
        std::fs::write(docs.join("a.md"), "# Alpha\nbody\n").unwrap();
        std::fs::write(docs.join("nested/b.md"), "preamble\n# Beta\n").unwrap();
        std::fs::write(docs.join("notes.txt"), "# not markdown\n").unwrap();

        let req = TaskRequest {
            task: "",
            email: None,
            paths: vec!["docs".to_string(), "docs/index.json".to_string()],
        };
        index_docs(&state, &req).await.unwrap();

        let index: Value = serde_json::from_str(
            &std::fs::read_to_string(docs.join("index.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(index["a.md"], "Alpha");
        assert_eq!(index["nested/b.md"], "Beta");
        assert!(index.get("notes.txt").is_none());
    }
}
