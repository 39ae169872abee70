pub mod classify;
pub mod csv_filter;
pub mod dates;
pub mod error;
pub mod files;
pub mod git;
pub mod llm_tasks;
pub mod markdown;
pub mod media;
pub mod sql;
pub mod web;

use std::path::Path;

use anyhow::anyhow;

use crate::shared::AppState;

pub use error::{Result, TaskError};

/// Closed set of operations the agent can perform. Classification picks
/// exactly one variant; dispatch below is a total mapping, so there is no
/// order-dependent matching anywhere downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    GenerateData,
    FormatMarkdown,
    CountWednesdays,
    SortContacts,
    RecentLogLines,
    IndexMarkdownDocs,
    ExtractSenderEmail,
    ExtractCardNumber,
    SimilarComments,
    GoldTicketSales,
    FetchUrl,
    CloneAndCommit,
    RunSqlQuery,
    ScrapeLinks,
    ResizeImage,
    TranscribeAudio,
    MarkdownToHtml,
    FilterCsv,
}

impl TaskKind {
    /// Short task codes (A1-A10, B3-B10) used in logs and by the LLM
    /// fallback classifier.
    pub fn code(&self) -> &'static str {
        match self {
            TaskKind::GenerateData => "A1",
            TaskKind::FormatMarkdown => "A2",
            TaskKind::CountWednesdays => "A3",
            TaskKind::SortContacts => "A4",
            TaskKind::RecentLogLines => "A5",
            TaskKind::IndexMarkdownDocs => "A6",
            TaskKind::ExtractSenderEmail => "A7",
            TaskKind::ExtractCardNumber => "A8",
            TaskKind::SimilarComments => "A9",
            TaskKind::GoldTicketSales => "A10",
            TaskKind::FetchUrl => "B3",
            TaskKind::CloneAndCommit => "B4",
            TaskKind::RunSqlQuery => "B5",
            TaskKind::ScrapeLinks => "B6",
            TaskKind::ResizeImage => "B7",
            TaskKind::TranscribeAudio => "B8",
            TaskKind::MarkdownToHtml => "B9",
            TaskKind::FilterCsv => "B10",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_uppercase();
        [
            TaskKind::GenerateData,
            TaskKind::FormatMarkdown,
            TaskKind::CountWednesdays,
            TaskKind::SortContacts,
            TaskKind::RecentLogLines,
            TaskKind::IndexMarkdownDocs,
            TaskKind::ExtractSenderEmail,
            TaskKind::ExtractCardNumber,
            TaskKind::SimilarComments,
            TaskKind::GoldTicketSales,
            TaskKind::FetchUrl,
            TaskKind::CloneAndCommit,
            TaskKind::RunSqlQuery,
            TaskKind::ScrapeLinks,
            TaskKind::ResizeImage,
            TaskKind::TranscribeAudio,
            TaskKind::MarkdownToHtml,
            TaskKind::FilterCsv,
        ]
        .into_iter()
        .find(|k| k.code() == code)
    }
}

/// Per-request task arguments: the raw text, the optional email side
/// parameter, and any data-root paths lifted from the text. Transient values
/// only; nothing survives the request.
pub struct TaskRequest<'a> {
    pub task: &'a str,
    pub email: Option<&'a str>,
    pub paths: Vec<String>,
}

impl<'a> TaskRequest<'a> {
    pub fn new(task: &'a str, email: Option<&'a str>) -> Self {
        let paths = classify::extract_data_paths(task);
        Self { task, email, paths }
    }

    /// The n-th path mentioned in the task, or the handler's conventional
    /// default when the task names fewer.
    pub fn path_or(&self, index: usize, default: &str) -> String {
        self.paths
            .get(index)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// First http(s) URL mentioned in the task text.
    pub fn url(&self) -> Option<String> {
        classify::extract_url(self.task)
    }
}

/// Total mapping from task kind to handler. Every handler either fully
/// completes and reports a human-readable message, or fails; nothing is
/// retried or rolled back.
pub async fn dispatch(state: &AppState, kind: TaskKind, req: &TaskRequest<'_>) -> Result<String> {
    match kind {
        TaskKind::GenerateData => web::generate_data(state, req).await,
        TaskKind::FormatMarkdown => files::format_markdown(state, req).await,
        TaskKind::CountWednesdays => dates::count_wednesdays(state, req).await,
        TaskKind::SortContacts => files::sort_contacts(state, req).await,
        TaskKind::RecentLogLines => files::recent_log_lines(state, req).await,
        TaskKind::IndexMarkdownDocs => markdown::index_docs(state, req).await,
        TaskKind::ExtractSenderEmail => llm_tasks::extract_sender_email(state, req).await,
        TaskKind::ExtractCardNumber => llm_tasks::extract_card_number(state, req).await,
        TaskKind::SimilarComments => llm_tasks::most_similar_comments(state, req).await,
        TaskKind::GoldTicketSales => sql::gold_ticket_sales(state, req).await,
        TaskKind::FetchUrl => web::fetch_url(state, req).await,
        TaskKind::CloneAndCommit => git::clone_and_commit(state, req).await,
        TaskKind::RunSqlQuery => sql::run_query(state, req).await,
        TaskKind::ScrapeLinks => web::scrape_links(state, req).await,
        TaskKind::ResizeImage => media::resize_image(state, req).await,
        TaskKind::TranscribeAudio => llm_tasks::transcribe_audio(state, req).await,
        TaskKind::MarkdownToHtml => markdown::render_html(state, req).await,
        TaskKind::FilterCsv => csv_filter::filter_csv_task(state, req).await,
    }
}

/// Read a required input file, mapping a missing file to the caller-fault
/// error the HTTP layer reports as 400.
pub(crate) async fn read_input(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TaskError::MissingInput(path.display().to_string()))
        }
        Err(e) => Err(TaskError::External(anyhow!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Same contract as `read_input`, for binary inputs.
pub(crate) async fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TaskError::MissingInput(path.display().to_string()))
        }
        Err(e) => Err(TaskError::External(anyhow!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Write the single output artifact of a handler, creating parent directories
/// as needed.
pub(crate) async fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| anyhow!("failed to create {}: {}", parent.display(), e))?;
    }
    tokio::fs::write(path, contents.as_ref())
        .await
        .map_err(|e| anyhow!("failed to write {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_codes_round_trip() {
        for code in ["A1", "A3", "A10", "B3", "B10"] {
            let kind = TaskKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert!(TaskKind::from_code("B2").is_none());
        assert!(TaskKind::from_code("nonsense").is_none());
    }

    #[test]
    fn request_extracts_paths_in_order() {
        let req = TaskRequest::new("sort /data/contacts.json into /data/contacts-sorted.json", None);
        assert_eq!(req.path_or(0, "/data/x"), "/data/contacts.json");
        assert_eq!(req.path_or(1, "/data/x"), "/data/contacts-sorted.json");
        assert_eq!(req.path_or(2, "/data/x"), "/data/x");
    }
}
