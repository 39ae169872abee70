use std::path::Path;

use anyhow::anyhow;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::shared::AppState;
use crate::tasks::{write_output, Result, TaskError, TaskRequest};

/// The one CSV file the `/filter_csv` endpoint serves, relative to the root.
pub const ENDPOINT_CSV: &str = "sample.csv";

const TASK_INPUT: &str = "/data/sample.csv";
const TASK_OUTPUT: &str = "/data/csv-filtered.json";

/// Rows of `path` whose `column` equals `value`, as JSON objects keyed by the
/// header row.
pub fn filter_rows(path: &Path, column: &str, value: &str) -> Result<Vec<Value>> {
    if !path.exists() {
        return Err(TaskError::MissingInput(path.display().to_string()));
    }

    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| anyhow!("failed to open {}: {}", path.display(), e))?;

    let headers = reader
        .headers()
        .map_err(|e| anyhow!("failed to read CSV headers: {}", e))?
        .clone();

    let column_index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| TaskError::Rejected(format!("unknown CSV column: {column}")))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| anyhow!("malformed CSV record: {}", e))?;
        if record.get(column_index) != Some(value) {
            continue;
        }

        let mut object = Map::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            object.insert(header.to_string(), Value::String(field.to_string()));
        }
        rows.push(Value::Object(object));
    }

    Ok(rows)
}

static COLUMN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)column\s*[:=]\s*([\w-]+)").expect("valid regex"));
static VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)value\s*[:=]\s*"?([^"\s,]+)"?"#).expect("valid regex"));

fn capture(re: &Regex, task: &str) -> Option<String> {
    re.captures(task).map(|caps| caps[1].to_string())
}

/// Task-invoked variant: column and value come from the task text
/// (`column=<name> value=<value>`), output goes to a JSON file.
pub async fn filter_csv_task(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let column = capture(&COLUMN_RE, req.task).ok_or_else(|| {
        TaskError::Rejected("specify the column to filter on, e.g. column=type".to_string())
    })?;
    let value = capture(&VALUE_RE, req.task).ok_or_else(|| {
        TaskError::Rejected("specify the value to match, e.g. value=Gold".to_string())
    })?;

    let input = state.sandbox.resolve(&req.path_or(0, TASK_INPUT))?;
    let output = state.sandbox.resolve(&req.path_or(1, TASK_OUTPUT))?;

    let rows = filter_rows(&input, &column, &value)?;
    let count = rows.len();
    write_output(
        &output,
        serde_json::to_string(&Value::Array(rows)).map_err(|e| anyhow!(e))?,
    )
    .await?;

    Ok(format!(
        "Wrote {} rows matching {}={} to {}",
        count,
        column,
        value,
        output.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_csv(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("sample.csv");
        std::fs::write(&path, "name,city\nana,berlin\nbob,paris\ncara,berlin\n").unwrap();
        path
    }

    #[test]
    fn keeps_only_matching_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_csv(dir.path());

        let rows = filter_rows(&path, "city", "berlin").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "ana");
        assert_eq!(rows[1]["name"], "cara");
    }

    #[test]
    fn unknown_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_csv(dir.path());

        let err = filter_rows(&path, "country", "fr").unwrap_err();
        assert!(matches!(err, TaskError::Rejected(_)));
    }

    #[test]
    fn missing_file_is_a_missing_input() {
        let err = filter_rows(Path::new("/nonexistent/sample.csv"), "a", "b").unwrap_err();
        assert!(matches!(err, TaskError::MissingInput(_)));
    }

    #[test]
    fn parses_column_and_value_from_task_text() {
        assert_eq!(
            capture(&COLUMN_RE, "filter the csv with column=city value=berlin"),
            Some("city".to_string())
        );
        assert_eq!(
            capture(&VALUE_RE, "filter the csv with column=city value=berlin"),
            Some("berlin".to_string())
        );
        assert_eq!(capture(&COLUMN_RE, "filter the csv"), None);
    }
}
