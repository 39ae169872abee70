use std::path::Path;

use anyhow::anyhow;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Row, SqliteConnection};
use tracing::info;

use crate::shared::AppState;
use crate::tasks::{write_output, Result, TaskError, TaskRequest};

const TICKETS_DB: &str = "/data/ticket-sales.db";
const TICKETS_OUTPUT: &str = "/data/ticket-sales-gold.txt";
const QUERY_DB: &str = "/data/database.db";
const QUERY_OUTPUT: &str = "/data/sql-result.json";

const GOLD_SALES_QUERY: &str =
    "SELECT COALESCE(SUM(units * price), 0.0) FROM tickets WHERE type = 'Gold'";

async fn open_readonly(path: &Path) -> Result<SqliteConnection> {
    if !path.exists() {
        return Err(TaskError::MissingInput(path.display().to_string()));
    }

    SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .connect()
        .await
        .map_err(|e| TaskError::External(anyhow!("failed to open {}: {}", path.display(), e)))
}

/// Total sales of Gold tickets: SUM(units * price) over the `tickets` table,
/// rows of any other type ignored.
pub async fn gold_ticket_sales(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let db = state.sandbox.resolve(&req.path_or(0, TICKETS_DB))?;
    let output = state.sandbox.resolve(&req.path_or(1, TICKETS_OUTPUT))?;

    let mut conn = open_readonly(&db).await?;
    let total: f64 = sqlx::query_scalar(GOLD_SALES_QUERY)
        .fetch_one(&mut conn)
        .await
        .map_err(|e| anyhow!("gold sales query failed: {}", e))?;

    write_output(&output, total.to_string()).await?;

    Ok(format!(
        "Total Gold ticket sales {} written to {}",
        total,
        output.display()
    ))
}

static SQL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)\bselect\b.*").expect("valid regex"));

/// Pull the SQL statement out of the task text. Only SELECT statements are
/// accepted; the agent has no write path into a database.
fn extract_query(task: &str) -> Option<String> {
    SQL_RE
        .find(task)
        .map(|m| m.as_str().trim().trim_matches('`').trim_end_matches(';').trim().to_string())
}

fn column_value(row: &SqliteRow, idx: usize) -> Value {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(|b| Value::from(BASE64.encode(b))).unwrap_or(Value::Null);
    }
    Value::Null
}

fn rows_to_json(rows: &[SqliteRow]) -> Value {
    let array = rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for (idx, column) in row.columns().iter().enumerate() {
                object.insert(column.name().to_string(), column_value(row, idx));
            }
            Value::Object(object)
        })
        .collect();
    Value::Array(array)
}

/// Run a caller-supplied SELECT against a SQLite file and write the rows as
/// a JSON array of objects.
pub async fn run_query(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let query = extract_query(req.task)
        .ok_or_else(|| TaskError::Rejected("no SELECT statement found in the task".to_string()))?;

    let db = state.sandbox.resolve(&req.path_or(0, QUERY_DB))?;
    let output = state.sandbox.resolve(&req.path_or(1, QUERY_OUTPUT))?;

    info!(%query, db = %db.display(), "running SQL query");

    let mut conn = open_readonly(&db).await?;
    let rows = sqlx::query(&query)
        .fetch_all(&mut conn)
        .await
        .map_err(|e| anyhow!("query failed: {}", e))?;

    let json = rows_to_json(&rows);
    let count = rows.len();
    write_output(&output, serde_json::to_string(&json).map_err(|e| anyhow!(e))?).await?;

    Ok(format!("Wrote {} rows to {}", count, output.display()))
}
