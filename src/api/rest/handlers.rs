use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::api::rest::error::{ApiError, ApiResult};
use crate::shared::AppState;
use crate::tasks::{self, classify, csv_filter, TaskRequest};

/// GET / - liveness message.
pub async fn root() -> Json<Value> {
    Json(serde_json::json!({ "message": "Automation Agent is running" }))
}

#[derive(Deserialize)]
pub struct ReadParams {
    pub path: String,
}

/// GET /read?path= - file contents as plain text. Sandbox violations and
/// missing files are both 404.
pub async fn read_file(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadParams>,
) -> ApiResult<String> {
    let resolved = state.sandbox.resolve(&params.path).map_err(|e| {
        warn!(path = %params.path, "read refused: {}", e);
        ApiError::from(e)
    })?;

    match tokio::fs::read_to_string(&resolved).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound("File not found".to_string()))
        }
        Err(e) => {
            error!(path = %resolved.display(), "read failed: {}", e);
            Err(ApiError::Internal(anyhow::anyhow!(e)))
        }
    }
}

#[derive(Deserialize)]
pub struct RunParams {
    pub task: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: &'static str,
    pub message: String,
}

/// POST /run?task=&email= - classify the task and execute the one matching
/// handler. An unrecognized task is echoed back with 200; it is not an error.
pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunParams>,
) -> ApiResult<Json<RunResponse>> {
    info!(task = %params.task, "task received");

    if classify::is_destructive(&params.task) {
        warn!(task = %params.task, "destructive task refused");
        return Err(ApiError::BadRequest(
            "Tasks that delete or remove files are not permitted".to_string(),
        ));
    }

    let kind = match classify::classify(&params.task) {
        Some(kind) => Some(kind),
        None if state.llm.is_configured() => {
            match classify::classify_with_llm(&state.llm, &params.task).await {
                Ok(kind) => kind,
                Err(e) => {
                    warn!("LLM classification failed: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let Some(kind) = kind else {
        return Ok(Json(RunResponse {
            status: "unrecognized",
            message: format!("Unrecognized task: {}", params.task),
        }));
    };

    info!(code = kind.code(), "dispatching task");
    let request = TaskRequest::new(&params.task, params.email.as_deref());

    match tasks::dispatch(&state, kind, &request).await {
        Ok(message) => {
            info!(code = kind.code(), "task completed");
            Ok(Json(RunResponse {
                status: "ok",
                message,
            }))
        }
        Err(e) => {
            error!(code = kind.code(), "task failed: {}", e);
            Err(e.into())
        }
    }
}

#[derive(Deserialize)]
pub struct FilterCsvParams {
    pub col: String,
    pub value: String,
}

/// GET /filter_csv?col=&value= - rows of the fixed CSV under the data root
/// where the named column equals the given value.
pub async fn filter_csv(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterCsvParams>,
) -> ApiResult<Json<Vec<Value>>> {
    let path = state.sandbox.resolve(csv_filter::ENDPOINT_CSV)?;
    let rows = csv_filter::filter_rows(&path, &params.col, &params.value)?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::state::test_state;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(test_state(dir.path()));
        (dir, state)
    }

    #[tokio::test]
    async fn destructive_tasks_get_a_400_regardless_of_content() {
        let (_dir, state) = state();
        for task in ["DELETE /data/x.txt", "please remove the wednesday counts"] {
            let err = run_task(
                State(state.clone()),
                Query(RunParams {
                    task: task.to_string(),
                    email: None,
                }),
            )
            .await
            .unwrap_err();
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn unrecognized_tasks_echo_back_with_200() {
        let (_dir, state) = state();
        let Json(response) = run_task(
            State(state),
            Query(RunParams {
                task: "sing a song about type theory".to_string(),
                email: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status, "unrecognized");
        assert!(response.message.contains("type theory"));
    }

    #[tokio::test]
    async fn read_outside_the_root_is_a_plain_404() {
        let (_dir, state) = state();
        let err = read_file(
            State(state),
            Query(ReadParams {
                path: "/etc/passwd".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn read_returns_file_contents_inside_the_root() {
        let (dir, state) = state();
        std::fs::write(dir.path().join("hello.txt"), "hi there").unwrap();

        let contents = read_file(
            State(state),
            Query(ReadParams {
                path: "hello.txt".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(contents, "hi there");
    }

    #[tokio::test]
    async fn filter_csv_endpoint_filters_on_the_fixed_file() {
        let (dir, state) = state();
        std::fs::write(
            dir.path().join(csv_filter::ENDPOINT_CSV),
            "type,units\nGold,2\nSilver,5\n",
        )
        .unwrap();

        let Json(rows) = filter_csv(
            State(state),
            Query(FilterCsvParams {
                col: "type".to_string(),
                value: "Gold".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["units"], "2");
    }
}
