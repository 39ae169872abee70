use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::shared::sandbox::SandboxError;
use crate::tasks::TaskError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", e),
            ),
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<TaskError> for ApiError {
    fn from(e: TaskError) -> Self {
        match e {
            // the caller's input file is missing or the request is malformed
            TaskError::MissingInput(_) | TaskError::Rejected(_) => {
                ApiError::BadRequest(e.to_string())
            }
            // indistinguishable from "not found" so the boundary stays hidden
            TaskError::Sandbox(_) => ApiError::NotFound("File not found".to_string()),
            TaskError::External(inner) => ApiError::Internal(inner),
        }
    }
}

impl From<SandboxError> for ApiError {
    fn from(_: SandboxError) -> Self {
        ApiError::NotFound("File not found".to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn status_of(e: ApiError) -> StatusCode {
        e.into_response().status()
    }

    #[test]
    fn task_errors_map_to_the_documented_status_codes() {
        assert_eq!(
            status_of(TaskError::MissingInput("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TaskError::Rejected("no".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(TaskError::Sandbox("x".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(TaskError::External(anyhow!("boom")).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn sandbox_violations_read_as_plain_not_found() {
        let response = ApiError::from(TaskError::Sandbox("/etc/passwd".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        // the body must not echo the offending path
    }
}
