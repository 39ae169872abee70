use thiserror::Error;

use crate::shared::sandbox::SandboxError;

/// Failure taxonomy for task handlers. The HTTP layer maps these directly:
/// missing or malformed input is the caller's fault (400), sandbox violations
/// are reported as not-found (404) so the boundary is not leaked, and
/// everything else is an internal failure (500) with the error text attached.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("input not found: {0}")]
    MissingInput(String),

    #[error("{0}")]
    Rejected(String),

    #[error("path outside the data root: {0}")]
    Sandbox(String),

    #[error(transparent)]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TaskError>;

impl From<SandboxError> for TaskError {
    fn from(e: SandboxError) -> Self {
        TaskError::Sandbox(e.to_string())
    }
}
