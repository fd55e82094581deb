//! Pipeline errors.

use thiserror::Error;

use crate::repository::DbError;

/// Failures that end a cycle early.
///
/// Per-reply generation and posting failures never surface here; they are
/// counted in the cycle report and recorded on the reply.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("database error: {0}")]
    Store(#[from] DbError),
}
