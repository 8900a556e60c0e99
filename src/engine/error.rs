// ==========================================
// Roofline Ops - engine error types
// ==========================================
// The caller-facing taxonomy. Every mutating operation surfaces these
// synchronously; nothing is silently downgraded or auto-corrected.
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid transition: from={from} to={to}")]
    InvalidTransition { from: String, to: String },

    #[error("missing required artifact: {0}")]
    MissingArtifact(String),

    #[error("not found: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("repository error: {0}")]
    Repository(RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            RepositoryError::OptimisticLockFailure { .. } => {
                EngineError::ConcurrencyConflict(err.to_string())
            }
            other => EngineError::Repository(other),
        }
    }
}

impl EngineError {
    /// Recoverable caller errors (HTTP 4xx-equivalent) as opposed to
    /// infrastructure failures.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::InvalidTransition { .. }
                | EngineError::MissingArtifact(_)
                | EngineError::NotFound { .. }
                | EngineError::ConcurrencyConflict(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
