// ==========================================
// Roofline Ops - API layer error type
// ==========================================
// Converts engine and repository errors into a flat error with a stable
// machine-readable code. Callers branch on the code, humans read the
// message.
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid transition: from={from} to={to}")]
    InvalidTransition { from: String, to: String },

    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable code for programmatic handling; never renamed once shipped.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "VALIDATION_ERROR",
            ApiError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ApiError::MissingArtifact(_) => "MISSING_ARTIFACT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller can fix the request and retry.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, ApiError::Internal(_))
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Validation(msg) => ApiError::InvalidInput(msg),
            EngineError::InvalidTransition { from, to } => {
                ApiError::InvalidTransition { from, to }
            }
            EngineError::MissingArtifact(msg) => ApiError::MissingArtifact(msg),
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} {}", entity, id))
            }
            EngineError::ConcurrencyConflict(msg) => ApiError::ConcurrencyConflict(msg),
            EngineError::Repository(e) => ApiError::Internal(e.to_string()),
            EngineError::Other(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        ApiError::from(EngineError::from(e))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
