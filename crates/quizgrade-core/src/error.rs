//! Error types shared across the quiz pipeline.
//!
//! `QuizError` is what callers of the engine see. `StoreError` comes back
//! from the persistence seam and `ProviderError` from model clients; the
//! latter lives here so the subjective evaluator can downcast it out of an
//! `anyhow::Error` without string matching.

use thiserror::Error;

/// Errors surfaced by quiz operations.
#[derive(Debug, Error)]
pub enum QuizError {
    /// Unknown module, session, or question. Sessions owned by another user
    /// also land here so their existence is not leaked.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate submission or a question outside the session.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed request values.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The store or another remote collaborator failed.
    #[error("upstream unavailable: {0}")]
    Upstream(String),
}

impl From<StoreError> for QuizError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateAttempt { .. } => {
                QuizError::Conflict("answer already submitted for this question".into())
            }
            StoreError::OpenSessionExists { .. } => {
                QuizError::Conflict("an open quiz session already exists".into())
            }
            StoreError::NotFound(what) => QuizError::NotFound(what),
            StoreError::Backend(msg) => QuizError::Upstream(msg),
        }
    }
}

/// Errors returned by a [`QuizStore`](crate::store::QuizStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// An attempt already exists for this (session, question) pair.
    #[error("attempt already recorded for question {question_id} in session {session_id}")]
    DuplicateAttempt {
        session_id: uuid::Uuid,
        question_id: uuid::Uuid,
    },

    /// The user already has an uncompleted session for this module.
    #[error("open session {session_id} already exists")]
    OpenSessionExists { session_id: uuid::Uuid },

    /// A referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The backing store failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors that can occur when interacting with an LLM provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn duplicate_attempt_maps_to_conflict() {
        let err: QuizError = StoreError::DuplicateAttempt {
            session_id: Uuid::nil(),
            question_id: Uuid::nil(),
        }
        .into();
        assert!(matches!(err, QuizError::Conflict(_)));
    }

    #[test]
    fn backend_failure_maps_to_upstream() {
        let err: QuizError = StoreError::Backend("connection reset".into()).into();
        assert!(matches!(err, QuizError::Upstream(ref m) if m.contains("connection reset")));
    }

    #[test]
    fn rate_limit_exposes_delay() {
        let err = ProviderError::RateLimited {
            retry_after_ms: 2000,
        };
        assert_eq!(err.retry_after_ms(), Some(2000));
        assert_eq!(ProviderError::Timeout(5).retry_after_ms(), None);
    }
}
