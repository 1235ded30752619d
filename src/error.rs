//! Error taxonomy for the workflow orchestrator.
//!
//! A single flat enum: each variant is surfaced to the step that raised
//! it, the step decides how to propagate per its `on_failure` policy,
//! and the run ultimately maps unresolved errors to a structured
//! response for the API layer.

use thiserror::Error;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Malformed input or schema mismatch. Not retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transport error or an open circuit. Retried within budget; fatal
    /// for the step once retries are exhausted.
    #[error("worker unavailable: {worker}: {reason}")]
    WorkerUnavailable { worker: String, reason: String },

    /// Upstream timeout or rate limit. Retried with backoff.
    #[error("worker transient error: {worker}: {reason}")]
    WorkerTransient { worker: String, reason: String },

    /// Token or wall-clock budget exhausted. Short-circuits remaining
    /// steps; partial state is still returned.
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    /// User or deadline cancellation observed at a suspension point.
    #[error("cancelled")]
    Cancelled,

    /// Aggregate quality score fell below the gate threshold with no
    /// auto-fix path. Non-fatal; sets `manual_review_required`.
    #[error("quality gate failed: {0}")]
    QualityGateFailed(String),

    /// Optimistic concurrency conflict on state commit.
    #[error("conflict: state version mismatch (expected {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },

    /// Programmer error; always fatal.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Error classes that the worker client retries per its backoff policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::WorkerTransient { .. } | WorkflowError::WorkerUnavailable { .. }
        )
    }
}

/// Error classes reported by a remote worker, per the wire protocol in
/// the worker contract. `retryable` is advisory; the client's own
/// classification (`WorkflowError::is_retryable`) is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerErrorCode {
    BadRequest,
    RateLimit,
    Timeout,
    Transient,
    Auth,
    Schema,
    Internal,
}

impl WorkerErrorCode {
    pub fn retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout | Self::Transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_and_unavailable_are_retryable() {
        assert!(WorkflowError::WorkerTransient {
            worker: "outline".into(),
            reason: "timeout".into()
        }
        .is_retryable());
        assert!(!WorkflowError::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn worker_error_code_retryability_matches_classification() {
        assert!(WorkerErrorCode::RateLimit.retryable());
        assert!(WorkerErrorCode::Timeout.retryable());
        assert!(WorkerErrorCode::Transient.retryable());
        assert!(!WorkerErrorCode::BadRequest.retryable());
        assert!(!WorkerErrorCode::Auth.retryable());
        assert!(!WorkerErrorCode::Schema.retryable());
    }
}
