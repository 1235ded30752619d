//! Maps the internal error taxonomy to transport-level HTTP status, per
//! the propagation rule in the error handling design: the run commits
//! the last barrier state and returns a structured error, the API
//! translates it to a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::WorkflowError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: &'static str,
    pub message: String,
}

pub struct ApiError(pub WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self(err)
    }
}

/// Status code for a structured error, shared between the early-return
/// `?` path and the in-band `RunOutcome.error` path (which still wants
/// to ship partial state alongside the status).
pub fn status_for_error(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::WorkerUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        WorkflowError::WorkerTransient { .. } => StatusCode::BAD_GATEWAY,
        WorkflowError::BudgetExceeded(_) => StatusCode::from_u16(402).unwrap(),
        WorkflowError::Cancelled => StatusCode::from_u16(499).unwrap(),
        WorkflowError::QualityGateFailed(_) => StatusCode::OK,
        WorkflowError::Conflict { .. } => StatusCode::CONFLICT,
        WorkflowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_code(err: &WorkflowError) -> &'static str {
    match err {
        WorkflowError::Validation(_) => "validation",
        WorkflowError::WorkerUnavailable { .. } => "worker_unavailable",
        WorkflowError::WorkerTransient { .. } => "worker_transient",
        WorkflowError::BudgetExceeded(_) => "budget_exceeded",
        WorkflowError::Cancelled => "cancelled",
        WorkflowError::QualityGateFailed(_) => "quality_gate_failed",
        WorkflowError::Conflict { .. } => "conflict",
        WorkflowError::Internal(_) => "internal",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for_error(&self.0);
        let body = ApiErrorBody {
            code: error_code(&self.0),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
