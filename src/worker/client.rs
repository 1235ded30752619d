use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WorkerErrorCode, WorkflowError, WorkflowResult};
use crate::ids::{PresentationId, StepId, TraceId};
use crate::worker::usage::Usage;

/// Metadata attached to every worker request, per the wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub trace_id: TraceId,
    pub step_id: StepId,
    pub presentation_id: PresentationId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub metadata: RequestMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub result: Value,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Value>,
}

/// The wire error shape a worker reports on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerErrorBody {
    pub code: WorkerErrorCode,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
}

impl From<WorkerErrorBody> for WorkflowError {
    fn from(body: WorkerErrorBody) -> Self {
        if body.retryable || body.code.retryable() {
            WorkflowError::WorkerTransient {
                worker: String::new(),
                reason: body.message,
            }
        } else {
            WorkflowError::Validation(body.message)
        }
    }
}

/// One typed endpoint per worker kind. Transport is pluggable: HTTP for
/// remote workers, in-process for co-located or test doubles.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    async fn invoke(&self, worker_name: &str, request: WorkerRequest) -> WorkflowResult<WorkerResponse>;
}
