//! In-process worker transport for tests and co-located workers: routes
//! directly to a registered handler closure instead of a network call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{WorkflowError, WorkflowResult};
use crate::worker::client::{WorkerClient, WorkerRequest, WorkerResponse};

pub type WorkerHandler = Arc<dyn Fn(WorkerRequest) -> WorkflowResult<WorkerResponse> + Send + Sync>;

#[derive(Clone, Default)]
pub struct InProcessWorkerClient {
    handlers: HashMap<String, WorkerHandler>,
}

impl InProcessWorkerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, worker_name: impl Into<String>, handler: WorkerHandler) {
        self.handlers.insert(worker_name.into(), handler);
    }
}

#[async_trait]
impl WorkerClient for InProcessWorkerClient {
    async fn invoke(&self, worker_name: &str, request: WorkerRequest) -> WorkflowResult<WorkerResponse> {
        let handler = self
            .handlers
            .get(worker_name)
            .ok_or_else(|| WorkflowError::Validation(format!("no in-process handler for worker {worker_name}")))?;
        handler(request)
    }
}
