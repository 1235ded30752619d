//! HTTP transport to a remote worker process, one base URL per worker
//! kind (configured via `WORKER_<NAME>_URL`).

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{WorkflowError, WorkflowResult};
use crate::worker::client::{WorkerClient, WorkerErrorBody, WorkerRequest, WorkerResponse};

pub struct HttpWorkerClient {
    http: Client,
    base_urls: HashMap<String, String>,
}

impl HttpWorkerClient {
    pub fn new(base_urls: HashMap<String, String>) -> Self {
        Self {
            http: Client::new(),
            base_urls,
        }
    }

    fn endpoint(&self, worker_name: &str) -> WorkflowResult<String> {
        self.base_urls
            .get(worker_name)
            .map(|base| format!("{}/invoke", base.trim_end_matches('/')))
            .ok_or_else(|| WorkflowError::Validation(format!("no url configured for worker {worker_name}")))
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn invoke(&self, worker_name: &str, request: WorkerRequest) -> WorkflowResult<WorkerResponse> {
        let url = self.endpoint(worker_name)?;

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| WorkflowError::WorkerTransient {
                worker: worker_name.to_string(),
                reason: err.to_string(),
            })?;

        if response.status().is_success() {
            response
                .json::<WorkerResponse>()
                .await
                .map_err(|err| WorkflowError::WorkerTransient {
                    worker: worker_name.to_string(),
                    reason: format!("malformed response body: {err}"),
                })
        } else {
            let status = response.status();
            match response.json::<WorkerErrorBody>().await {
                Ok(mut body) => {
                    let mut err: WorkflowError = body.clone().into();
                    if let WorkflowError::WorkerTransient { worker, .. } = &mut err {
                        *worker = worker_name.to_string();
                    }
                    body.retryable = body.retryable || status.is_server_error();
                    Err(err)
                }
                Err(_) => Err(WorkflowError::WorkerTransient {
                    worker: worker_name.to_string(),
                    reason: format!("http {status}"),
                }),
            }
        }
    }
}
