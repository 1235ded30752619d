//! Decorates any [`WorkerClient`] with timeout, retry-with-backoff and
//! per-worker circuit breaking. Budget and deadline enforcement live one
//! layer up, in the session manager — this type only knows about a
//! single call's transport reliability.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::error::{WorkflowError, WorkflowResult};
use crate::worker::circuit_breaker::CircuitBreakerRegistry;
use crate::worker::client::{WorkerClient, WorkerRequest, WorkerResponse};
use crate::worker::retry::{retry_with_backoff, RetryConfig};

/// Per-step deadline, keyed by worker kind: 60s for text workers, 120s
/// for heavier design/research calls, 300s for document ingestion.
pub fn default_timeout_for_worker(worker_name: &str) -> Duration {
    match worker_name {
        "design" | "research" => Duration::from_secs(120),
        "ingest" => Duration::from_secs(300),
        _ => Duration::from_secs(60),
    }
}

pub struct ResilientWorkerClient {
    inner: Arc<dyn WorkerClient>,
    circuit_breakers: CircuitBreakerRegistry,
    retry_config: RetryConfig,
    call_timeout_override: Option<Duration>,
}

impl ResilientWorkerClient {
    pub fn new(
        inner: Arc<dyn WorkerClient>,
        circuit_breakers: CircuitBreakerRegistry,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            inner,
            circuit_breakers,
            retry_config,
            call_timeout_override: None,
        }
    }

    /// Overrides the per-worker-kind default with a single fixed
    /// timeout for every call. Mainly useful in tests.
    pub fn with_fixed_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_override = Some(timeout);
        self
    }

    fn timeout_for(&self, worker_name: &str) -> Duration {
        self.call_timeout_override.unwrap_or_else(|| default_timeout_for_worker(worker_name))
    }
}

#[async_trait]
impl WorkerClient for ResilientWorkerClient {
    #[instrument(skip(self, request), fields(worker = worker_name))]
    async fn invoke(&self, worker_name: &str, request: WorkerRequest) -> WorkflowResult<WorkerResponse> {
        let breaker = self.circuit_breakers.get(worker_name);

        let call_timeout = self.timeout_for(worker_name);

        retry_with_backoff(&self.retry_config, |attempt| {
            let breaker = breaker.clone();
            let inner = self.inner.clone();
            let request = request.clone();
            let worker_name = worker_name.to_string();
            async move {
                let guard = breaker.guard(&worker_name)?;

                let outcome = tokio::time::timeout(call_timeout, inner.invoke(&worker_name, request)).await;
                match outcome {
                    Ok(Ok(response)) => {
                        guard.on_success();
                        Ok(response)
                    }
                    Ok(Err(err)) => {
                        if err.is_retryable() {
                            guard.on_failure();
                        } else {
                            guard.on_success();
                        }
                        if attempt > 1 {
                            warn!(worker = %worker_name, attempt, "worker call failed, retrying");
                        }
                        Err(err)
                    }
                    Err(_) => {
                        guard.on_failure();
                        Err(WorkflowError::WorkerTransient {
                            worker: worker_name,
                            reason: "call timed out".to_string(),
                        })
                    }
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{PresentationId, StepId, TraceId};
    use crate::worker::client::RequestMetadata;
    use crate::worker::usage::Usage;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FlakyClient {
        attempts: AtomicU32,
        fail_until: u32,
    }

    #[async_trait]
    impl WorkerClient for FlakyClient {
        async fn invoke(&self, _worker_name: &str, _request: WorkerRequest) -> WorkflowResult<WorkerResponse> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_until {
                Err(WorkflowError::WorkerTransient {
                    worker: "outline".into(),
                    reason: "timeout".into(),
                })
            } else {
                Ok(WorkerResponse {
                    result: serde_json::json!({"ok": true}),
                    usage: Usage::default(),
                    telemetry: None,
                })
            }
        }
    }

    struct AlwaysUnavailableClient {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl WorkerClient for AlwaysUnavailableClient {
        async fn invoke(&self, _worker_name: &str, _request: WorkerRequest) -> WorkflowResult<WorkerResponse> {
            *self.calls.lock().unwrap() += 1;
            Err(WorkflowError::WorkerTransient {
                worker: "outline".into(),
                reason: "boom".into(),
            })
        }
    }

    fn sample_request() -> WorkerRequest {
        WorkerRequest {
            input: serde_json::json!({}),
            model: None,
            temperature: None,
            metadata: RequestMetadata {
                trace_id: TraceId::generate(),
                step_id: StepId::generate(),
                presentation_id: PresentationId::generate(),
            },
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures_within_retry_budget() {
        let inner = Arc::new(FlakyClient {
            attempts: AtomicU32::new(0),
            fail_until: 1,
        });
        let client = ResilientWorkerClient::new(
            inner,
            CircuitBreakerRegistry::new(5, Duration::from_secs(60)),
            RetryConfig {
                base_delay: Duration::from_millis(1),
                jitter: Duration::from_millis(0),
                ..RetryConfig::default()
            },
        )
        .with_fixed_timeout(Duration::from_secs(5));
        let result = client.invoke("outline", sample_request()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn circuit_opens_and_stops_reaching_the_transport() {
        let inner = Arc::new(AlwaysUnavailableClient { calls: Mutex::new(0) });
        let client = ResilientWorkerClient::new(
            inner.clone(),
            CircuitBreakerRegistry::new(2, Duration::from_secs(60)),
            RetryConfig {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                jitter: Duration::from_millis(0),
                ..RetryConfig::default()
            },
        )
        .with_fixed_timeout(Duration::from_secs(5));

        for _ in 0..2 {
            let _ = client.invoke("outline", sample_request()).await;
        }
        let calls_after_opening = *inner.calls.lock().unwrap();

        let _ = client.invoke("outline", sample_request()).await;
        assert_eq!(*inner.calls.lock().unwrap(), calls_after_opening);
    }
}
