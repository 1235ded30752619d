pub mod circuit_breaker;
pub mod client;
pub mod http;
pub mod inprocess;
pub mod resilient;
pub mod retry;
pub mod usage;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use client::{RequestMetadata, WorkerClient, WorkerErrorBody, WorkerRequest, WorkerResponse};
pub use http::HttpWorkerClient;
pub use inprocess::InProcessWorkerClient;
pub use resilient::{default_timeout_for_worker, ResilientWorkerClient};
pub use retry::{retry_with_backoff, RetryConfig};
pub use usage::Usage;
