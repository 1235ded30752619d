//! Application configuration: typed defaults overridden from the
//! environment, validated once at boot. Mirrors the env surface called
//! out in the external interfaces contract.

use crate::error::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level configuration for the orchestrator process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
    pub evidence_store: EvidenceStoreConfig,
    pub workers: WorkerConfig,
    pub budget: BudgetConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            logging: LoggingConfig::default(),
            evidence_store: EvidenceStoreConfig::default(),
            workers: WorkerConfig::default(),
            budget: BudgetConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to
    /// documented defaults. Exit-code 1 (fatal config error) is the
    /// caller's responsibility if `validate` fails.
    pub fn load_from_env() -> WorkflowResult<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("EVIDENCE_STORE_URL") {
            config.evidence_store.url = val;
        }
        if let Ok(val) = std::env::var("MAX_TOKENS_PER_TRACE") {
            config.budget.max_tokens_per_trace = val.parse().map_err(|_| {
                WorkflowError::Validation(format!("MAX_TOKENS_PER_TRACE not a number: {val}"))
            })?;
        }
        if let Ok(val) = std::env::var("MAX_MS_PER_TRACE") {
            config.budget.max_ms_per_trace = val.parse().map_err(|_| {
                WorkflowError::Validation(format!("MAX_MS_PER_TRACE not a number: {val}"))
            })?;
        }
        if let Ok(val) = std::env::var("CIRCUIT_FAILURE_THRESHOLD") {
            config.circuit_breaker.failure_threshold = val.parse().map_err(|_| {
                WorkflowError::Validation(format!("CIRCUIT_FAILURE_THRESHOLD not a number: {val}"))
            })?;
        }
        if let Ok(val) = std::env::var("CIRCUIT_RECOVERY_SECONDS") {
            config.circuit_breaker.recovery_timeout_seconds = val.parse().map_err(|_| {
                WorkflowError::Validation(format!("CIRCUIT_RECOVERY_SECONDS not a number: {val}"))
            })?;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            config.logging.filter = val;
        }

        // WORKER_<NAME>_URL for every known worker kind.
        for worker in WorkerConfig::KNOWN_WORKERS {
            let env_key = format!("WORKER_{}_URL", worker.to_uppercase());
            if let Ok(val) = std::env::var(&env_key) {
                config.workers.urls.insert((*worker).to_string(), val);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WorkflowResult<()> {
        if self.service.name.is_empty() {
            return Err(WorkflowError::Validation(
                "service name cannot be empty".into(),
            ));
        }
        if self.budget.max_tokens_per_trace == 0 {
            return Err(WorkflowError::Validation(
                "max_tokens_per_trace must be positive".into(),
            ));
        }
        if self.budget.max_ms_per_trace == 0 {
            return Err(WorkflowError::Validation(
                "max_ms_per_trace must be positive".into(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(WorkflowError::Validation(
                "circuit breaker failure_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
    pub bind_addr: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "deckforge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceStoreConfig {
    /// Path (or URL, for a networked backend) of the evidence store.
    pub url: String,
}

impl Default for EvidenceStoreConfig {
    fn default() -> Self {
        Self {
            url: "./data/evidence".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub urls: HashMap<String, String>,
}

impl WorkerConfig {
    pub const KNOWN_WORKERS: &'static [&'static str] = &[
        "clarify",
        "outline",
        "write-slide",
        "critique",
        "polish-notes",
        "design",
        "script",
        "research",
        "ingest",
        "retrieve",
    ];
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            urls: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub max_tokens_per_trace: u64,
    pub max_ms_per_trace: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_trace: 180_000,
            max_ms_per_trace: 180_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_seconds: 60,
        }
    }
}
