//! DeckForge server binary: loads configuration, wires the durable
//! stores and worker transport, and serves the HTTP API.
//!
//! Exit codes: 0 clean shutdown, 1 fatal config error, 2 port in use,
//! 3 evidence store unreachable on boot.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use deckforge::api::{build_router, AppState};
use deckforge::evidence::{EvidenceStore, SledEvidenceStore};
use deckforge::quality::{CvClient, FakeCvClient};
use deckforge::session::SessionManager;
use deckforge::state_store::{SledStateStore, StateStore};
use deckforge::telemetry::InMemoryTelemetrySink;
use deckforge::worker::{CircuitBreakerRegistry, HttpWorkerClient, ResilientWorkerClient, RetryConfig, WorkerClient};
use deckforge::workflow::WorkflowEngine;
use deckforge::AppConfig;

fn load_config() -> anyhow::Result<AppConfig> {
    AppConfig::load_from_env().context("failed to load configuration from environment")
}

fn open_evidence_db(config: &AppConfig) -> anyhow::Result<sled::Db> {
    sled::open(&config.evidence_store.url)
        .with_context(|| format!("failed to open evidence store at {}", config.evidence_store.url))
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fatal config error: {err:#}");
            return ExitCode::from(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.logging.filter.clone()))
        .init();

    let db = match open_evidence_db(&config) {
        Ok(db) => db,
        Err(err) => {
            tracing::error!(error = format!("{err:#}"), path = %config.evidence_store.url, "evidence store unreachable on boot");
            return ExitCode::from(3);
        }
    };

    let state_store: Arc<dyn StateStore> = match SledStateStore::open(&db) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, "failed to open state store tree");
            return ExitCode::from(3);
        }
    };
    let evidence_store: Arc<dyn EvidenceStore> = match SledEvidenceStore::open(&db, None) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, "failed to open evidence store trees");
            return ExitCode::from(3);
        }
    };

    let circuit_breakers = CircuitBreakerRegistry::new(
        config.circuit_breaker.failure_threshold,
        Duration::from_secs(config.circuit_breaker.recovery_timeout_seconds),
    );
    let http_client: Arc<dyn WorkerClient> = Arc::new(HttpWorkerClient::new(config.workers.urls.clone()));
    let worker_client: Arc<dyn WorkerClient> = Arc::new(ResilientWorkerClient::new(
        http_client,
        circuit_breakers.clone(),
        RetryConfig::default(),
    ));

    let telemetry: Arc<dyn deckforge::telemetry::TelemetrySink> = Arc::new(InMemoryTelemetrySink::default());
    let session_manager = Arc::new(SessionManager::new(state_store, config.budget.clone()));
    let definition = Arc::new(deckforge::workflow::presentation_pipeline());
    // No CV service is wired up by default; a deployment that has one injects
    // an `HttpCvClient` here instead.
    let cv_client: Arc<dyn CvClient> = Arc::new(FakeCvClient::passing());

    let app_state = AppState {
        engine: Arc::new(WorkflowEngine::new()),
        definition,
        session_manager,
        worker_client,
        evidence_store,
        telemetry,
        circuit_breakers,
        cv_client,
    };

    let router = build_router(app_state);

    let addr: SocketAddr = match config.service.bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("fatal config error: invalid bind_addr {}: {err}", config.service.bind_addr);
            return ExitCode::from(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "failed to bind, port likely in use");
            return ExitCode::from(2);
        }
    };

    tracing::info!(%addr, "deckforge server listening");

    if let Err(err) = axum::serve(listener, router).await {
        tracing::error!(error = %err, "server error");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}
