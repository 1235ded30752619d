//! Axum router: the thin translator between HTTP and the workflow
//! engine. One endpoint per declared workflow (today: the single
//! presentation pipeline), plus debug passthroughs that mirror the
//! worker wire protocol and the retrieval API directly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::evidence::EvidenceStore;
use crate::ids::PresentationId;
use crate::model::HistoryTurn;
use crate::quality::{CvClient, QualityGate};
use crate::session::SessionManager;
use crate::telemetry::TelemetrySink;
use crate::worker::{CircuitBreakerRegistry, CircuitState, WorkerClient, WorkerRequest};
use crate::workflow::{RunContext, WorkflowDefinition, WorkflowEngine};

use super::dto::{HealthResponse, PresentationRequest, PresentationResponse, RetrieveRequest, RetrieveResponse};
use super::error::{status_for_error, ApiError, ApiErrorBody};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub definition: Arc<WorkflowDefinition>,
    pub session_manager: Arc<SessionManager>,
    pub worker_client: Arc<dyn WorkerClient>,
    pub evidence_store: Arc<dyn EvidenceStore>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub circuit_breakers: CircuitBreakerRegistry,
    pub cv_client: Arc<dyn CvClient>,
}

/// Runs the quality gate over every slide in `state` and folds the
/// result back in: per-slide metrics and the aggregate
/// `quality_state`, bumping `version` like any other committed
/// mutation. Skipped when the run already ended in error — a partial
/// deck isn't worth scoring.
async fn apply_quality_gate(cv_client: &dyn CvClient, mut state: crate::model::WorkflowState) -> crate::model::WorkflowState {
    let gate = QualityGate::new(cv_client);
    let (assessments, aggregate) = gate.assess(&state).await;
    for assessment in assessments {
        if let Some(slide) = state.slides.iter_mut().find(|s| s.id == assessment.slide_id) {
            slide.quality_metrics = assessment.metrics;
        }
    }
    state.quality_state = aggregate;
    state.version += 1;
    state
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/workflow/presentation", post(run_presentation))
        .route("/rag/retrieve", post(retrieve))
        .route("/v1/workers/{name}/invoke", post(invoke_worker))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Seeds the well-known presentation fields (`audience`, `tone`,
/// `length`) from `initial_input` if present, and always records the
/// raw payload as a history turn so clarify has something to read.
fn apply_initial_input(state: &mut crate::model::WorkflowState, initial_input: &serde_json::Value) {
    if let Some(audience) = initial_input.get("audience").and_then(|v| v.as_str()) {
        state.audience = Some(audience.to_string());
    }
    if let Some(tone) = initial_input.get("tone").and_then(|v| v.as_str()) {
        state.tone = Some(tone.to_string());
    }
    if let Some(length) = initial_input.get("length").and_then(|v| v.as_str()) {
        state.length = Some(length.to_string());
    }
    let content = initial_input
        .get("text")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| initial_input.to_string());
    state.history.push(HistoryTurn {
        role: "user".to_string(),
        content,
    });
}

async fn run_presentation(
    State(state): State<AppState>,
    Json(req): Json<PresentationRequest>,
) -> Result<(StatusCode, Json<PresentationResponse>), ApiError> {
    let presentation_id = req
        .presentation_id
        .map(PresentationId::new)
        .unwrap_or_else(PresentationId::generate);

    let mut session = state.session_manager.open(presentation_id.clone()).await?;

    if !req.new_files.is_empty() {
        let files: Vec<_> = req.new_files.into_iter().map(Into::into).collect();
        let summary = state.evidence_store.ingest(&presentation_id, files).await?;
        session.state.ingest_summary.insert(
            "last_ingest".to_string(),
            serde_json::to_value(summary).unwrap_or(serde_json::Value::Null),
        );
    }

    session.state.history.extend(req.history);
    apply_initial_input(&mut session.state, &req.initial_input);
    if let Some(assets) = req.assets {
        session.state.metadata.insert("assets".to_string(), assets);
    }

    let ctx = RunContext {
        worker_client: state.worker_client.clone(),
        telemetry: state.telemetry.clone(),
        trace_id: session.trace_id.clone(),
        presentation_id: presentation_id.clone(),
        cancellation: &session.cancellation,
        budget: &session.budget,
    };

    let mut outcome = state.engine.run(&state.definition, session.state.clone(), &ctx).await?;
    if outcome.error.is_none() && !outcome.state.slides.is_empty() {
        outcome.state = apply_quality_gate(state.cv_client.as_ref(), outcome.state).await;
    }

    state.session_manager.commit(&mut session, outcome.state.clone()).await?;

    let status = outcome
        .error
        .as_ref()
        .map(status_for_error)
        .unwrap_or(StatusCode::OK);
    let error = outcome.error.as_ref().map(|err| ApiErrorBody {
        code: super::error::error_code(err),
        message: err.to_string(),
    });

    Ok((
        status,
        Json(PresentationResponse {
            trace: outcome.trace,
            final_: outcome.state.final_response.clone(),
            state: outcome.state,
            error,
        }),
    ))
}

async fn retrieve(
    State(state): State<AppState>,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, ApiError> {
    let presentation_id = PresentationId::new(req.presentation_id);
    let filter = req.filter.unwrap_or_default().into();
    let chunks = state
        .evidence_store
        .retrieve(&presentation_id, &req.query, req.limit, filter)
        .await?;
    Ok(Json(RetrieveResponse { chunks }))
}

async fn invoke_worker(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<WorkerRequest>,
) -> Result<Json<crate::worker::WorkerResponse>, ApiError> {
    let response = state.worker_client.invoke(&name, req).await?;
    Ok(Json(response))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let workers = crate::config::WorkerConfig::KNOWN_WORKERS
        .iter()
        .map(|name| {
            let circuit = state.circuit_breakers.get(name);
            let status = match circuit.state() {
                CircuitState::Closed => "reachable",
                CircuitState::HalfOpen => "probing",
                CircuitState::Open => "unavailable",
            };
            (name.to_string(), status.to_string())
        })
        .collect();

    Json(HealthResponse {
        status: "ok",
        workers,
    })
}
